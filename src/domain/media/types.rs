// SPDX-License-Identifier: MPL-2.0
//! Decoded pixel data without presentation dependencies.

use std::sync::Arc;

/// Bytes per RGBA pixel.
pub const RGBA_CHANNELS: usize = 4;

/// A decoded RGBA8 frame.
///
/// The pixel bytes are reference counted so a frame can be handed to the
/// host and kept as the engine's latest snapshot without copying.
///
/// # Example
///
/// ```
/// use framepace::domain::media::PixelBuffer;
///
/// let frame = PixelBuffer::from_rgba(2, 1, vec![0u8; 8]).unwrap();
/// assert_eq!(frame.dimensions(), (2, 1));
/// assert!(PixelBuffer::from_rgba(2, 2, vec![0u8; 8]).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    rgba: Arc<[u8]>,
}

impl PixelBuffer {
    /// Wraps owned RGBA bytes.
    ///
    /// Returns `None` when the byte count is not `width * height * 4`.
    #[must_use]
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        if rgba.len() != expected_len(width, height) {
            return None;
        }
        Some(Self {
            width,
            height,
            rgba: rgba.into(),
        })
    }

    /// Creates a frame where every pixel has the same colour.
    #[must_use]
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let rgba: Vec<u8> = pixel
            .iter()
            .copied()
            .cycle()
            .take(expected_len(width, height))
            .collect();
        Self {
            width,
            height,
            rgba: rgba.into(),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `(width, height)`.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns the raw RGBA bytes, row-major with no padding.
    #[must_use]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Returns the RGBA bytes of the pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGBA_CHANNELS;
        let px = &self.rgba[offset..offset + RGBA_CHANNELS];
        Some([px[0], px[1], px[2], px[3]])
    }

    #[must_use]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rgba.is_empty()
    }
}

fn expected_len(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize) * RGBA_CHANNELS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgba_checks_length() {
        assert!(PixelBuffer::from_rgba(4, 4, vec![0u8; 64]).is_some());
        assert!(PixelBuffer::from_rgba(4, 4, vec![0u8; 63]).is_none());
    }

    #[test]
    fn filled_repeats_pixel() {
        let frame = PixelBuffer::filled(3, 2, [1, 2, 3, 4]);
        assert_eq!(frame.pixel_count(), 6);
        assert_eq!(frame.rgba().len(), 24);
        assert_eq!(frame.pixel(2, 1), Some([1, 2, 3, 4]));
    }

    #[test]
    fn pixel_out_of_bounds_is_none() {
        let frame = PixelBuffer::filled(2, 2, [0, 0, 0, 255]);
        assert_eq!(frame.pixel(2, 0), None);
        assert_eq!(frame.pixel(0, 2), None);
    }

    #[test]
    fn clones_share_pixels() {
        let frame = PixelBuffer::filled(8, 8, [9, 9, 9, 9]);
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.rgba().as_ptr(), copy.rgba().as_ptr()));
    }

    #[test]
    fn zero_sized_frame_is_empty() {
        let frame = PixelBuffer::filled(0, 0, [0; 4]);
        assert!(frame.is_empty());
    }
}
