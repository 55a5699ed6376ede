// SPDX-License-Identifier: MPL-2.0
//! Frame resizing for display.
//!
//! [`render`] is a pure function: the engine never resizes frames on the
//! decode thread. Hosts call [`PlaybackEngine::rendered_frame`] (or this
//! module directly) from their render callback.
//!
//! [`PlaybackEngine::rendered_frame`]: crate::video_player::PlaybackEngine::rendered_frame

use crate::domain::media::PixelBuffer;
use image_rs::imageops::{self, FilterType};
use image_rs::RgbaImage;
use serde::{Deserialize, Serialize};

/// Resampling filter used when a frame is resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleFilter {
    /// Fastest; blocky when upscaling.
    #[default]
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    /// Sharpest and slowest.
    Lanczos3,
}

impl ResampleFilter {
    fn filter_type(self) -> FilterType {
        match self {
            ResampleFilter::Nearest => FilterType::Nearest,
            ResampleFilter::Triangle => FilterType::Triangle,
            ResampleFilter::CatmullRom => FilterType::CatmullRom,
            ResampleFilter::Gaussian => FilterType::Gaussian,
            ResampleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// How a frame is fitted into a target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectPolicy {
    /// Fill the target exactly, distorting if needed.
    #[default]
    Stretch,
    /// Fit inside the target, preserving the aspect ratio.
    Contain,
}

/// Largest size with the aspect ratio of `source` that fits in `target`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn contain_size(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (sw, sh) = source;
    let (tw, th) = target;
    if sw == 0 || sh == 0 {
        return target;
    }
    let source_ratio = f64::from(sw) / f64::from(sh);
    let target_ratio = f64::from(tw) / f64::from(th.max(1));
    if source_ratio > target_ratio {
        let height = (f64::from(sh) / f64::from(sw) * f64::from(tw)).round() as u32;
        (tw, height.max(1))
    } else {
        let width = (f64::from(sw) / f64::from(sh) * f64::from(th)).round() as u32;
        (width.max(1), th)
    }
}

/// Resizes `frame` for display.
///
/// Returns the input unchanged (a cheap clone) when the target has a zero
/// dimension or already matches.
#[must_use]
pub fn render(
    frame: &PixelBuffer,
    target: (u32, u32),
    policy: AspectPolicy,
    filter: ResampleFilter,
) -> PixelBuffer {
    if target.0 == 0 || target.1 == 0 || frame.is_empty() {
        return frame.clone();
    }
    let (width, height) = match policy {
        AspectPolicy::Stretch => target,
        AspectPolicy::Contain => contain_size(frame.dimensions(), target),
    };
    if (width, height) == frame.dimensions() {
        return frame.clone();
    }

    let Some(source) = RgbaImage::from_raw(frame.width(), frame.height(), frame.rgba().to_vec())
    else {
        return frame.clone();
    };
    let resized = imageops::resize(&source, width, height, filter.filter_type());
    PixelBuffer::from_rgba(width, height, resized.into_raw()).unwrap_or_else(|| frame.clone())
}

/// Host-controlled display toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Follow the host widget size.
    pub scaled: bool,
    pub keep_aspect: bool,
    /// Last size reported through `resize`.
    pub widget_size: Option<(u32, u32)>,
    /// Size used when not scaled.
    pub explicit_size: Option<(u32, u32)>,
    pub filter: ResampleFilter,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            scaled: crate::config::defaults::DEFAULT_SCALED,
            keep_aspect: crate::config::defaults::DEFAULT_KEEP_ASPECT,
            widget_size: None,
            explicit_size: None,
            filter: ResampleFilter::default(),
        }
    }
}

impl RenderSettings {
    #[must_use]
    pub fn policy(&self) -> AspectPolicy {
        if self.keep_aspect {
            AspectPolicy::Contain
        } else {
            AspectPolicy::Stretch
        }
    }

    /// Size frames should be rendered at, given the native frame size.
    #[must_use]
    pub fn display_size(&self, native: (u32, u32)) -> (u32, u32) {
        let fallback = if native.0 > 0 && native.1 > 0 {
            native
        } else {
            (1, 1)
        };
        let chosen = if self.scaled {
            self.widget_size
        } else {
            self.explicit_size
        };
        chosen
            .filter(|(w, h)| *w > 0 && *h > 0)
            .unwrap_or(fallback)
    }

    /// Renders `frame` with these settings.
    #[must_use]
    pub fn render(&self, frame: &PixelBuffer) -> PixelBuffer {
        render(
            frame,
            self.display_size(frame.dimensions()),
            self.policy(),
            self.filter,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contain_fits_wide_source_to_width() {
        assert_eq!(contain_size((1920, 1080), (640, 640)), (640, 360));
    }

    #[test]
    fn contain_fits_tall_source_to_height() {
        assert_eq!(contain_size((1080, 1920), (640, 640)), (360, 640));
    }

    #[test]
    fn stretch_uses_exact_target() {
        let frame = PixelBuffer::filled(4, 2, [10, 20, 30, 255]);
        let out = render(&frame, (3, 3), AspectPolicy::Stretch, ResampleFilter::Nearest);
        assert_eq!(out.dimensions(), (3, 3));
        assert_eq!(out.pixel(1, 1), Some([10, 20, 30, 255]));
    }

    #[test]
    fn contain_preserves_aspect() {
        let frame = PixelBuffer::filled(4, 2, [0, 0, 0, 255]);
        let out = render(&frame, (8, 8), AspectPolicy::Contain, ResampleFilter::Triangle);
        assert_eq!(out.dimensions(), (8, 4));
    }

    #[test]
    fn zero_target_returns_input() {
        let frame = PixelBuffer::filled(4, 2, [0, 0, 0, 255]);
        let out = render(&frame, (0, 5), AspectPolicy::Stretch, ResampleFilter::Nearest);
        assert_eq!(out, frame);
    }

    #[test]
    fn scaled_settings_follow_widget_size() {
        let settings = RenderSettings {
            scaled: true,
            widget_size: Some((200, 100)),
            explicit_size: Some((10, 10)),
            ..RenderSettings::default()
        };
        assert_eq!(settings.display_size((640, 480)), (200, 100));
    }

    #[test]
    fn unscaled_settings_use_explicit_then_native_size() {
        let mut settings = RenderSettings {
            scaled: false,
            ..RenderSettings::default()
        };
        assert_eq!(settings.display_size((640, 480)), (640, 480));
        assert_eq!(settings.display_size((0, 0)), (1, 1));
        settings.explicit_size = Some((320, 240));
        assert_eq!(settings.display_size((640, 480)), (320, 240));
    }

    #[test]
    fn scaled_without_widget_size_falls_back_to_native() {
        let settings = RenderSettings::default();
        assert!(settings.scaled);
        assert_eq!(settings.display_size((64, 48)), (64, 48));
    }
}
