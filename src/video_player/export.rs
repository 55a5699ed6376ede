// SPDX-License-Identifier: MPL-2.0
//! Saving decoded frames as still images.

use crate::domain::media::PixelBuffer;
use crate::error::{Error, Result};
use image_rs::{DynamicImage, ImageFormat, RgbaImage};
use std::path::Path;

/// Image formats a frame can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Lossless, keeps alpha.
    #[default]
    Png,
    /// Lossy; alpha is dropped.
    Jpeg,
}

impl ExportFormat {
    /// Canonical file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }

    /// Detects the format from an extension, case-insensitively.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Detects the format from a path's extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Writes `frame` to `path`.
///
/// When `format` is `None` it is taken from the extension, defaulting to
/// PNG.
///
/// # Errors
///
/// Returns [`Error::Image`] if the frame cannot be encoded and
/// [`Error::Io`] if it cannot be written.
pub fn save_frame(frame: &PixelBuffer, path: &Path, format: Option<ExportFormat>) -> Result<()> {
    let format = format
        .or_else(|| ExportFormat::from_path(path))
        .unwrap_or_default();

    let image = RgbaImage::from_raw(frame.width(), frame.height(), frame.rgba().to_vec())
        .ok_or_else(|| Error::Image("frame buffer does not match its dimensions".to_string()))?;

    match format {
        ExportFormat::Jpeg => DynamicImage::ImageRgba8(image)
            .to_rgb8()
            .save_with_format(path, format.image_format())?,
        ExportFormat::Png => image.save_with_format(path, format.image_format())?,
    }

    log::debug!("exported {}x{} frame to {}", frame.width(), frame.height(), path.display());
    Ok(())
}
