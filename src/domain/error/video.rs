// SPDX-License-Identifier: MPL-2.0
//! Errors raised by frame sources and the playback engine.

use std::fmt;

/// Failure taxonomy for opening and decoding media.
///
/// Only [`UnsupportedMedia`](VideoError::UnsupportedMedia),
/// [`Io`](VideoError::Io) and [`NothingLoaded`](VideoError::NothingLoaded)
/// ever reach the host, synchronously from `play()`. Errors raised on the
/// decode thread end the session instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoError {
    /// The container has no usable video stream, or its frame rate
    /// cannot be determined.
    UnsupportedMedia(String),

    /// A frame could not be decoded mid-stream.
    DecodeFailed(String),

    /// The media could not be read (missing file, permission denied...).
    Io(String),

    /// An operation that needs an open source was called before `open`.
    NotOpened,

    /// `play()` was called before any path was loaded.
    NothingLoaded,
}

impl VideoError {
    /// Returns true for the "not a playable video" class of failures.
    #[must_use]
    pub fn is_unsupported_media(&self) -> bool {
        matches!(self, Self::UnsupportedMedia(_))
    }

    /// Returns true if the error happened while decoding an open stream.
    #[must_use]
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Self::DecodeFailed(_))
    }
}

impl fmt::Display for VideoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoError::UnsupportedMedia(msg) => write!(f, "Unsupported media: {msg}"),
            VideoError::DecodeFailed(msg) => write!(f, "Decoding failed: {msg}"),
            VideoError::Io(msg) => write!(f, "I/O error: {msg}"),
            VideoError::NotOpened => write!(f, "Frame source is not open"),
            VideoError::NothingLoaded => write!(f, "No media path has been loaded"),
        }
    }
}

impl std::error::Error for VideoError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_unsupported_media() {
        assert!(VideoError::UnsupportedMedia("no stream".into()).is_unsupported_media());
        assert!(!VideoError::DecodeFailed("bad packet".into()).is_unsupported_media());
    }

    #[test]
    fn classifies_decode_failures() {
        assert!(VideoError::DecodeFailed("bad packet".into()).is_decode_failure());
        assert!(!VideoError::NotOpened.is_decode_failure());
    }

    #[test]
    fn display_includes_detail() {
        let err = VideoError::UnsupportedMedia("frame rate unknown".into());
        assert_eq!(err.to_string(), "Unsupported media: frame rate unknown");
        assert_eq!(
            VideoError::NothingLoaded.to_string(),
            "No media path has been loaded"
        );
    }
}
