// SPDX-License-Identifier: MPL-2.0
//! Stream metadata and delivered-frame snapshots.

use crate::domain::media::PixelBuffer;
use std::collections::BTreeMap;
use std::time::Duration;

/// Container-level key/value tags (title, encoder, creation time...).
pub type Metadata = BTreeMap<String, String>;

/// Properties of the loaded video stream.
///
/// Populated once per session when the frame source opens. Before that
/// every field holds its zero value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoInfo {
    /// Stream duration in seconds, `None` when the container does not
    /// report one.
    pub duration_secs: Option<f64>,
    /// Nominal frame rate in whole frames per second.
    pub frame_rate_hz: u32,
    /// Frame width in pixels.
    pub frame_width: u32,
    /// Frame height in pixels.
    pub frame_height: u32,
    /// Whether an audio stream was found next to the video stream.
    pub has_audio: bool,
}

impl VideoInfo {
    #[must_use]
    pub fn new(frame_rate_hz: u32, frame_width: u32, frame_height: u32) -> Self {
        Self {
            duration_secs: None,
            frame_rate_hz,
            frame_width,
            frame_height,
            has_audio: false,
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration_secs: Option<f64>) -> Self {
        self.duration_secs = duration_secs.filter(|d| d.is_finite() && *d >= 0.0);
        self
    }

    #[must_use]
    pub fn with_audio(mut self, has_audio: bool) -> Self {
        self.has_audio = has_audio;
        self
    }

    /// Returns `(width, height)`.
    #[must_use]
    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    /// Returns the wall-clock time one frame should stay on screen.
    ///
    /// Zero before a stream has been opened.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        if self.frame_rate_hz == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / self.frame_rate_hz
        }
    }
}

/// The frame most recently delivered by the decode thread.
///
/// `frame_index` counts delivered frames within a session starting at 1;
/// a seek rewrites it to `frame_rate_hz * target_secs`, so consumers must
/// expect a jump (in either direction) across a seek boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub image: PixelBuffer,
    pub pts_secs: f64,
    pub frame_index: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_info_is_zeroed() {
        let info = VideoInfo::default();
        assert_eq!(info.frame_rate_hz, 0);
        assert_eq!(info.frame_size(), (0, 0));
        assert_eq!(info.duration_secs, None);
        assert_eq!(info.frame_interval(), Duration::ZERO);
    }

    #[test]
    fn frame_interval_matches_rate() {
        let info = VideoInfo::new(25, 640, 480);
        assert_eq!(info.frame_interval(), Duration::from_millis(40));
    }

    #[test]
    fn invalid_durations_are_treated_as_unknown() {
        let info = VideoInfo::new(30, 2, 2).with_duration(Some(f64::NAN));
        assert_eq!(info.duration_secs, None);
        let info = VideoInfo::new(30, 2, 2).with_duration(Some(-1.0));
        assert_eq!(info.duration_secs, None);
    }
}
