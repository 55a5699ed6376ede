// SPDX-License-Identifier: MPL-2.0
//! Audio output port.
//!
//! The engine does not synchronise audio to video. It starts a sink when a
//! session opens, feeds it whatever audio the frame source demuxes, pauses
//! and resumes it with the pause flag, and drops it when the session ends.

use std::sync::Arc;

/// Sample layout an output device expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl AudioFormat {
    #[must_use]
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

/// Interleaved f32 samples normalised to [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub samples: Arc<[f32]>,
    /// Presentation timestamp of the first sample, in seconds.
    pub pts_secs: f64,
}

/// An audio device playing samples in the background.
///
/// Dropping the sink stops playback.
pub trait AudioSink {
    /// Format queued chunks must already be in.
    fn format(&self) -> AudioFormat;

    /// Appends samples to the playback queue.
    fn queue(&mut self, chunk: AudioChunk);

    /// Silences output without discarding queued samples.
    fn set_paused(&mut self, paused: bool);

    /// Discards queued samples (after a seek).
    fn clear(&mut self);
}
