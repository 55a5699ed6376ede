// SPDX-License-Identifier: MPL-2.0
//! Scripted frame source.
//!
//! [`SyntheticFrameSource`] produces solid-colour frames following a
//! [`SyntheticScript`], so the engine can be driven without media files.
//! Frame `n` has timestamp `n / frame_rate_hz` and its colour encodes `n`
//! (see [`frame_color`]). Scripts can inject decode delays, a decode error
//! at a given frame, an open error and a silent audio track.
//!
//! Every source built from one script shares a [`SourceProbe`] counting
//! opens, closes and seeks, and the highest number of sources open at the
//! same time.

use crate::application::port::{
    AudioChunk, AudioFormat, DecodeOutcome, DecodedFrame, FrameSource,
};
use crate::domain::error::VideoError;
use crate::domain::media::PixelBuffer;
use crate::domain::video::{Metadata, VideoInfo};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Colour of frame `position`: the index split over the red and green
/// channels, blue fixed.
#[must_use]
pub fn frame_color(position: u64) -> [u8; 4] {
    let [r, g, ..] = position.to_le_bytes();
    [r, g, 0x80, 0xFF]
}

/// Inverse of [`frame_color`] for the low 16 bits.
#[must_use]
pub fn frame_position(pixel: [u8; 4]) -> u64 {
    u64::from(pixel[0]) | (u64::from(pixel[1]) << 8)
}

// ==========================================================================
// Probe
// ==========================================================================

#[derive(Debug, Default)]
struct ProbeCounters {
    opens: AtomicU64,
    closes: AtomicU64,
    seeks: AtomicU64,
    open_now: AtomicU64,
    max_open: AtomicU64,
    last_seek: Mutex<Option<f64>>,
}

/// Shared view on what sources built from one script have done.
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    counters: Arc<ProbeCounters>,
}

impl SourceProbe {
    /// Successful `open` calls.
    #[must_use]
    pub fn opens(&self) -> u64 {
        self.counters.opens.load(Ordering::SeqCst)
    }

    /// `close` calls that released an open source.
    #[must_use]
    pub fn closes(&self) -> u64 {
        self.counters.closes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn seeks(&self) -> u64 {
        self.counters.seeks.load(Ordering::SeqCst)
    }

    /// Target of the most recent `seek_to`.
    #[must_use]
    pub fn last_seek(&self) -> Option<f64> {
        *self
            .counters
            .last_seek
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Sources currently open.
    #[must_use]
    pub fn open_now(&self) -> u64 {
        self.counters.open_now.load(Ordering::SeqCst)
    }

    /// Highest number of sources that were open simultaneously.
    #[must_use]
    pub fn max_concurrently_open(&self) -> u64 {
        self.counters.max_open.load(Ordering::SeqCst)
    }

    fn record_open(&self) {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let now = self.counters.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open.fetch_max(now, Ordering::SeqCst);
    }

    fn record_close(&self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.counters.open_now.fetch_sub(1, Ordering::SeqCst);
    }

    fn record_seek(&self, target_secs: f64) {
        self.counters.seeks.fetch_add(1, Ordering::SeqCst);
        *self
            .counters
            .last_seek
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(target_secs);
    }
}

// ==========================================================================
// Script
// ==========================================================================

/// Description of the stream a [`SyntheticFrameSource`] plays.
#[derive(Debug, Clone)]
pub struct SyntheticScript {
    frame_rate_hz: u32,
    frame_count: u64,
    size: (u32, u32),
    report_duration: bool,
    keyframe_interval: u64,
    decode_delay: Duration,
    fail_at: Option<u64>,
    open_error: Option<VideoError>,
    has_audio: bool,
    probe: SourceProbe,
}

impl SyntheticScript {
    /// `frame_count` frames at `frame_rate_hz`, 64x36, duration reported,
    /// every frame a keyframe.
    #[must_use]
    pub fn new(frame_rate_hz: u32, frame_count: u64) -> Self {
        Self {
            frame_rate_hz,
            frame_count,
            size: (64, 36),
            report_duration: true,
            keyframe_interval: 1,
            decode_delay: Duration::ZERO,
            fail_at: None,
            open_error: None,
            has_audio: false,
            probe: SourceProbe::default(),
        }
    }

    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// Reports the duration as unknown, like containers without one.
    #[must_use]
    pub fn without_duration(mut self) -> Self {
        self.report_duration = false;
        self
    }

    /// Seeks land on multiples of `interval` frames (at or before the
    /// target).
    #[must_use]
    pub fn with_keyframe_interval(mut self, interval: u64) -> Self {
        self.keyframe_interval = interval.max(1);
        self
    }

    /// Time each `decode_next` takes.
    #[must_use]
    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = delay;
        self
    }

    /// Fails with a decode error instead of producing frame `position`.
    #[must_use]
    pub fn failing_at(mut self, position: u64) -> Self {
        self.fail_at = Some(position);
        self
    }

    /// Makes every `open` fail with `error`.
    #[must_use]
    pub fn failing_open(mut self, error: VideoError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Adds a silent audio track.
    #[must_use]
    pub fn with_audio(mut self) -> Self {
        self.has_audio = true;
        self
    }

    /// Probe shared by every source built from this script (and its
    /// clones).
    #[must_use]
    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }

    #[allow(clippy::cast_precision_loss)]
    fn duration_secs(&self) -> Option<f64> {
        (self.report_duration && self.frame_rate_hz > 0)
            .then(|| self.frame_count as f64 / f64::from(self.frame_rate_hz))
    }

    #[allow(clippy::cast_precision_loss)]
    fn pts_of(&self, position: u64) -> f64 {
        if self.frame_rate_hz == 0 {
            0.0
        } else {
            position as f64 / f64::from(self.frame_rate_hz)
        }
    }
}

// ==========================================================================
// Source
// ==========================================================================

/// [`FrameSource`] playing a [`SyntheticScript`].
#[derive(Debug)]
pub struct SyntheticFrameSource {
    script: SyntheticScript,
    open: bool,
    position: u64,
    audio_format: Option<AudioFormat>,
    pending_audio: Option<AudioChunk>,
}

impl SyntheticFrameSource {
    #[must_use]
    pub fn new(script: SyntheticScript) -> Self {
        Self {
            script,
            open: false,
            position: 0,
            audio_format: None,
            pending_audio: None,
        }
    }

    /// Position of the next frame `decode_next` will produce.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    fn ensure_open(&self) -> Result<(), VideoError> {
        if self.open {
            Ok(())
        } else {
            Err(VideoError::NotOpened)
        }
    }

    fn silent_chunk(&self, format: AudioFormat, pts_secs: f64) -> AudioChunk {
        let per_frame = if self.script.frame_rate_hz == 0 {
            0
        } else {
            (format.sample_rate / self.script.frame_rate_hz) as usize
        };
        AudioChunk {
            samples: vec![0.0; per_frame * usize::from(format.channels)].into(),
            pts_secs,
        }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn open(&mut self, _path: &Path) -> Result<VideoInfo, VideoError> {
        if let Some(err) = &self.script.open_error {
            return Err(err.clone());
        }
        if !self.open {
            self.script.probe.record_open();
            self.open = true;
        }
        self.position = 0;

        let (width, height) = self.script.size;
        Ok(
            VideoInfo::new(self.script.frame_rate_hz, width, height)
                .with_duration(self.script.duration_secs())
                .with_audio(self.script.has_audio),
        )
    }

    fn decode_next(&mut self) -> Result<DecodeOutcome, VideoError> {
        self.ensure_open()?;

        if self.script.fail_at == Some(self.position) {
            return Err(VideoError::DecodeFailed(format!(
                "corrupt frame {}",
                self.position
            )));
        }
        if self.position >= self.script.frame_count {
            return Ok(DecodeOutcome::EndOfStream);
        }
        if !self.script.decode_delay.is_zero() {
            std::thread::sleep(self.script.decode_delay);
        }

        let (width, height) = self.script.size;
        let pts_secs = self.script.pts_of(self.position);
        let image = PixelBuffer::filled(width, height, frame_color(self.position));
        if let Some(format) = self.audio_format {
            self.pending_audio = Some(self.silent_chunk(format, pts_secs));
        }
        self.position += 1;

        Ok(DecodeOutcome::Frame(DecodedFrame { image, pts_secs }))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn seek_to(&mut self, target_secs: f64) -> Result<(), VideoError> {
        self.ensure_open()?;
        self.script.probe.record_seek(target_secs);

        let frame = (target_secs.max(0.0) * f64::from(self.script.frame_rate_hz)).floor() as u64;
        let keyframe = frame - frame % self.script.keyframe_interval;
        // Past the end: the next decode reports end of stream.
        self.position = keyframe.min(self.script.frame_count);
        self.pending_audio = None;
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.pending_audio = None;
            self.script.probe.record_close();
        }
    }

    fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        if self.open {
            metadata.insert("title".to_string(), "synthetic".to_string());
            metadata.insert("encoder".to_string(), "framepace".to_string());
        }
        metadata
    }

    fn enable_audio(&mut self, format: AudioFormat) -> bool {
        if !self.script.has_audio {
            return false;
        }
        self.audio_format = Some(format);
        true
    }

    fn take_audio(&mut self) -> Option<AudioChunk> {
        self.pending_audio.take()
    }
}

impl Drop for SyntheticFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}
