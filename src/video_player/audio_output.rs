// SPDX-License-Identifier: MPL-2.0
//! Audio output through the default system device, using cpal.
//!
//! The device callback pulls interleaved `f32` samples from a bounded
//! queue filled by the decode thread. Pausing outputs silence without
//! consuming the queue.

use crate::application::port::{AudioChunk, AudioFormat, AudioSink};
use crate::config::defaults::AUDIO_BUFFER_SECS;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// State shared with the device callback.
struct SharedState {
    queue: Mutex<VecDeque<f32>>,
    paused: AtomicBool,
    capacity: usize,
}

impl SharedState {
    fn push(&self, samples: &[f32]) {
        let Ok(mut queue) = self.queue.lock() else {
            return;
        };
        // Drop what does not fit rather than grow without bound.
        let room = self.capacity.saturating_sub(queue.len());
        queue.extend(samples.iter().take(room).copied());
    }

    fn fill<T: cpal::SizedSample + cpal::FromSample<f32>>(&self, data: &mut [T]) {
        let silence = T::from_sample(0.0f32);
        if self.paused.load(Ordering::Relaxed) {
            data.fill(silence);
            return;
        }
        let Ok(mut queue) = self.queue.lock() else {
            data.fill(silence);
            return;
        };
        for sample in data.iter_mut() {
            // Clamped just below 1.0: from_sample overflows i16 at 1.0.
            *sample = queue
                .pop_front()
                .map_or(silence, |s| T::from_sample(s.clamp(-1.0, 0.999_999_9)));
        }
    }
}

/// Plays audio chunks on the default output device.
pub struct CpalAudioSink {
    shared: Arc<SharedState>,
    format: AudioFormat,
    _stream: cpal::Stream,
}

impl std::fmt::Debug for CpalAudioSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalAudioSink")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl CpalAudioSink {
    /// Opens the default output device and starts its stream (silent until
    /// samples are queued).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if there is no output device, its
    /// configuration cannot be read, its sample format is unsupported, or
    /// the stream fails to start.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Io("No audio output device found".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::Io(format!("Failed to get audio config: {e}")))?;

        let format = AudioFormat::new(supported.sample_rate(), supported.channels());
        let capacity = AUDIO_BUFFER_SECS as usize
            * format.sample_rate as usize
            * usize::from(format.channels);
        let shared = Arc::new(SharedState {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            paused: AtomicBool::new(false),
            capacity,
        });

        let config: cpal::StreamConfig = supported.clone().into();
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, &shared)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, &shared)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, &shared)?,
            other => {
                return Err(Error::Io(format!(
                    "Unsupported audio sample format: {other:?}"
                )))
            }
        };
        stream
            .play()
            .map_err(|e| Error::Io(format!("Failed to start audio stream: {e}")))?;

        log::debug!(
            "audio output opened: {} Hz, {} channels",
            format.sample_rate,
            format.channels
        );
        Ok(Self {
            shared,
            format,
            _stream: stream,
        })
    }

    /// Boxed constructor suitable for
    /// [`PlaybackEngine::with_audio_output`](crate::video_player::PlaybackEngine::with_audio_output).
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn boxed() -> Result<Box<dyn AudioSink>> {
        Ok(Box::new(Self::new()?))
    }
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: &Arc<SharedState>,
) -> Result<cpal::Stream> {
    let shared = Arc::clone(shared);
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| shared.fill(data),
            |err| log::warn!("audio output error: {err}"),
            None,
        )
        .map_err(|e| Error::Io(format!("Failed to build audio stream: {e}")))
}

impl AudioSink for CpalAudioSink {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn queue(&mut self, chunk: AudioChunk) {
        self.shared.push(&chunk.samples);
    }

    fn set_paused(&mut self, paused: bool) {
        self.shared.paused.store(paused, Ordering::Relaxed);
    }

    fn clear(&mut self) {
        if let Ok(mut queue) = self.shared.queue.lock() {
            queue.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(capacity: usize) -> SharedState {
        SharedState {
            queue: Mutex::new(VecDeque::new()),
            paused: AtomicBool::new(false),
            capacity,
        }
    }

    #[test]
    fn push_respects_capacity() {
        let state = state(4);
        state.push(&[0.1; 3]);
        state.push(&[0.2; 3]);
        assert_eq!(state.queue.lock().unwrap().len(), 4);
    }

    #[test]
    fn fill_pads_with_silence() {
        let state = state(16);
        state.push(&[0.5, -0.5]);
        let mut out = [1.0f32; 4];
        state.fill(&mut out);
        assert_eq!(out, [0.5, -0.5, 0.0, 0.0]);
    }

    #[test]
    fn paused_fill_keeps_queue() {
        let state = state(16);
        state.push(&[0.5; 2]);
        state.paused.store(true, Ordering::Relaxed);
        let mut out = [1.0f32; 2];
        state.fill(&mut out);
        assert_eq!(out, [0.0, 0.0]);
        assert_eq!(state.queue.lock().unwrap().len(), 2);
    }
}
