// SPDX-License-Identifier: MPL-2.0
//! Frame source port definition.
//!
//! This module defines the [`FrameSource`] trait that the playback engine
//! pulls frames from. Infrastructure adapters (like `FFmpeg`) implement it,
//! and tests substitute a scripted implementation.

use crate::application::port::audio::{AudioChunk, AudioFormat};
use crate::domain::error::VideoError;
use crate::domain::media::PixelBuffer;
use crate::domain::video::{Metadata, VideoInfo};
use std::path::Path;

/// A frame as produced by a source, before the engine indexes it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub image: PixelBuffer,
    /// Presentation timestamp in seconds, derived from the stream time base.
    pub pts_secs: f64,
}

/// Result of pulling the next frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Frame(DecodedFrame),
    /// No more frames. Terminal for the session, never retried.
    EndOfStream,
}

/// Port for pulling decoded video frames out of a media container.
///
/// # Lifecycle
///
/// 1. `open()` selects the first video stream (and the first audio stream
///    if present) and reports its [`VideoInfo`]
/// 2. `decode_next()` is called repeatedly, yielding frames in stream order
/// 3. `seek_to()` repositions at or before the target, never past it
/// 4. `close()` releases every decoder resource
///
/// A source is owned by exactly one decode thread for its whole life.
pub trait FrameSource {
    /// Opens the container at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::UnsupportedMedia`] if there is no usable video
    /// stream or the frame rate cannot be determined, and
    /// [`VideoError::Io`] if the file cannot be read.
    fn open(&mut self, path: &Path) -> Result<VideoInfo, VideoError>;

    /// Decodes the next frame in stream order.
    ///
    /// An end-of-stream signal from the decoder is reported as
    /// `Ok(DecodeOutcome::EndOfStream)`, not as an error.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::DecodeFailed`] on corrupt data, or
    /// [`VideoError::NotOpened`] when called before `open`.
    fn decode_next(&mut self) -> Result<DecodeOutcome, VideoError>;

    /// Repositions the stream at or before `target_secs`.
    ///
    /// Seeking past the end is not an error: the next `decode_next()`
    /// reports end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`VideoError::NotOpened`] when called before `open`.
    fn seek_to(&mut self, target_secs: f64) -> Result<(), VideoError>;

    /// Releases all decoder resources. Calling it twice is harmless.
    fn close(&mut self);

    /// Container tags of the open stream.
    fn metadata(&self) -> Metadata {
        Metadata::new()
    }

    /// Asks the source to also decode its audio stream, resampled to
    /// `format`. Returns false when there is no audio to deliver.
    fn enable_audio(&mut self, _format: AudioFormat) -> bool {
        false
    }

    /// Takes the next audio chunk demuxed alongside the video frames.
    fn take_audio(&mut self) -> Option<AudioChunk> {
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self, path: &Path) -> Result<VideoInfo, VideoError> {
        (**self).open(path)
    }

    fn decode_next(&mut self) -> Result<DecodeOutcome, VideoError> {
        (**self).decode_next()
    }

    fn seek_to(&mut self, target_secs: f64) -> Result<(), VideoError> {
        (**self).seek_to(target_secs)
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn metadata(&self) -> Metadata {
        (**self).metadata()
    }

    fn enable_audio(&mut self, format: AudioFormat) -> bool {
        (**self).enable_audio(format)
    }

    fn take_audio(&mut self) -> Option<AudioChunk> {
        (**self).take_audio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test that the trait is object-safe
    fn _assert_object_safe(_: &dyn FrameSource) {}

    struct CountingSource {
        remaining: u32,
        open: bool,
    }

    impl FrameSource for CountingSource {
        fn open(&mut self, _path: &Path) -> Result<VideoInfo, VideoError> {
            self.open = true;
            Ok(VideoInfo::new(10, 2, 2))
        }

        fn decode_next(&mut self) -> Result<DecodeOutcome, VideoError> {
            if !self.open {
                return Err(VideoError::NotOpened);
            }
            if self.remaining == 0 {
                return Ok(DecodeOutcome::EndOfStream);
            }
            self.remaining -= 1;
            Ok(DecodeOutcome::Frame(DecodedFrame {
                image: PixelBuffer::filled(2, 2, [0; 4]),
                pts_secs: 0.0,
            }))
        }

        fn seek_to(&mut self, _target_secs: f64) -> Result<(), VideoError> {
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    #[test]
    fn boxed_source_forwards_calls() {
        let mut source: Box<dyn FrameSource> = Box::new(CountingSource {
            remaining: 1,
            open: false,
        });
        assert_eq!(source.decode_next(), Err(VideoError::NotOpened));
        assert_eq!(source.open(Path::new("x")).map(|i| i.frame_rate_hz), Ok(10));
        assert!(matches!(source.decode_next(), Ok(DecodeOutcome::Frame(_))));
        assert_eq!(source.decode_next(), Ok(DecodeOutcome::EndOfStream));
        assert!(source.metadata().is_empty());
        assert!(!source.enable_audio(AudioFormat::new(48_000, 2)));
        assert!(source.take_audio().is_none());
    }
}
