// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` adapter implementing the [`FrameSource`] port.
//!
//! [`FfmpegFrameSource`] demuxes the first video stream (and the first
//! audio stream, when audio is enabled), converts frames to RGBA and
//! resamples audio to the output device format.
//!
//! # Seeking
//!
//! Seeks go to the nearest keyframe at or before the target, then frames
//! earlier than the target are decoded and dropped (at most
//! [`MAX_SEEK_SKIP_FRAMES`]). A seek at or beyond the known duration, or
//! one the demuxer rejects, leaves the source exhausted: the next
//! `decode_next` reports end of stream.
//!
//! `FFmpeg` contexts are not `Send`; the source lives and dies on the decode
//! thread that created it.

use crate::application::port::{
    AudioChunk, AudioFormat, DecodeOutcome, DecodedFrame, FrameSource,
};
use crate::config::defaults::MAX_SEEK_SKIP_FRAMES;
use crate::domain::error::VideoError;
use crate::domain::media::PixelBuffer;
use crate::domain::video::{Metadata, VideoInfo};
use crate::video_player::time_units::{secs_to_micros, timestamp_to_secs};
use ffmpeg_next::format::context::Input;
use ffmpeg_next::media::Type;
use ffmpeg_next::software::{resampling, scaling};
use ffmpeg_next::{frame, Packet, Rational};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Once;

static FFMPEG_INIT: Once = Once::new();

/// Initializes `FFmpeg` once per process and quiets its logging to errors.
///
/// # Errors
///
/// Returns [`VideoError::DecodeFailed`] if the libraries fail to
/// initialize.
pub fn init_ffmpeg() -> Result<(), VideoError> {
    let mut init_result = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            init_result = Err(VideoError::DecodeFailed(format!(
                "FFmpeg initialization failed: {e}"
            )));
            return;
        }

        // SAFETY: av_log_set_level is thread-safe and only affects logging
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR);
        }
    });

    init_result
}

fn time_base(rational: Rational) -> (i32, i32) {
    (rational.numerator(), rational.denominator())
}

/// Whole frames per second, or `None` when the rate is missing or invalid.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn frame_rate_hz(rate: Rational) -> Option<u32> {
    if rate.numerator() <= 0 || rate.denominator() <= 0 {
        return None;
    }
    let fps = f64::from(rate.numerator()) / f64::from(rate.denominator());
    fps.is_finite().then(|| fps.round().max(1.0) as u32)
}

/// Copies RGBA rows out of a frame, dropping the stride padding.
fn extract_rgba_data(frame: &frame::Video) -> Vec<u8> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let data = frame.data(0);
    let stride = frame.stride(0);
    let row_len = width * 4;

    let mut rgba = Vec::with_capacity(row_len * height);
    for y in 0..height {
        let start = y * stride;
        rgba.extend_from_slice(&data[start..start + row_len]);
    }
    rgba
}

/// Reads packed `f32` samples out of a resampled frame.
fn extract_samples(frame: &frame::Audio, channels: u16) -> Vec<f32> {
    let data = frame.data(0);
    let count = (frame.samples() * usize::from(channels)).min(data.len() / 4);
    data[..count * 4]
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

struct AudioTrack {
    index: usize,
    decoder: ffmpeg_next::decoder::Audio,
    time_base: (i32, i32),
    output: Option<(resampling::Context, u16)>,
    pending: VecDeque<AudioChunk>,
}

impl AudioTrack {
    fn enable(&mut self, format: AudioFormat) -> bool {
        let layout = match format.channels {
            1 => ffmpeg_next::ChannelLayout::MONO,
            2 => ffmpeg_next::ChannelLayout::STEREO,
            other => {
                log::debug!("no audio: {other}-channel output is not supported");
                return false;
            }
        };
        match resampling::Context::get(
            self.decoder.format(),
            self.decoder.channel_layout(),
            self.decoder.rate(),
            ffmpeg_next::format::Sample::F32(ffmpeg_next::format::sample::Type::Packed),
            layout,
            format.sample_rate,
        ) {
            Ok(resampler) => {
                self.output = Some((resampler, format.channels));
                true
            }
            Err(e) => {
                log::warn!("no audio: cannot create resampler: {e}");
                false
            }
        }
    }

    fn decode(&mut self, packet: &Packet) {
        let Some((resampler, channels)) = self.output.as_mut() else {
            return;
        };
        if let Err(e) = self.decoder.send_packet(packet) {
            log::trace!("audio packet dropped: {e}");
            return;
        }
        let mut decoded = frame::Audio::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let pts_secs = decoded
                .timestamp()
                .map_or(0.0, |ts| timestamp_to_secs(ts, self.time_base));
            let mut resampled = frame::Audio::empty();
            if let Err(e) = resampler.run(&decoded, &mut resampled) {
                log::trace!("audio frame dropped: {e}");
                continue;
            }
            let samples = extract_samples(&resampled, *channels);
            if !samples.is_empty() {
                self.pending.push_back(AudioChunk {
                    samples: samples.into(),
                    pts_secs,
                });
            }
        }
    }

    fn flush(&mut self) {
        self.decoder.flush();
        self.pending.clear();
    }
}

/// Everything that exists only while a file is open.
struct OpenStream {
    input: Input,
    video: ffmpeg_next::decoder::Video,
    video_index: usize,
    time_base: (i32, i32),
    scaler: scaling::Context,
    frame_interval_secs: f64,
    duration_secs: Option<f64>,
    audio: Option<AudioTrack>,
    metadata: Metadata,
    eof_sent: bool,
    exhausted: bool,
    skip_until: Option<f64>,
}

impl OpenStream {
    fn next_frame(&mut self) -> Result<DecodeOutcome, VideoError> {
        if self.exhausted {
            return Ok(DecodeOutcome::EndOfStream);
        }

        let mut decoded = frame::Video::empty();
        let mut skipped = 0;
        loop {
            if self.video.receive_frame(&mut decoded).is_ok() {
                let pts_secs = decoded
                    .timestamp()
                    .map_or(0.0, |ts| timestamp_to_secs(ts, self.time_base));
                if let Some(target) = self.skip_until {
                    let early = pts_secs + self.frame_interval_secs / 2.0 < target;
                    if early && skipped < MAX_SEEK_SKIP_FRAMES {
                        skipped += 1;
                        continue;
                    }
                    self.skip_until = None;
                }
                return self.convert(&decoded, pts_secs).map(DecodeOutcome::Frame);
            }
            if self.eof_sent {
                self.exhausted = true;
                return Ok(DecodeOutcome::EndOfStream);
            }
            self.feed()?;
        }
    }

    /// Sends the next video packet (or end of input) to the decoder,
    /// decoding audio packets met on the way.
    fn feed(&mut self) -> Result<(), VideoError> {
        loop {
            let next = self
                .input
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((index, packet)) if index == self.video_index => {
                    return self
                        .video
                        .send_packet(&packet)
                        .map_err(|e| VideoError::DecodeFailed(format!("Packet send failed: {e}")));
                }
                Some((index, packet)) => {
                    if let Some(audio) = self.audio.as_mut().filter(|a| a.index == index) {
                        audio.decode(&packet);
                    }
                }
                None => {
                    self.eof_sent = true;
                    return self
                        .video
                        .send_eof()
                        .map_err(|e| VideoError::DecodeFailed(format!("Draining failed: {e}")));
                }
            }
        }
    }

    fn convert(&mut self, decoded: &frame::Video, pts_secs: f64) -> Result<DecodedFrame, VideoError> {
        let input = self.scaler.input();
        if input.width != decoded.width()
            || input.height != decoded.height()
            || input.format != decoded.format()
        {
            self.scaler = create_scaler(decoded.format(), decoded.width(), decoded.height())?;
        }

        let mut rgba = frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgba)
            .map_err(|e| VideoError::DecodeFailed(format!("Scaling failed: {e}")))?;

        let image = PixelBuffer::from_rgba(rgba.width(), rgba.height(), extract_rgba_data(&rgba))
            .ok_or_else(|| VideoError::DecodeFailed("Scaler produced a short frame".to_string()))?;
        Ok(DecodedFrame { image, pts_secs })
    }

    fn seek(&mut self, target_secs: f64) {
        if let Some(audio) = self.audio.as_mut() {
            audio.flush();
        }
        if self.duration_secs.is_some_and(|duration| target_secs >= duration) {
            self.exhausted = true;
            return;
        }

        let timestamp = secs_to_micros(target_secs);
        match self.input.seek(timestamp, ..timestamp) {
            Ok(()) => {
                self.video.flush();
                self.eof_sent = false;
                self.exhausted = false;
                self.skip_until = Some(target_secs);
            }
            Err(e) => {
                log::warn!("seek to {target_secs:.3}s rejected, treating as end of stream: {e}");
                self.exhausted = true;
            }
        }
    }
}

fn create_scaler(
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
) -> Result<scaling::Context, VideoError> {
    scaling::Context::get(
        format,
        width,
        height,
        ffmpeg_next::format::Pixel::RGBA,
        width,
        height,
        scaling::Flags::BILINEAR,
    )
    .map_err(|e| VideoError::DecodeFailed(format!("Failed to create scaler: {e}")))
}

fn unsupported(message: impl std::fmt::Display) -> VideoError {
    VideoError::UnsupportedMedia(message.to_string())
}

/// [`FrameSource`] backed by `FFmpeg`.
#[derive(Default)]
pub struct FfmpegFrameSource {
    stream: Option<OpenStream>,
}

impl std::fmt::Debug for FfmpegFrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegFrameSource")
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl FfmpegFrameSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed constructor suitable for
    /// [`PlaybackEngine::new`](crate::video_player::PlaybackEngine::new).
    #[must_use]
    pub fn boxed() -> Box<dyn FrameSource> {
        Box::new(Self::new())
    }

    fn open_stream(path: &Path) -> Result<(OpenStream, VideoInfo), VideoError> {
        if !path.exists() {
            return Err(VideoError::Io(format!("{} does not exist", path.display())));
        }
        init_ffmpeg()?;

        let input = ffmpeg_next::format::input(path)
            .map_err(|e| unsupported(format!("cannot open {}: {e}", path.display())))?;

        let (video_index, stream_tb, rate, stream_duration, video) = {
            let stream = input
                .streams()
                .find(|s| s.parameters().medium() == Type::Video)
                .ok_or_else(|| unsupported("no video stream"))?;
            let rate = frame_rate_hz(stream.avg_frame_rate())
                .or_else(|| frame_rate_hz(stream.rate()))
                .ok_or_else(|| unsupported("frame rate could not be determined"))?;
            let video = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                .and_then(|context| context.decoder().video())
                .map_err(|e| unsupported(format!("no decoder for video stream: {e}")))?;
            (
                stream.index(),
                time_base(stream.time_base()),
                rate,
                stream.duration(),
                video,
            )
        };

        let duration_secs = if stream_duration > 0 {
            Some(timestamp_to_secs(stream_duration, stream_tb))
        } else if input.duration() > 0 {
            #[allow(clippy::cast_precision_loss)]
            let secs = input.duration() as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE);
            Some(secs)
        } else {
            None
        };

        let audio = input
            .streams()
            .find(|s| s.parameters().medium() == Type::Audio)
            .and_then(|stream| {
                let decoder =
                    ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                        .and_then(|context| context.decoder().audio());
                match decoder {
                    Ok(decoder) => Some(AudioTrack {
                        index: stream.index(),
                        decoder,
                        time_base: time_base(stream.time_base()),
                        output: None,
                        pending: VecDeque::new(),
                    }),
                    Err(e) => {
                        log::warn!("ignoring undecodable audio stream: {e}");
                        None
                    }
                }
            });

        let metadata: Metadata = input
            .metadata()
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        let (width, height) = (video.width(), video.height());
        if width == 0 || height == 0 {
            return Err(unsupported("video stream has no frame size"));
        }
        let scaler = create_scaler(video.format(), width, height)?;

        let info = VideoInfo::new(rate, width, height)
            .with_duration(duration_secs)
            .with_audio(audio.is_some());
        let stream = OpenStream {
            input,
            video,
            video_index,
            time_base: stream_tb,
            scaler,
            frame_interval_secs: 1.0 / f64::from(rate),
            duration_secs,
            audio,
            metadata,
            eof_sent: false,
            exhausted: false,
            skip_until: None,
        };
        Ok((stream, info))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&mut self, path: &Path) -> Result<VideoInfo, VideoError> {
        self.close();
        let (stream, info) = Self::open_stream(path)?;
        self.stream = Some(stream);
        Ok(info)
    }

    fn decode_next(&mut self) -> Result<DecodeOutcome, VideoError> {
        self.stream
            .as_mut()
            .ok_or(VideoError::NotOpened)?
            .next_frame()
    }

    fn seek_to(&mut self, target_secs: f64) -> Result<(), VideoError> {
        self.stream
            .as_mut()
            .ok_or(VideoError::NotOpened)?
            .seek(target_secs.max(0.0));
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn metadata(&self) -> Metadata {
        self.stream
            .as_ref()
            .map(|stream| stream.metadata.clone())
            .unwrap_or_default()
    }

    fn enable_audio(&mut self, format: AudioFormat) -> bool {
        self.stream
            .as_mut()
            .and_then(|stream| stream.audio.as_mut())
            .is_some_and(|audio| audio.enable(format))
    }

    fn take_audio(&mut self) -> Option<AudioChunk> {
        self.stream.as_mut()?.audio.as_mut()?.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_requires_positive_rational() {
        assert_eq!(frame_rate_hz(Rational::new(30_000, 1001)), Some(30));
        assert_eq!(frame_rate_hz(Rational::new(25, 1)), Some(25));
        assert_eq!(frame_rate_hz(Rational::new(0, 1)), None);
        assert_eq!(frame_rate_hz(Rational::new(30, 0)), None);
    }

    #[test]
    fn operations_fail_when_not_opened() {
        let mut source = FfmpegFrameSource::new();
        assert_eq!(source.decode_next().unwrap_err(), VideoError::NotOpened);
        assert_eq!(source.seek_to(1.0).unwrap_err(), VideoError::NotOpened);
        assert!(source.metadata().is_empty());
        assert!(source.take_audio().is_none());
        source.close();
        source.close();
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut source = FfmpegFrameSource::new();
        let err = source
            .open(Path::new("/definitely/not/here.mp4"))
            .unwrap_err();
        assert!(matches!(err, VideoError::Io(_)));
    }

    #[test]
    fn non_media_file_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.mp4");
        std::fs::write(&path, b"this is not a video").unwrap();

        let mut source = FfmpegFrameSource::new();
        assert!(source.open(&path).unwrap_err().is_unsupported_media());
    }
}
