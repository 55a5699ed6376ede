// SPDX-License-Identifier: MPL-2.0
//! Integration tests for FFmpeg-backed playback.
//!
//! These tests use `tests/data/sample.mp4` and are skipped when it is
//! absent.
#![cfg(feature = "ffmpeg")]

use framepace::application::port::{DecodeOutcome, FrameSource};
use framepace::domain::video::PlaybackState;
use framepace::infrastructure::FfmpegFrameSource;
use framepace::test_utils::wait_until;
use framepace::video_player::{EndReason, Notification, PlaybackEngine};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SAMPLE: &str = "tests/data/sample.mp4";

fn sample() -> Option<&'static Path> {
    let path = Path::new(SAMPLE);
    path.exists().then_some(path)
}

#[test]
fn test_open_reports_stream_info() {
    let Some(path) = sample() else {
        return; // Skip if test file doesn't exist
    };

    let mut source = FfmpegFrameSource::new();
    let info = source.open(path).unwrap();

    assert!(info.frame_rate_hz > 0);
    assert!(info.frame_width > 0);
    assert!(info.frame_height > 0);
    source.close();
    source.close();
}

#[test]
fn test_first_frame_is_rgba_at_stream_size() {
    let Some(path) = sample() else {
        return;
    };

    let mut source = FfmpegFrameSource::new();
    let info = source.open(path).unwrap();

    match source.decode_next().unwrap() {
        DecodeOutcome::Frame(frame) => {
            assert_eq!(frame.image.dimensions(), info.frame_size());
            assert_eq!(
                frame.image.rgba().len(),
                (info.frame_width * info.frame_height * 4) as usize
            );
        }
        DecodeOutcome::EndOfStream => panic!("sample has no frames"),
    }
}

#[test]
fn test_seek_lands_near_target() {
    let Some(path) = sample() else {
        return;
    };

    let mut source = FfmpegFrameSource::new();
    let info = source.open(path).unwrap();
    let Some(duration) = info.duration_secs else {
        return;
    };
    let target = duration / 2.0;

    source.seek_to(target).unwrap();
    match source.decode_next().unwrap() {
        DecodeOutcome::Frame(frame) => {
            assert!(frame.pts_secs >= target - 0.1, "pts {}", frame.pts_secs);
            assert!(frame.pts_secs < duration);
        }
        DecodeOutcome::EndOfStream => panic!("seek to the middle ended the stream"),
    }
}

#[test]
fn test_seek_past_end_is_end_of_stream() {
    let Some(path) = sample() else {
        return;
    };

    let mut source = FfmpegFrameSource::new();
    source.open(path).unwrap();
    source.seek_to(1.0e6).unwrap();

    assert_eq!(source.decode_next().unwrap(), DecodeOutcome::EndOfStream);
}

#[test]
fn test_engine_plays_sample_to_the_end() {
    let Some(path) = sample() else {
        return;
    };

    let engine = PlaybackEngine::new(FfmpegFrameSource::boxed);
    engine.set_consistent_frame_rate(false);
    let endings = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&endings);
    engine.subscribe(move |n| {
        if let Notification::Ended(reason) = n {
            sink.lock().unwrap().push(reason.clone());
        }
    });

    engine.load(path);
    engine.play().unwrap();
    assert!(engine.video_info().frame_rate_hz > 0);

    assert!(wait_until(Duration::from_secs(60), || !endings
        .lock()
        .unwrap()
        .is_empty()));
    assert_eq!(*endings.lock().unwrap(), vec![EndReason::EndOfStream]);
    assert_eq!(engine.state(), PlaybackState::Ended);
}

#[test]
fn test_engine_rejects_non_media_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("readme.mp4");
    std::fs::write(&path, b"plain text").unwrap();

    let engine = PlaybackEngine::new(FfmpegFrameSource::boxed);
    engine.load(&path);

    assert!(engine.play().unwrap_err().is_unsupported_media());
    assert_eq!(engine.state(), PlaybackState::Stopped);
}
