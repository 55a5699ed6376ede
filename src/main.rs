// SPDX-License-Identifier: MPL-2.0
//! Headless player: plays a file at its frame rate and prints lifecycle
//! events.
//!
//! ```text
//! framepace <FILE> [--seek SECS] [--unpaced] [--quiet]
//! ```
//!
//! `--unpaced` delivers frames as fast as they decode, `--quiet` disables
//! audio output. Log verbosity follows `RUST_LOG`.

use framepace::config;
use framepace::infrastructure::FfmpegFrameSource;
use framepace::video_player::{EndReason, Notification, PlaybackEngine};
use std::path::PathBuf;
use std::process::ExitCode;

struct Args {
    file: PathBuf,
    seek: Option<f64>,
    unpaced: bool,
    quiet: bool,
}

fn parse_args() -> Result<Args, pico_args::Error> {
    let mut args = pico_args::Arguments::from_env();
    let seek = args.opt_value_from_str("--seek")?;
    let unpaced = args.contains("--unpaced");
    let quiet = args.contains("--quiet");
    let file = args.free_from_os_str(|s| Ok::<_, std::convert::Infallible>(PathBuf::from(s)))?;
    Ok(Args {
        file,
        seek,
        unpaced,
        quiet,
    })
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("usage: framepace <FILE> [--seek SECS] [--unpaced] [--quiet]");
            return ExitCode::from(2);
        }
    };

    let mut settings = config::load().unwrap_or_else(|e| {
        log::warn!("using default settings: {e}");
        config::PlayerConfig::default()
    });
    if args.unpaced {
        settings.consistent_frame_rate = false;
    }
    if args.quiet {
        settings.audio_enabled = false;
    }

    let engine = PlaybackEngine::new(FfmpegFrameSource::boxed);
    #[cfg(feature = "audio")]
    let engine = engine.with_audio_output(framepace::video_player::CpalAudioSink::boxed);
    let engine = engine.with_config(&settings);

    let (_, mut events) = engine.notifications();
    engine.load(&args.file);
    if let Some(target) = args.seek {
        engine.seek(target);
    }
    if let Err(e) = engine.play() {
        eprintln!("error: cannot play {}: {e}", args.file.display());
        return ExitCode::FAILURE;
    }

    while let Some(event) = events.blocking_recv() {
        match event {
            Notification::Loaded(info) => println!(
                "loaded: {}x{} @ {} fps{}",
                info.frame_width,
                info.frame_height,
                info.frame_rate_hz,
                if info.has_audio { ", with audio" } else { "" }
            ),
            Notification::DurationKnown(secs) => println!("duration: {secs:.3}s"),
            Notification::SecondElapsed {
                second,
                frame_index,
            } => println!("{second}s (frame {frame_index})"),
            Notification::FrameReady(_) => {}
            Notification::Ended(reason) => {
                println!("ended: {reason:?}");
                let stats = engine.pacing_stats();
                log::info!(
                    "pacing: {} sleeps, {:?} total",
                    stats.sleep_calls,
                    stats.total_slept
                );
                return match reason {
                    EndReason::DecodeError(_) => ExitCode::FAILURE,
                    EndReason::EndOfStream | EndReason::Stopped => ExitCode::SUCCESS,
                };
            }
        }
    }
    ExitCode::SUCCESS
}
