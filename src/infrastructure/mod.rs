// SPDX-License-Identifier: MPL-2.0
//! Infrastructure layer adapters.
//!
//! Concrete implementations of the port traits defined in
//! `application::port`.
//!
//! # Available Adapters
//!
//! - [`synthetic`]: scripted frames for tests, benches and demos
//! - `ffmpeg`: real decoding via `FFmpeg` (feature `ffmpeg`)
//!
//! Both implement [`FrameSource`](crate::application::port::FrameSource).

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod synthetic;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegFrameSource;
pub use synthetic::{SourceProbe, SyntheticFrameSource, SyntheticScript};
