// SPDX-License-Identifier: MPL-2.0
//! Port definitions (traits) for dependency inversion.
//!
//! # Available Ports
//!
//! - [`frame_source`]: Demuxing/decoding of one video stream
//! - [`audio`]: Audio output started and stopped with playback
//!
//! # Design Notes
//!
//! - All traits use domain types only (no `FFmpeg` or `cpal` types)
//! - Implementations are created and used on the decode thread, so
//!   neither trait requires `Send`
//! - Methods return `Result` with domain error types

pub mod audio;
pub mod frame_source;

pub use audio::{AudioChunk, AudioFormat, AudioSink};
pub use frame_source::{DecodeOutcome, DecodedFrame, FrameSource};
