// SPDX-License-Identifier: MPL-2.0
//! Domain layer - playback types with no external dependencies.
//!
//! # Modules
//!
//! - [`error`]: Domain error types ([`VideoError`](error::VideoError))
//! - [`media`]: Pixel data ([`PixelBuffer`](media::PixelBuffer))
//! - [`video`]: Playback types ([`PlaybackState`](video::PlaybackState),
//!   [`VideoInfo`](video::VideoInfo), [`FrameSnapshot`](video::FrameSnapshot))

pub mod error;
pub mod media;
pub mod video;
