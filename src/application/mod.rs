// SPDX-License-Identifier: MPL-2.0
//! Application layer - ports the playback engine depends on.
//!
//! - [`port`]: Trait definitions (interfaces) for dependency inversion
//!
//! The engine in [`video_player`](crate::video_player) only talks to
//! decoders and audio devices through these traits, so any backend (or a
//! scripted test double) can be plugged in.

pub mod port;
