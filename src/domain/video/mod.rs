// SPDX-License-Identifier: MPL-2.0
//! Video playback domain types.
//!
//! This module contains video-related value objects and enums that are
//! independent of any presentation or infrastructure concerns.

pub mod info;
pub mod playback;

pub use info::{FrameSnapshot, Metadata, VideoInfo};
pub use playback::PlaybackState;
