// SPDX-License-Identifier: MPL-2.0
//! `framepace` is an embeddable video playback engine.
//!
//! Given a media file path it decodes video frames on a dedicated thread,
//! paces their delivery to the source frame rate, and exposes transport
//! controls (play, pause, stop, seek) plus lifecycle notifications to the
//! host application. Pixel conversion to the host's display type and the
//! host's event loop are left to the embedder.
//!
//! ```no_run
//! use framepace::infrastructure::synthetic::{SyntheticFrameSource, SyntheticScript};
//! use framepace::video_player::{Notification, PlaybackEngine};
//!
//! let script = SyntheticScript::new(30, 300);
//! let engine = PlaybackEngine::new(move || Box::new(SyntheticFrameSource::new(script.clone())));
//! engine.subscribe(|notification| {
//!     if let Notification::Ended(reason) = notification {
//!         println!("ended: {reason:?}");
//!     }
//! });
//! engine.load("clip.mp4");
//! engine.play().expect("playback should start");
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod video_player;

#[doc(hidden)]
pub mod test_utils;
