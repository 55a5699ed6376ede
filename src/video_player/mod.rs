// SPDX-License-Identifier: MPL-2.0
//! Video playback engine.
//!
//! [`PlaybackEngine`] runs one decode thread per session, paces frame
//! delivery to the source frame rate with a [`PacingGovernor`], and reports
//! progress through [`Notification`]s.

#[cfg(feature = "audio")]
pub mod audio_output;
mod engine;
pub mod export;
pub mod notification;
pub mod pacing;
pub mod render;
mod shared;
pub mod time_units;

#[cfg(feature = "audio")]
pub use audio_output::CpalAudioSink;
pub use engine::{AudioSinkFactory, PlaybackEngine, SourceFactory};
pub use export::{save_frame, ExportFormat};
pub use notification::{EndReason, Notification, NotificationChannel, SubscriptionId};
pub use pacing::{PacingCounters, PacingGovernor, PacingStats};
pub use render::{render, AspectPolicy, RenderSettings, ResampleFilter};
