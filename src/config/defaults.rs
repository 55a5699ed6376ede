// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for engine and configuration constants.
//!
//! # Categories
//!
//! - **Responsiveness**: how long the decode thread may sleep at once
//! - **Seeking**: bounds on post-seek frame discarding
//! - **Audio**: output buffer bounds
//! - **Presentation**: initial display toggles

use std::time::Duration;

// ==========================================================================
// Responsiveness
// ==========================================================================

/// Sleep between polls of the pause flag while paused.
pub const PAUSE_POLL_QUANTUM: Duration = Duration::from_micros(100);

/// Longest single sleep of the pacing governor. Long frame intervals are
/// split into slices of this size so stop/seek/pause are noticed quickly.
pub const MAX_PACING_SLICE: Duration = Duration::from_millis(10);

/// How long `Drop` waits for a decode thread after requesting a stop.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ==========================================================================
// Seeking
// ==========================================================================

/// Maximum frames decoded and discarded after a keyframe seek while
/// walking up to the requested timestamp.
pub const MAX_SEEK_SKIP_FRAMES: u32 = 600;

// ==========================================================================
// Audio
// ==========================================================================

/// Audio output buffer bound, in seconds of audio. Samples beyond it are
/// dropped rather than growing without limit.
pub const AUDIO_BUFFER_SECS: u32 = 2;

// ==========================================================================
// Presentation
// ==========================================================================

/// Frames are resized to the host widget by default.
pub const DEFAULT_SCALED: bool = true;

/// Frames are stretched (not letterboxed) by default.
pub const DEFAULT_KEEP_ASPECT: bool = false;

/// Pacing to the source frame rate is on by default.
pub const DEFAULT_CONSISTENT_FRAME_RATE: bool = true;
