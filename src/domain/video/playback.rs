// SPDX-License-Identifier: MPL-2.0
//! Video playback state machine.
//!
//! ```text
//! Idle ──play──▶ Loading ──open ok──▶ Playing ◀──play/pause──▶ Paused
//!                   │                    │  ▲
//!                open err             seek  │
//!                   ▼                    ▼  │
//!                Stopped ◀──stop──── Seeking
//!                   ▲
//!        end of stream / decode error ──▶ Ended
//! ```

/// Represents the current playback state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlaybackState {
    /// Nothing has been started yet (a path may be recorded).
    #[default]
    Idle = 0,
    /// A session is opening its frame source.
    Loading = 1,
    /// Frames are being decoded and delivered.
    Playing = 2,
    /// A session is alive but frame delivery is suspended.
    Paused = 3,
    /// The decode thread is repositioning the frame source.
    Seeking = 4,
    /// The stream ran out of frames (or failed) and the session ended.
    Ended = 5,
    /// The session was stopped by the host.
    Stopped = 6,
}

impl PlaybackState {
    /// Returns true if a decode thread may be associated with this state.
    #[must_use]
    pub fn has_session(self) -> bool {
        matches!(
            self,
            Self::Loading | Self::Playing | Self::Paused | Self::Seeking
        )
    }

    /// Encodes the state for atomic storage.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decodes a value produced by [`as_u8`](Self::as_u8).
    ///
    /// Unknown values map to [`Idle`](Self::Idle).
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Loading,
            2 => Self::Playing,
            3 => Self::Paused,
            4 => Self::Seeking,
            5 => Self::Ended,
            6 => Self::Stopped,
            _ => Self::Idle,
        }
    }
}
