// SPDX-License-Identifier: MPL-2.0
//! State shared between the host thread and the decode thread.
//!
//! Each field has a single writer:
//! - host: `paused`, `consistent_frame_rate`, the pending seek slot
//!   (write), and the state while no session is running;
//! - decode thread: everything else, plus taking the pending seek.
//!
//! Readers never block on the decode loop for longer than a field copy.

use crate::domain::video::{FrameSnapshot, Metadata, PlaybackState, VideoInfo};
use crate::video_player::notification::NotificationChannel;
use crate::video_player::pacing::PacingCounters;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

#[derive(Debug)]
pub(crate) struct Shared {
    paused: AtomicBool,
    consistent_frame_rate: AtomicBool,
    pending_seek: Mutex<Option<f64>>,
    state: AtomicU8,
    frame_index: AtomicU64,
    pts_bits: AtomicU64,
    latest: RwLock<Option<FrameSnapshot>>,
    info: RwLock<VideoInfo>,
    metadata: RwLock<Metadata>,
    pub(crate) pacing: Arc<PacingCounters>,
    pub(crate) notifications: NotificationChannel,
}

impl Shared {
    pub(crate) fn new(consistent_frame_rate: bool) -> Self {
        Self {
            paused: AtomicBool::new(true),
            consistent_frame_rate: AtomicBool::new(consistent_frame_rate),
            pending_seek: Mutex::new(None),
            state: AtomicU8::new(PlaybackState::Idle.as_u8()),
            frame_index: AtomicU64::new(0),
            pts_bits: AtomicU64::new(0.0_f64.to_bits()),
            latest: RwLock::new(None),
            info: RwLock::new(VideoInfo::default()),
            metadata: RwLock::new(Metadata::new()),
            pacing: Arc::default(),
            notifications: NotificationChannel::new(),
        }
    }

    // Flags. The pause flag starts raised: nothing plays before `play()`.

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub(crate) fn consistent_frame_rate(&self) -> bool {
        self.consistent_frame_rate.load(Ordering::Relaxed)
    }

    pub(crate) fn set_consistent_frame_rate(&self, enabled: bool) {
        self.consistent_frame_rate.store(enabled, Ordering::Relaxed);
    }

    // Pending seek slot, last writer wins.

    pub(crate) fn request_seek(&self, target_secs: f64) {
        *self
            .pending_seek
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(target_secs);
    }

    pub(crate) fn take_pending_seek(&self) -> Option<f64> {
        self.pending_seek
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub(crate) fn pending_seek(&self) -> Option<f64> {
        *self
            .pending_seek
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn has_pending_seek(&self) -> bool {
        self.pending_seek().is_some()
    }

    // State

    pub(crate) fn raw_state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: PlaybackState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// State as the host sees it: a playing session with the pause flag
    /// raised reports `Paused`.
    pub(crate) fn state(&self) -> PlaybackState {
        match self.raw_state() {
            PlaybackState::Playing if self.is_paused() => PlaybackState::Paused,
            state => state,
        }
    }

    // Position

    pub(crate) fn frame_index(&self) -> u64 {
        self.frame_index.load(Ordering::Acquire)
    }

    pub(crate) fn set_frame_index(&self, index: u64) {
        self.frame_index.store(index, Ordering::Release);
    }

    pub(crate) fn timestamp(&self) -> f64 {
        f64::from_bits(self.pts_bits.load(Ordering::Acquire))
    }

    fn set_timestamp(&self, pts_secs: f64) {
        self.pts_bits.store(pts_secs.to_bits(), Ordering::Release);
    }

    /// Publishes a delivered frame.
    pub(crate) fn commit(&self, snapshot: &FrameSnapshot) {
        if let Ok(mut latest) = self.latest.write() {
            *latest = Some(snapshot.clone());
        }
        self.set_timestamp(snapshot.pts_secs);
        self.set_frame_index(snapshot.frame_index);
    }

    pub(crate) fn latest(&self) -> Option<FrameSnapshot> {
        self.latest.read().ok()?.clone()
    }

    // Stream description

    pub(crate) fn info(&self) -> VideoInfo {
        self.info.read().map(|info| info.clone()).unwrap_or_default()
    }

    pub(crate) fn metadata(&self) -> Metadata {
        self.metadata
            .read()
            .map(|metadata| metadata.clone())
            .unwrap_or_default()
    }

    /// Resets everything describing the current stream (on `load`).
    pub(crate) fn clear_stream(&self) {
        if let Ok(mut info) = self.info.write() {
            *info = VideoInfo::default();
        }
        if let Ok(mut metadata) = self.metadata.write() {
            metadata.clear();
        }
        if let Ok(mut latest) = self.latest.write() {
            *latest = None;
        }
        self.set_frame_index(0);
        self.set_timestamp(0.0);
    }

    /// Publishes a freshly opened stream and resets the position.
    pub(crate) fn begin_session(&self, info: &VideoInfo, metadata: Metadata) {
        if let Ok(mut current) = self.info.write() {
            *current = info.clone();
        }
        if let Ok(mut current) = self.metadata.write() {
            *current = metadata;
        }
        self.set_frame_index(0);
        self.set_timestamp(0.0);
        self.pacing.reset();
        self.set_state(PlaybackState::Playing);
    }

    /// Marks the session as over. The latest snapshot stays available.
    pub(crate) fn end_session(&self, final_state: PlaybackState) {
        self.set_frame_index(0);
        if let Ok(mut metadata) = self.metadata.write() {
            metadata.clear();
        }
        self.set_state(final_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::PixelBuffer;

    #[test]
    fn pending_seek_is_single_slot() {
        let shared = Shared::new(true);
        shared.request_seek(1.0);
        shared.request_seek(4.0);
        assert_eq!(shared.take_pending_seek(), Some(4.0));
        assert_eq!(shared.take_pending_seek(), None);
    }

    #[test]
    fn pause_flag_turns_playing_into_paused() {
        let shared = Shared::new(true);
        shared.set_state(PlaybackState::Playing);
        shared.set_paused(true);
        assert_eq!(shared.state(), PlaybackState::Paused);

        shared.set_state(PlaybackState::Ended);
        assert_eq!(shared.state(), PlaybackState::Ended);
    }

    #[test]
    fn pause_flag_starts_raised() {
        let shared = Shared::new(true);
        assert!(shared.is_paused());
        assert_eq!(shared.state(), PlaybackState::Idle);
    }

    #[test]
    fn commit_updates_position() {
        let shared = Shared::new(true);
        shared.commit(&FrameSnapshot {
            image: PixelBuffer::filled(2, 2, [0; 4]),
            pts_secs: 1.5,
            frame_index: 46,
        });
        assert_eq!(shared.frame_index(), 46);
        assert_eq!(shared.timestamp(), 1.5);
        assert_eq!(shared.latest().map(|s| s.frame_index), Some(46));

        shared.clear_stream();
        assert_eq!(shared.frame_index(), 0);
        assert!(shared.latest().is_none());
    }
}
