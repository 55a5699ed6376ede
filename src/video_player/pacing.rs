// SPDX-License-Identifier: MPL-2.0
//! Frame-rate governor.
//!
//! Keeps the wall-clock delivery rate close to the source frame rate by
//! sleeping after each delivered frame for whatever is left of the frame
//! interval:
//!
//! ```text
//! wait = max(1000 / frame_rate_hz ms - delta, 0)
//! ```
//!
//! where `delta` is the time spent since the previous frame was delivered
//! (decode + notification). Sleeps are sliced so that a stop, seek or pause
//! request interrupts them within [`MAX_PACING_SLICE`].
//!
//! There is no long-horizon clock reconciliation: each frame is paced on
//! its own, so a slow decode is never made up for by later frames.

use crate::config::defaults::MAX_PACING_SLICE;
use crate::domain::video::VideoInfo;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Totals of the sleeps performed by a governor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacingStats {
    /// Number of waits that actually slept.
    pub sleep_calls: u64,
    /// Sum of the time spent sleeping.
    pub total_slept: Duration,
}

/// Lock-free counters readable from the host thread while the decode
/// thread paces.
#[derive(Debug, Default)]
pub struct PacingCounters {
    sleep_calls: AtomicU64,
    slept_us: AtomicU64,
}

impl PacingCounters {
    #[allow(clippy::cast_possible_truncation)]
    fn record(&self, slept: Duration) {
        self.sleep_calls.fetch_add(1, Ordering::Relaxed);
        self.slept_us
            .fetch_add(slept.as_micros() as u64, Ordering::Relaxed);
    }

    /// Returns the totals recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> PacingStats {
        PacingStats {
            sleep_calls: self.sleep_calls.load(Ordering::Relaxed),
            total_slept: Duration::from_micros(self.slept_us.load(Ordering::Relaxed)),
        }
    }

    /// Zeroes the counters (at the start of a session).
    pub fn reset(&self) {
        self.sleep_calls.store(0, Ordering::Relaxed);
        self.slept_us.store(0, Ordering::Relaxed);
    }
}

/// Paces frame delivery for one playback session.
#[derive(Debug)]
pub struct PacingGovernor {
    frame_interval: Duration,
    last_delivery: Instant,
    counters: Arc<PacingCounters>,
}

impl PacingGovernor {
    /// Creates a governor for `frame_rate_hz` (0 disables pacing).
    #[must_use]
    pub fn new(frame_rate_hz: u32) -> Self {
        Self::with_counters(frame_rate_hz, Arc::default())
    }

    /// Creates a governor that records into shared counters.
    #[must_use]
    pub fn with_counters(frame_rate_hz: u32, counters: Arc<PacingCounters>) -> Self {
        let frame_interval = if frame_rate_hz == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(1) / frame_rate_hz
        };
        Self::with_interval(frame_interval, counters)
    }

    /// Creates a governor for an opened stream.
    #[must_use]
    pub fn for_stream(info: &VideoInfo, counters: Arc<PacingCounters>) -> Self {
        Self::with_interval(info.frame_interval(), counters)
    }

    fn with_interval(frame_interval: Duration, counters: Arc<PacingCounters>) -> Self {
        Self {
            frame_interval,
            last_delivery: Instant::now(),
            counters,
        }
    }

    /// Target time between two delivered frames.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Time left to wait when `elapsed` has passed since the last delivery.
    #[must_use]
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.frame_interval.saturating_sub(elapsed)
    }

    /// Restarts the measurement, so time spent paused or seeking does not
    /// count against the next frame.
    pub fn reset(&mut self) {
        self.last_delivery = Instant::now();
    }

    /// Waits out the rest of the frame interval.
    ///
    /// With `consistent` false frames go out as fast as they decode and no
    /// sleep happens. `interrupted` is polled between sleep slices; when it
    /// returns true the wait ends early. Returns the time actually slept.
    pub fn pace(&mut self, consistent: bool, interrupted: impl Fn() -> bool) -> Duration {
        let delta = self.last_delivery.elapsed();
        let mut slept = Duration::ZERO;

        if consistent {
            let wait = self.remaining(delta);
            if !wait.is_zero() {
                slept = sleep_sliced(wait, interrupted);
                self.counters.record(slept);
            }
        }

        self.last_delivery = Instant::now();
        slept
    }

    /// Totals recorded by this governor's counters.
    #[must_use]
    pub fn stats(&self) -> PacingStats {
        self.counters.snapshot()
    }
}

fn sleep_sliced(total: Duration, interrupted: impl Fn() -> bool) -> Duration {
    let started = Instant::now();
    let mut remaining = total;
    while !remaining.is_zero() {
        if interrupted() {
            break;
        }
        let slice = remaining.min(MAX_PACING_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
    started.elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_follows_frame_rate() {
        assert_eq!(
            PacingGovernor::new(50).frame_interval(),
            Duration::from_millis(20)
        );
        assert_eq!(PacingGovernor::new(0).frame_interval(), Duration::ZERO);
    }

    #[test]
    fn stream_governor_uses_stream_rate() {
        let info = VideoInfo::new(25, 640, 480);
        let governor = PacingGovernor::for_stream(&info, Arc::default());
        assert_eq!(governor.frame_interval(), Duration::from_millis(40));
    }

    #[test]
    fn remaining_never_goes_negative() {
        let governor = PacingGovernor::new(10);
        assert_eq!(
            governor.remaining(Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        assert_eq!(governor.remaining(Duration::from_millis(250)), Duration::ZERO);
    }

    #[test]
    fn consistent_mode_sleeps_about_one_interval() {
        let mut governor = PacingGovernor::new(50);
        governor.reset();
        let slept = governor.pace(true, || false);
        assert!(slept >= Duration::from_millis(15), "slept {slept:?}");
        assert!(slept < Duration::from_millis(200), "slept {slept:?}");
        assert_eq!(governor.stats().sleep_calls, 1);
    }

    #[test]
    fn disabled_mode_never_sleeps() {
        let mut governor = PacingGovernor::new(1);
        for _ in 0..5 {
            assert_eq!(governor.pace(false, || false), Duration::ZERO);
        }
        assert_eq!(governor.stats(), PacingStats::default());
    }

    #[test]
    fn slow_frames_are_not_delayed_further() {
        let mut governor = PacingGovernor::new(100);
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(governor.pace(true, || false), Duration::ZERO);
        assert_eq!(governor.stats().sleep_calls, 0);
    }

    #[test]
    fn interruption_cuts_long_waits_short() {
        // One frame per second would otherwise sleep a full second.
        let mut governor = PacingGovernor::new(1);
        let started = Instant::now();
        governor.pace(true, || started.elapsed() > Duration::from_millis(20));
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn shared_counters_are_visible_and_resettable() {
        let counters = Arc::new(PacingCounters::default());
        let mut governor = PacingGovernor::with_counters(200, Arc::clone(&counters));
        governor.reset();
        governor.pace(true, || false);
        assert_eq!(counters.snapshot().sleep_calls, 1);
        counters.reset();
        assert_eq!(counters.snapshot(), PacingStats::default());
    }
}
