// SPDX-License-Identifier: MPL-2.0
//! Test helpers shared by unit and integration tests.
//!
//! Float comparisons go through the `approx` macros; timing-sensitive
//! assertions use the polling helper below instead of fixed sleeps.

#[cfg(test)]
pub use approx::assert_abs_diff_eq;

use std::time::{Duration, Instant};

/// Polls `condition` every millisecond until it holds or `timeout` elapses.
/// Returns whether the condition was observed.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_reports_timeout() {
        assert!(!wait_until(Duration::from_millis(5), || false));
        let mut calls = 0;
        assert!(wait_until(Duration::from_secs(1), || {
            calls += 1;
            calls == 3
        }));
    }
}
