// SPDX-License-Identifier: MPL-2.0
//! Time unit conversions used by the decode loop and decoder adapters.
//!
//! Streams express timestamps as integer ticks of a rational time base
//! (`numerator / denominator` seconds per tick); the engine works in
//! seconds and frame indices.

/// Microseconds per second as f64 for calculations.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Converts seconds to whole microseconds (container-level seek units).
///
/// # Examples
///
/// ```
/// use framepace::video_player::time_units::secs_to_micros;
///
/// assert_eq!(secs_to_micros(1.0), 1_000_000);
/// assert_eq!(secs_to_micros(0.5), 500_000);
/// ```
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn secs_to_micros(secs: f64) -> i64 {
    (secs * MICROS_PER_SECOND) as i64
}

/// Converts a timestamp in `time_base` ticks to seconds.
///
/// A degenerate time base (zero denominator) yields 0.
///
/// # Examples
///
/// ```
/// use framepace::video_player::time_units::timestamp_to_secs;
///
/// assert_eq!(timestamp_to_secs(90_000, (1, 90_000)), 1.0);
/// assert_eq!(timestamp_to_secs(512, (1, 1024)), 0.5);
/// ```
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn timestamp_to_secs(ticks: i64, time_base: (i32, i32)) -> f64 {
    let (num, den) = time_base;
    if den == 0 {
        return 0.0;
    }
    ticks as f64 * f64::from(num) / f64::from(den)
}

/// Converts seconds to `time_base` ticks, rounding down so a seek lands at
/// or before the requested position.
///
/// # Examples
///
/// ```
/// use framepace::video_player::time_units::secs_to_timestamp;
///
/// assert_eq!(secs_to_timestamp(1.0, (1, 90_000)), 90_000);
/// assert_eq!(secs_to_timestamp(0.0, (1, 1000)), 0);
/// ```
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn secs_to_timestamp(secs: f64, time_base: (i32, i32)) -> i64 {
    let (num, den) = time_base;
    if num == 0 {
        return 0;
    }
    (secs * f64::from(den) / f64::from(num)).floor() as i64
}

/// Frame index the engine resumes counting from after a seek to
/// `target_secs`.
///
/// This is `frame_rate_hz * target_secs`, which is exact only for constant
/// frame rate streams.
///
/// # Examples
///
/// ```
/// use framepace::video_player::time_units::frame_index_at;
///
/// assert_eq!(frame_index_at(5.0, 30), 150);
/// assert_eq!(frame_index_at(-1.0, 30), 0);
/// ```
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn frame_index_at(target_secs: f64, frame_rate_hz: u32) -> u64 {
    if !target_secs.is_finite() || target_secs <= 0.0 {
        return 0;
    }
    (target_secs * f64::from(frame_rate_hz)).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_abs_diff_eq;

    #[test]
    fn timestamp_round_trip_lands_at_or_before() {
        let tb = (1, 30_000);
        let ticks = secs_to_timestamp(2.345_678, tb);
        assert!(timestamp_to_secs(ticks, tb) <= 2.345_678);
        assert_abs_diff_eq!(timestamp_to_secs(ticks, tb), 2.345_678, epsilon = 1e-4);
    }

    #[test]
    fn degenerate_time_base_is_zero() {
        assert_eq!(timestamp_to_secs(100, (1, 0)), 0.0);
        assert_eq!(secs_to_timestamp(3.0, (0, 1)), 0);
    }

    #[test]
    fn frame_index_rounds_to_nearest() {
        assert_eq!(frame_index_at(1.0 / 3.0, 30), 10);
        assert_eq!(frame_index_at(f64::NAN, 30), 0);
    }
}
