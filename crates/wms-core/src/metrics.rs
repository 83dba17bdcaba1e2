//! Pure labor-metrics math: shift duration and utilization bounds. The aggregator (`wms-workers`) supplies the
//! per-operator sums this module turns into a percentage.

use chrono::{NaiveTime, Timelike};

use crate::error::WmsError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Seconds between `start` and `end`, treating `end <= start` as an
/// overnight shift that wraps past midnight. Equal start/end is a
/// zero-length shift, not a full day.
pub fn shift_duration_seconds(start: NaiveTime, end: NaiveTime) -> i64 {
    let start_secs = start.num_seconds_from_midnight() as i64;
    let end_secs = end.num_seconds_from_midnight() as i64;

    if start_secs == end_secs {
        0
    } else if end_secs > start_secs {
        end_secs - start_secs
    } else {
        SECONDS_PER_DAY - start_secs + end_secs
    }
}

/// Parse a `HH:MM[:SS]` wall-clock string, rejecting out-of-range
/// components.
pub fn parse_wall_clock(s: &str) -> Result<NaiveTime, WmsError> {
    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Ok(t);
        }
    }
    Err(WmsError::invalid(format!("invalid wall-clock time: {s}")))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `utilization_percent = clamp(round2(100 * active / shift), 0, 100)`;
/// zero shift duration yields 0 rather than dividing by zero.
pub fn utilization_percent(total_active_time_seconds: i64, shift_duration_seconds: i64) -> f64 {
    if shift_duration_seconds <= 0 {
        return 0.0;
    }
    let raw = 100.0 * (total_active_time_seconds as f64) / (shift_duration_seconds as f64);
    round2(raw.clamp(0.0, 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        parse_wall_clock(s).unwrap()
    }

    #[test]
    fn shift_duration_same_day() {
        assert_eq!(shift_duration_seconds(t("08:00"), t("16:00")), 8 * 3600);
    }

    #[test]
    fn shift_duration_equal_is_zero() {
        assert_eq!(shift_duration_seconds(t("08:00"), t("08:00")), 0);
    }

    #[test]
    fn shift_duration_wraps_midnight() {
        // 22:00 -> 06:00 is 8 hours, wrapping through midnight.
        assert_eq!(shift_duration_seconds(t("22:00"), t("06:00")), 8 * 3600);
    }

    #[test]
    fn utilization_is_clamped_and_rounded() {
        assert_eq!(utilization_percent(0, 0), 0.0);
        assert_eq!(utilization_percent(3600, 3600), 100.0);
        assert_eq!(utilization_percent(1800, 3600), 50.0);
        // Overshoot (e.g. overlapping tasks) clamps rather than exceeding 100.
        assert_eq!(utilization_percent(7200, 3600), 100.0);
    }

    #[test]
    fn rejects_malformed_wall_clock() {
        assert!(parse_wall_clock("25:00").is_err());
        assert!(parse_wall_clock("not-a-time").is_err());
    }
}

#[cfg(all(test, feature = "test-support"))]
mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn shift_duration_never_negative(sh in 0u32..24, sm in 0u32..60, eh in 0u32..24, em in 0u32..60) {
            let start = NaiveTime::from_hms_opt(sh, sm, 0).unwrap();
            let end = NaiveTime::from_hms_opt(eh, em, 0).unwrap();
            prop_assert!(shift_duration_seconds(start, end) >= 0);
        }

        #[test]
        fn utilization_always_in_bounds(active in 0i64..1_000_000, shift in -100i64..1_000_000) {
            let u = utilization_percent(active, shift);
            prop_assert!((0.0..=100.0).contains(&u));
        }
    }
}
