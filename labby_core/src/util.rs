//! Common time/period helpers for labby_core.
use std::time::Duration;

/// Number of samples taken at `rate_hz` over `duration`, counting both the
/// sample at 0 and the one at the end: `floor(duration * rate) + 1`.
///
/// A tiny tolerance keeps `0.3 s * 10 Hz` from rounding down to 2.
pub fn sample_count(rate_hz: f64, duration: Duration) -> u64 {
    if !(rate_hz.is_finite() && rate_hz > 0.0) {
        return 0;
    }
    let intervals = (duration.as_secs_f64() * rate_hz + 1e-9).floor();
    (intervals as u64).saturating_add(1)
}

/// Offset of sample `k` from the start of an experiment.
pub fn sample_offset(k: u64, rate_hz: f64) -> Duration {
    Duration::try_from_secs_f64(k as f64 / rate_hz).unwrap_or(Duration::MAX)
}

/// Duration of `seconds`, saturating at `Duration::MAX`; negative or NaN is zero.
pub fn duration_from_secs(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

/// Render a reading for CSV. Whole numbers keep their `.0`.
pub fn format_value(v: f64) -> String {
    format!("{v:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_includes_both_ends() {
        assert_eq!(sample_count(2.0, Duration::from_secs(1)), 3);
        assert_eq!(sample_count(1.0, Duration::ZERO), 1);
        assert_eq!(sample_count(10.0, Duration::from_millis(300)), 4);
        assert_eq!(sample_count(0.0, Duration::from_secs(1)), 0);
    }

    #[test]
    fn huge_counts_saturate() {
        assert_eq!(sample_count(1e20, Duration::from_secs(1)), u64::MAX);
        assert_eq!(sample_offset(u64::MAX, 1e-20), Duration::MAX);
    }

    #[test]
    fn durations_saturate() {
        assert_eq!(duration_from_secs(1.5), Duration::from_millis(1500));
        assert_eq!(duration_from_secs(1e30), Duration::MAX);
        assert_eq!(duration_from_secs(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn offsets() {
        assert_eq!(sample_offset(0, 2.0), Duration::ZERO);
        assert_eq!(sample_offset(1, 2.0), Duration::from_millis(500));
        assert_eq!(sample_offset(3, 1.0), Duration::from_secs(3));
    }

    #[test]
    fn values_keep_a_decimal_point() {
        assert_eq!(format_value(15.0), "15.0");
        assert_eq!(format_value(0.5), "0.5");
        assert_eq!(format_value(3.0 / 10.0), "0.3");
    }
}
