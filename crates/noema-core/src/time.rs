//! Lightweight UTC date/time utilities (no chrono dependency).
//!
//! Uses Howard Hinnant's civil_from_days algorithm for Unix-to-date conversion.
//! Ticks are 100ns units since the Unix epoch; they feed chunk and cluster
//! hashes, so they must be strictly integer.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current UTC time as Unix milliseconds.
pub fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Current UTC time as 100ns ticks since the Unix epoch.
pub fn now_ticks() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_secs() * 10_000_000 + u64::from(d.subsec_nanos() / 100)
}

/// Hours elapsed between two tick values (saturating at zero).
pub fn ticks_to_hours(earlier: u64, later: u64) -> f64 {
    later.saturating_sub(earlier) as f64 / 36_000_000_000.0
}

/// Current UTC timestamp in ISO-8601 format with millisecond precision.
pub fn now_iso8601() -> String {
    millis_to_iso8601(now_unix_millis())
}

/// Convert Unix milliseconds to an ISO-8601 UTC string.
pub fn millis_to_iso8601(millis: u64) -> String {
    let secs = millis / 1000;
    let ms = millis % 1000;
    let days = (secs / 86400) as i64;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (y, m, d) = civil_from_days(days);
    format!("{y:04}-{m:02}-{d:02}T{hours:02}:{minutes:02}:{seconds:02}.{ms:03}Z")
}

/// Howard Hinnant's civil_from_days: Unix epoch days → (year, month, day).
fn civil_from_days(days: i64) -> (i64, u64, u64) {
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_epoch() {
        assert_eq!(millis_to_iso8601(0), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_known_date_with_millis() {
        // 2026-02-21T00:00:00.250Z
        assert_eq!(
            millis_to_iso8601(1_771_632_000_250),
            "2026-02-21T00:00:00.250Z"
        );
    }

    #[test]
    fn test_ticks_are_finer_than_millis() {
        let ms = now_unix_millis();
        let ticks = now_ticks();
        assert!(ticks / 10_000 >= ms);
    }

    #[test]
    fn test_ticks_to_hours() {
        let hour = 36_000_000_000u64;
        assert!((ticks_to_hours(0, 2 * hour) - 2.0).abs() < 1e-12);
        assert_eq!(ticks_to_hours(hour, 0), 0.0);
    }
}
