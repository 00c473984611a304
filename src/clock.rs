//! Wall-clock helpers.
//!
//! Event timestamps are plain unix seconds so window arithmetic stays a
//! float subtraction; snapshots carry a proper `DateTime<Utc>`.

use chrono::{DateTime, Utc};

/// Current time as fractional unix seconds.
pub fn unix_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Convert fractional unix seconds back into a UTC timestamp.
///
/// Values chrono cannot represent fall back to the current time.
pub fn to_datetime(seconds: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros((seconds * 1_000_000.0).round() as i64).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_datetime() {
        let now = unix_seconds();
        let back = to_datetime(now).timestamp_micros() as f64 / 1_000_000.0;
        assert!((now - back).abs() < 1e-5);
    }

    #[test]
    fn test_epoch() {
        assert_eq!(to_datetime(0.0).timestamp(), 0);
    }
}
