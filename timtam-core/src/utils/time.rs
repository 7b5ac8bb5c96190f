//! Time Utilities

use chrono::{DateTime, Utc};

/// Current wall-clock time in epoch milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render an epoch-millisecond timestamp as `HH:MM:SS` (UTC)
pub fn format_clock(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms() {
        // 2020-01-01T00:00:00Z
        assert!(now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn test_format_clock() {
        // 2024-01-15T10:30:05Z
        assert_eq!(format_clock(1_705_314_605_000), "10:30:05");
        assert_eq!(format_clock(0), "00:00:00");
    }

    #[test]
    fn test_format_clock_out_of_range() {
        assert_eq!(format_clock(i64::MAX), "--:--:--");
    }
}
