//! Countdown display formatting
//!
//! Both formatters take whole milliseconds as a signed value because the input
//! is usually `turn_duration - elapsed`, which may already be below zero.

use thiserror::Error;

/// Largest value [`format_short`] accepts by default: `99:59`
pub const SHORT_FORMAT_LIMIT_MS: i64 = 99 * 60_000 + 59_999;

const MILLIS_PER_MINUTE: i64 = 60_000;
const MILLIS_PER_SECOND: i64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("time value {millis} ms exceeds the allowed format limit of {limit} ms")]
    ExceedsLimit { millis: i64, limit: i64 },
}

/// Format milliseconds as `MM:SS:mmm`.
///
/// Minutes are padded to two digits and grow past 99 without truncation.
/// Negative input yields `00:00:000`.
pub fn format_millis(millis: i64) -> String {
    if millis < 0 {
        return "00:00:000".to_string();
    }
    let minutes = millis / MILLIS_PER_MINUTE;
    let seconds = (millis % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND;
    let ms = millis % MILLIS_PER_SECOND;
    format!("{minutes:02}:{seconds:02}:{ms:03}")
}

/// Format milliseconds as `MM:SS` using [`SHORT_FORMAT_LIMIT_MS`]
pub fn format_short(millis: i64) -> Result<String, FormatError> {
    format_short_with_limit(millis, SHORT_FORMAT_LIMIT_MS)
}

/// Format milliseconds as `MM:SS`, rejecting input above `limit`.
///
/// Negative input yields `00:00`. Sub-second remainders are truncated.
pub fn format_short_with_limit(millis: i64, limit: i64) -> Result<String, FormatError> {
    if millis < 0 {
        return Ok("00:00".to_string());
    }
    if millis > limit {
        return Err(FormatError::ExceedsLimit { millis, limit });
    }
    let minutes = millis / MILLIS_PER_MINUTE;
    let seconds = (millis % MILLIS_PER_MINUTE) / MILLIS_PER_SECOND;
    Ok(format!("{minutes:02}:{seconds:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_millis_examples() {
        assert_eq!(format_millis(65_001), "01:05:001");
        assert_eq!(format_millis(0), "00:00:000");
        assert_eq!(format_millis(999), "00:00:999");
        assert_eq!(format_millis(1_000), "00:01:000");
        assert_eq!(format_millis(59_999), "00:59:999");
        assert_eq!(format_millis(120_000), "02:00:000");
        assert_eq!(format_millis(10 * 60_000 + 10_010), "10:10:010");
    }

    #[test]
    fn test_format_millis_minutes_above_99() {
        assert_eq!(format_millis(100 * 60_000), "100:00:000");
        assert_eq!(format_millis(5_959 * 60_000 + 59_999), "5959:59:999");
    }

    #[test]
    fn test_format_millis_negative() {
        assert_eq!(format_millis(-1), "00:00:000");
        assert_eq!(format_millis(i64::MIN), "00:00:000");
    }

    #[test]
    fn test_format_millis_shape() {
        for millis in [0_i64, 7, 61, 1_234, 61_001, 599_999, 3_600_000, 7_654_321] {
            let text = format_millis(millis);
            let parts: Vec<&str> = text.split(':').collect();
            assert_eq!(parts.len(), 3, "{text}");
            assert!(parts[0].len() >= 2, "{text}");
            assert_eq!(parts[1].len(), 2, "{text}");
            assert_eq!(parts[2].len(), 3, "{text}");
        }
    }

    #[test]
    fn test_format_short() {
        assert_eq!(format_short(0).unwrap(), "00:00");
        assert_eq!(format_short(65_999).unwrap(), "01:05");
        assert_eq!(format_short(40_000).unwrap(), "00:40");
        assert_eq!(format_short(SHORT_FORMAT_LIMIT_MS).unwrap(), "99:59");
    }

    #[test]
    fn test_format_short_negative() {
        assert_eq!(format_short(-5_000).unwrap(), "00:00");
    }

    #[test]
    fn test_format_short_rejects_overflow() {
        let result = format_short(SHORT_FORMAT_LIMIT_MS + 1);
        assert_eq!(
            result,
            Err(FormatError::ExceedsLimit {
                millis: SHORT_FORMAT_LIMIT_MS + 1,
                limit: SHORT_FORMAT_LIMIT_MS,
            })
        );
    }

    #[test]
    fn test_format_short_custom_limit() {
        assert!(format_short_with_limit(60_000, 59_999).is_err());
        assert_eq!(format_short_with_limit(59_999, 59_999).unwrap(), "00:59");
    }
}
