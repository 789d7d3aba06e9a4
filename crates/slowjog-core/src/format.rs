//! Clock-face formatting for the countdown display and exported events.
//!
//! Everything here is pure: no clocks, no I/O.

use chrono::SecondsFormat;

use crate::records::SessionRecord;

/// Prefix of the calendar event title ("super slow jog").
pub const EXPORT_TITLE_PREFIX: &str = "超慢跑：";

/// Formats a second count as `MM:SS`.
///
/// Negative input is treated as zero. Minutes are not capped, so an hour
/// and a half renders as `90:00`.
///
/// ```
/// use slowjog_core::format_time;
///
/// assert_eq!(format_time(65), "01:05");
/// assert_eq!(format_time(-3), "00:00");
/// ```
pub fn format_time(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Formats an unsigned second count, saturating at `i64::MAX`.
pub fn format_duration(seconds: u64) -> String {
    format_time(i64::try_from(seconds).unwrap_or(i64::MAX))
}

/// Parses `MM:SS` back into seconds.
///
/// The minute field may have any number of digits; the second field must be
/// below 60. Returns `None` for anything [`format_time`] could not have
/// produced.
pub fn parse_time(text: &str) -> Option<u64> {
    let (minutes, seconds) = text.trim().split_once(':')?;
    if minutes.is_empty()
        || seconds.len() != 2
        || !minutes.bytes().all(|b| b.is_ascii_digit())
        || !seconds.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    minutes.checked_mul(60)?.checked_add(seconds)
}

/// Title of the calendar event created for a session.
pub fn export_title(duration_sec: u64) -> String {
    format!("{EXPORT_TITLE_PREFIX}{}", format_duration(duration_sec))
}

/// Description of the calendar event created for a session.
pub fn export_description(record: &SessionRecord) -> String {
    format!(
        "運動記錄，由萌貓計時器建立。\n開始: {}\n結束: {}",
        iso_millis(record.started_at()),
        iso_millis(record.ended_at()),
    )
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub fn iso_millis(instant: chrono::DateTime<chrono::Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    #[test]
    fn formats_known_values() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(5), "00:05");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(600), "10:00");
    }

    #[test]
    fn negative_clamps_to_zero() {
        assert_eq!(format_time(-1), "00:00");
        assert_eq!(format_time(-1), format_time(0));
        assert_eq!(format_time(i64::MIN), "00:00");
    }

    #[test]
    fn minutes_are_unbounded() {
        assert_eq!(format_time(100 * 60 + 7), "100:07");
    }

    proptest! {
        #[test]
        fn every_value_decodes_to_itself(s in 0..=i64::MAX) {
            let text = format_time(s);
            let (m, sec) = text.split_once(':').unwrap();
            prop_assert!(m.len() >= 2 && sec.len() == 2, "bad shape: {}", text);
            prop_assert!(text.bytes().filter(|b| *b != b':').all(|b| b.is_ascii_digit()));
            let m: i64 = m.parse().unwrap();
            let sec: i64 = sec.parse().unwrap();
            prop_assert_eq!(60 * m + sec, s);
            prop_assert_eq!(parse_time(&text), Some(s as u64));
        }

        #[test]
        fn any_negative_value_reads_as_zero(s in i64::MIN..0) {
            prop_assert_eq!(format_time(s), "00:00");
        }
    }

    #[test]
    fn two_digit_shape_below_one_hundred_minutes() {
        for s in [0, 9, 59, 60, 61, 3_599, 5_999] {
            let text = format_time(s);
            assert_eq!(text.len(), 5, "{text}");
            assert_eq!(text.as_bytes()[2], b':');
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_time(""), None);
        assert_eq!(parse_time("12"), None);
        assert_eq!(parse_time("00:60"), None);
        assert_eq!(parse_time("00:5"), None);
        assert_eq!(parse_time("-1:00"), None);
        assert_eq!(parse_time("ab:cd"), None);
        assert_eq!(parse_time(" 03:15 "), Some(195));
    }

    #[test]
    fn export_text() {
        let ended = Utc.with_ymd_and_hms(2025, 5, 4, 7, 30, 0).unwrap();
        let record = SessionRecord::completed("r1", 1_800, ended);

        assert_eq!(export_title(record.duration_sec()), "超慢跑：30:00");
        let description = export_description(&record);
        assert!(description.contains("開始: 2025-05-04T07:00:00.000Z"));
        assert!(description.ends_with("結束: 2025-05-04T07:30:00.000Z"));
    }
}
