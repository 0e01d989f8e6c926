use crate::error::{malformed_timestamp, BotResult};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Formats accepted after the timezone marker has been removed
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Format used for times shown to the model
pub const LOCAL_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Normalize an ISO-like timestamp into UTC.
///
/// Any offset the string carries is discarded and the wall-clock time is
/// read in `reference`, the timezone of the person who sent the message.
pub fn normalize(iso_like: &str, reference: Tz) -> BotResult<DateTime<Utc>> {
    let naive = parse_naive(strip_timezone_marker(iso_like))?;
    Ok(attach_timezone(naive, reference)?.with_timezone(&Utc))
}

/// Remove a trailing `Z`, `±HH:MM`, `±HHMM` or `±HH` marker
pub fn strip_timezone_marker(input: &str) -> &str {
    let trimmed = input.trim();

    if let Some(rest) = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix('z'))
    {
        return rest;
    }

    // An offset can only follow a time component
    let Some(time_start) = trimmed.find(['T', ' ']) else {
        return trimmed;
    };

    for len in [6, 5, 3] {
        if trimmed.len() <= time_start + len {
            continue;
        }
        let split = trimmed.len() - len;
        if !trimmed.is_char_boundary(split) {
            continue;
        }
        let (head, tail) = trimmed.split_at(split);
        if is_offset(tail) {
            return head;
        }
    }

    trimmed
}

fn is_offset(tail: &str) -> bool {
    let bytes = tail.as_bytes();
    if !matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        return false;
    }
    let digits = |range: &[u8]| range.iter().all(u8::is_ascii_digit);

    match bytes.len() {
        6 => digits(&bytes[1..3]) && bytes[3] == b':' && digits(&bytes[4..6]),
        5 => digits(&bytes[1..5]),
        3 => digits(&bytes[1..3]),
        _ => false,
    }
}

/// Parse a timestamp without timezone information
pub fn parse_naive(value: &str) -> BotResult<NaiveDateTime> {
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    // A bare date means midnight
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| malformed_timestamp(&format!("'{}' is not a valid date/time", value)))
}

/// Read a wall-clock time in the given timezone
pub fn attach_timezone(naive: NaiveDateTime, tz: Tz) -> BotResult<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        // Repeated hour when clocks go back, take the first occurrence
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(malformed_timestamp(&format!(
            "{} does not exist in {}",
            naive, tz
        ))),
    }
}

/// Render an instant as a local ISO timestamp without offset
pub fn to_local_iso(instant: &DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format(LOCAL_ISO_FORMAT).to_string()
}

/// Local date in `dd-mm-YYYY` form
pub fn format_local_date(instant: &DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%d-%m-%Y").to_string()
}

/// Local wall-clock time in `HH:MM` form
pub fn format_local_time(instant: &DateTime<Utc>, tz: Tz) -> String {
    instant.with_timezone(&tz).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Helsinki;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_strip_timezone_marker() {
        assert_eq!(strip_timezone_marker("2026-03-01T13:00:00Z"), "2026-03-01T13:00:00");
        assert_eq!(strip_timezone_marker("2026-03-01T13:00:00+02:00"), "2026-03-01T13:00:00");
        assert_eq!(strip_timezone_marker("2026-03-01T13:00:00-0500"), "2026-03-01T13:00:00");
        assert_eq!(strip_timezone_marker("2026-03-01T13:00:00-05"), "2026-03-01T13:00:00");
        assert_eq!(strip_timezone_marker(" 2026-03-01T13:00:00 "), "2026-03-01T13:00:00");

        // Nothing to strip
        assert_eq!(strip_timezone_marker("2026-03-01T13:00:00"), "2026-03-01T13:00:00");
        assert_eq!(strip_timezone_marker("2026-03-01"), "2026-03-01");
        assert_eq!(strip_timezone_marker("2026-03-01T13:00"), "2026-03-01T13:00");
    }

    #[test]
    fn test_normalize_ignores_emitted_offset() {
        let expected = utc("2026-03-01T11:00:00Z");

        // Helsinki is UTC+2 in winter
        assert_eq!(normalize("2026-03-01T13:00:00", Helsinki).unwrap(), expected);
        assert_eq!(normalize("2026-03-01T13:00:00Z", Helsinki).unwrap(), expected);
        assert_eq!(normalize("2026-03-01T13:00:00+05:00", Helsinki).unwrap(), expected);
        assert_eq!(normalize("2026-03-01T13:00:00.000-08:00", Helsinki).unwrap(), expected);
        assert_eq!(normalize("2026-03-01 13:00", Helsinki).unwrap(), expected);
    }

    #[test]
    fn test_normalize_reference_utc() {
        assert_eq!(
            normalize("2026-03-01T13:00:00+02:00", chrono_tz::UTC).unwrap(),
            utc("2026-03-01T13:00:00Z")
        );
    }

    #[test]
    fn test_normalize_date_only() {
        assert_eq!(
            normalize("2026-06-15", Helsinki).unwrap(),
            utc("2026-06-14T21:00:00Z")
        );
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        for bad in ["", "tomorrow", "2026-13-01T10:00:00", "2026-02-30T10:00:00", "10:00"] {
            let result = normalize(bad, Helsinki);
            assert!(
                matches!(result, Err(crate::error::Error::MalformedTimestamp(_))),
                "expected failure for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_normalize_dst_transitions() {
        // Clocks jump from 03:00 to 04:00 on 2026-03-29
        assert!(normalize("2026-03-29T03:30:00", Helsinki).is_err());

        // 03:30 happens twice on 2026-10-25, the summer-time one comes first
        assert_eq!(
            normalize("2026-10-25T03:30:00", Helsinki).unwrap(),
            utc("2026-10-25T00:30:00Z")
        );
    }

    #[test]
    fn test_local_formatting() {
        let instant = utc("2026-03-01T11:00:00Z");
        assert_eq!(format_local_date(&instant, Helsinki), "01-03-2026");
        assert_eq!(format_local_time(&instant, Helsinki), "13:00");
        assert_eq!(to_local_iso(&instant, Helsinki), "2026-03-01T13:00:00");
    }
}
