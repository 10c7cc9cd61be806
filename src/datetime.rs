//! Lenient RFC 3339 temporal codec.
//!
//! Atom feeds in the wild carry fractional seconds and both `Z` and
//! numeric-offset forms, so parsing is deliberately forgiving: surrounding
//! whitespace is trimmed, fractional second digits are dropped, and two
//! offset spellings are accepted. Writing is canonical at second precision,
//! with a zero offset spelled `Z`.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use crate::error::{Error, Result};

const OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
const UTC_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parses an RFC 3339 timestamp leniently.
///
/// Accepts `2017-07-06T20:25:00+02:00` and `2017-07-06T20:25:00Z` forms,
/// with optional fractional seconds (dropped). `position` is the byte
/// offset of the containing element, carried into the error.
pub fn parse_date(value: &str, position: u64) -> Result<DateTime<FixedOffset>> {
    let trimmed = value.trim();
    // Shortest accepted form is 20 bytes ("....-..-..T..:..:..Z").
    if trimmed.len() < 20 {
        return Err(unparsable(trimmed, position));
    }
    let normalized = strip_fractional_seconds(trimmed);
    if let Ok(dt) = DateTime::parse_from_str(&normalized, OFFSET_FORMAT) {
        return Ok(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, UTC_FORMAT) {
        return Ok(naive.and_utc().fixed_offset());
    }
    Err(unparsable(trimmed, position))
}

/// Formats a timestamp at second precision; zero offsets are written as `Z`.
pub fn format_date(value: &DateTime<FixedOffset>) -> String {
    if value.offset().local_minus_utc() == 0 {
        value.with_timezone(&Utc).format(UTC_FORMAT).to_string()
    } else {
        value.format(OFFSET_FORMAT).to_string()
    }
}

/// Drops `.` plus any run of digits starting right after the seconds field.
fn strip_fractional_seconds(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() > 19 && bytes[19] == b'.' {
        let mut end = 20;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        format!("{}{}", &value[..19], &value[end..])
    } else {
        value.to_owned()
    }
}

fn unparsable(value: &str, position: u64) -> Error {
    Error::UnparsableDate {
        value: value.to_owned(),
        position,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Offset;
    use proptest::prelude::*;

    #[test]
    fn parses_utc_form() {
        let dt = parse_date("2017-07-06T20:25:00Z", 0).unwrap();
        assert_eq!(format_date(&dt), "2017-07-06T20:25:00Z");
        assert_eq!(dt.offset().fix().local_minus_utc(), 0);
    }

    #[test]
    fn parses_numeric_offset_form() {
        let dt = parse_date("2017-07-06T20:25:00+02:00", 0).unwrap();
        assert_eq!(format_date(&dt), "2017-07-06T20:25:00+02:00");
    }

    #[test]
    fn zero_numeric_offset_equals_utc_form() {
        let a = parse_date("2017-07-06T20:25:00+00:00", 0).unwrap();
        let b = parse_date("2017-07-06T20:25:00Z", 0).unwrap();
        assert_eq!(a, b);
        assert_eq!(format_date(&a), "2017-07-06T20:25:00Z");
    }

    #[test]
    fn fractional_seconds_are_dropped() {
        let a = parse_date("2017-07-06T20:25:00.1234+00:00", 0).unwrap();
        let b = parse_date("2017-07-06T20:25:00+00:00", 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let dt = parse_date("  2017-07-06T20:25:00Z\n", 0).unwrap();
        assert_eq!(format_date(&dt), "2017-07-06T20:25:00Z");
    }

    #[test]
    fn short_input_is_rejected() {
        let err = parse_date("2017-07-06", 17).unwrap_err();
        match err {
            Error::UnparsableDate { value, position } => {
                assert_eq!(value, "2017-07-06");
                assert_eq!(position, 17);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn garbage_of_sufficient_length_is_rejected() {
        assert!(parse_date("twenty bytes of junk", 0).is_err());
    }

    proptest! {
        #[test]
        fn format_then_parse_is_identity(
            secs in 0i64..4_102_444_800,
            offset_minutes in -13 * 60..=14 * 60,
        ) {
            let offset = FixedOffset::east_opt(offset_minutes * 60).unwrap();
            let dt = DateTime::from_timestamp(secs, 0).unwrap().with_timezone(&offset);
            let parsed = parse_date(&format_date(&dt), 0).unwrap();
            prop_assert_eq!(parsed, dt);
            prop_assert_eq!(
                parsed.offset().local_minus_utc(),
                dt.offset().local_minus_utc()
            );
        }
    }
}
