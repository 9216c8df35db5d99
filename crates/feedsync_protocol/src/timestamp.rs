//! Timestamp normalization.
//!
//! Every timestamp that is persisted or compared goes through
//! [`normalize`]: UTC, whole seconds. Two instants that differ only in
//! sub-second precision or in the offset they were written with compare
//! equal afterwards.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, SubsecRound, Utc};

/// Textual form used on the wire (`yyyy-MM-ddTHH:mm:ssZ`).
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Truncates a timestamp to whole seconds.
pub fn normalize(when: DateTime<Utc>) -> DateTime<Utc> {
    when.trunc_subsecs(0)
}

/// Returns the current time, normalized.
pub fn now() -> DateTime<Utc> {
    normalize(Utc::now())
}

/// Renders a timestamp in the wire format.
pub fn format(when: &DateTime<Utc>) -> String {
    normalize(*when).format(WIRE_FORMAT).to_string()
}

/// Parses any RFC 3339 timestamp and normalizes it to UTC seconds.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidTimestamp`] if the text is not RFC 3339.
pub fn parse(text: &str) -> ProtocolResult<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(text.trim())
        .map_err(|e| ProtocolError::InvalidTimestamp(format!("{text}: {e}")))?;
    Ok(normalize(parsed.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalize_drops_subseconds() {
        let precise = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 15).unwrap()
            + chrono::Duration::milliseconds(750);
        let normalized = normalize(precise);
        assert_eq!(
            normalized,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 15).unwrap()
        );
    }

    #[test]
    fn offsets_compare_equal_after_parse() {
        let utc = parse("2024-05-01T10:30:15Z").unwrap();
        let shifted = parse("2024-05-01T12:30:15.420+02:00").unwrap();
        assert_eq!(utc, shifted);
    }

    #[test]
    fn format_is_second_resolution_utc() {
        let when = parse("2024-05-01T12:30:15.999+02:00").unwrap();
        assert_eq!(format(&when), "2024-05-01T10:30:15Z");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse("yesterday"),
            Err(ProtocolError::InvalidTimestamp(_))
        ));
    }
}
