//! Millisecond timestamps shared by all entities.
//!
//! # Invariants
//! - Timestamps carry millisecond precision, matching storage.
//! - Textual form is RFC 3339 UTC with exactly three fractional digits, so
//!   lexical order equals chronological order.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

pub type Timestamp = DateTime<Utc>;

/// Current wall clock truncated to milliseconds.
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(3)
}

/// Returns the modification time for a mutation that happens at `now`.
///
/// Strictly greater than `previous`, even when the clock has not moved or
/// went backwards.
pub fn advance(previous: Timestamp, now: Timestamp) -> Timestamp {
    if now > previous {
        now
    } else {
        previous + chrono::Duration::milliseconds(1)
    }
}

pub fn to_millis(value: Timestamp) -> i64 {
    value.timestamp_millis()
}

pub fn from_millis(value: i64) -> Option<Timestamp> {
    DateTime::from_timestamp_millis(value)
}

pub fn format_timestamp(value: Timestamp) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses any RFC 3339 value and normalizes it to UTC milliseconds.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|value| value.with_timezone(&Utc).trunc_subsecs(3))
}

/// Serde adapter for `#[serde(with = "...")]` using [`format_timestamp`].
pub mod rfc3339_millis {
    use super::{format_timestamp, parse_timestamp, Timestamp};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Timestamp, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .map_err(|err| D::Error::custom(format!("invalid timestamp `{raw}`: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{advance, format_timestamp, from_millis, parse_timestamp, to_millis};

    #[test]
    fn advance_is_strictly_monotonic() {
        let previous = from_millis(1_700_000_000_000).unwrap();
        assert_eq!(to_millis(advance(previous, previous)), 1_700_000_000_001);

        let earlier = from_millis(1_600_000_000_000).unwrap();
        assert_eq!(to_millis(advance(previous, earlier)), 1_700_000_000_001);

        let later = from_millis(1_800_000_000_000).unwrap();
        assert_eq!(advance(previous, later), later);
    }

    #[test]
    fn text_form_has_fixed_millisecond_precision() {
        let whole_second = from_millis(1_700_000_000_000).unwrap();
        let with_millis = from_millis(1_700_000_000_120).unwrap();

        assert_eq!(format_timestamp(whole_second), "2023-11-14T22:13:20.000Z");
        assert_eq!(format_timestamp(with_millis), "2023-11-14T22:13:20.120Z");
        assert!(format_timestamp(whole_second) < format_timestamp(with_millis));
    }

    #[test]
    fn parse_normalizes_offset_and_precision() {
        let parsed = parse_timestamp("2023-11-15T00:13:20.120999+02:00").unwrap();
        assert_eq!(to_millis(parsed), 1_700_000_000_120);
    }
}
