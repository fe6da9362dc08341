//! Serde codec for review timestamps.
//!
//! Search documents carry timestamps as `YYYY-MM-DD HH:MM:SS` in UTC rather
//! than RFC 3339. Use with `#[serde(with = "review_core::time_format")]`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Wire format of review timestamps.
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.format(FORMAT).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveDateTime::parse_from_str(&raw, FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Stamped {
        #[serde(with = "super")]
        at: DateTime<Utc>,
    }

    #[test]
    fn test_serializes_with_space_separator() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap();
        let json = serde_json::to_string(&Stamped { at }).unwrap();
        assert_eq!(json, r#"{"at":"2024-03-15 08:30:00"}"#);
    }

    #[test]
    fn test_parses_wire_format() {
        let parsed: Stamped = serde_json::from_str(r#"{"at":"2024-03-15 08:30:00"}"#).unwrap();
        assert_eq!(parsed.at, Utc.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_rejects_rfc3339() {
        let parsed = serde_json::from_str::<Stamped>(r#"{"at":"2024-03-15T08:30:00Z"}"#);
        assert!(parsed.is_err());
    }
}
