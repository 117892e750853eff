// SPDX-License-Identifier: MIT OR Apache-2.0
//! Serde adapter encoding timestamps as ISO-8601 UTC with millisecond
//! precision, per the wire format every [`crate::AgentRequest`] timestamp
//! field uses.

/// Serde helpers for `chrono::DateTime<Utc>`, millisecond-precision ISO-8601.
pub mod millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize as an ISO-8601 string truncated to milliseconds.
    pub fn serialize<S: Serializer>(val: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        val.to_rfc3339_opts(SecondsFormat::Millis, true).serialize(ser)
    }

    /// Deserialize from any RFC3339-compatible string.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct WithTimestamp {
        #[serde(with = "super::millis")]
        ts: chrono::DateTime<Utc>,
    }

    #[test]
    fn millis_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 7, 27, 12, 30, 45).unwrap()
            + chrono::Duration::milliseconds(123);
        let wrapped = WithTimestamp { ts };
        let json = serde_json::to_string(&wrapped).unwrap();
        assert!(json.contains("2026-07-27T12:30:45.123Z"));
        let back: WithTimestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, wrapped);
    }

    #[test]
    fn truncates_sub_millisecond_precision() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        let json = serde_json::to_string(&WithTimestamp { ts }).unwrap();
        assert!(json.contains(".123Z"));
    }
}
