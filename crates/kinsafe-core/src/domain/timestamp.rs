use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::ValidationError;

/// RFC3339 timestamp guaranteed to be UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Strict parse: the input must carry a `Z` (or `+00:00`) offset.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let parsed = OffsetDateTime::parse(input, &Rfc3339).map_err(|_| {
            ValidationError::TimestampNotUtc {
                value: input.to_owned(),
            }
        })?;

        Self::from_offset_datetime(parsed).map_err(|_| ValidationError::TimestampNotUtc {
            value: input.to_owned(),
        })
    }

    /// Accepts any RFC3339 offset and normalizes to UTC. Zone-less
    /// `YYYY-MM-DDTHH:MM[:SS]` values are read as UTC.
    pub fn parse_lenient(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
            return Ok(Self(parsed.to_offset(UtcOffset::UTC)));
        }

        let with_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
        let without_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]");
        PrimitiveDateTime::parse(trimmed, &with_seconds)
            .or_else(|_| PrimitiveDateTime::parse(trimmed, &without_seconds))
            .map(|naive| Self(naive.assume_utc()))
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: input.to_owned(),
            })
    }

    pub fn from_offset_datetime(value: OffsetDateTime) -> Result<Self, ValidationError> {
        if value.offset() != UtcOffset::UTC {
            return Err(ValidationError::TimestampNotUtc {
                value: value
                    .format(&Rfc3339)
                    .unwrap_or_else(|_| String::from("<unformattable>")),
            });
        }

        Ok(Self(value))
    }

    pub fn from_unix_seconds(seconds: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: seconds.to_string(),
            })
    }

    pub fn from_unix_millis(millis: i64) -> Result<Self, ValidationError> {
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map(Self)
            .map_err(|_| ValidationError::InvalidTimestamp {
                value: millis.to_string(),
            })
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }

    /// Shifts the timestamp back by whole hours, saturating at the
    /// representable minimum.
    pub fn hours_before(self, hours: u32) -> Self {
        let shifted = self
            .0
            .checked_sub(Duration::hours(i64::from(hours)))
            .unwrap_or(self.0);
        Self(shifted)
    }

    /// Signed elapsed time from `earlier` to `self`.
    pub fn since(self, earlier: Self) -> Duration {
        self.0 - earlier.0
    }

    /// Calendar date as `YYYY-MM-DD`.
    pub fn date_string(self) -> String {
        let date = self.0.date();
        format!(
            "{:04}-{:02}-{:02}",
            date.year(),
            u8::from(date.month()),
            date.day()
        )
    }

    pub fn format_rfc3339(self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_rfc3339())
    }
}

impl<'de> Deserialize<'de> for UtcDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_utc_timestamp() {
        let parsed = UtcDateTime::parse("2024-01-01T00:00:00Z").expect("must parse");
        assert_eq!(parsed.format_rfc3339(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn rejects_non_utc_timestamp() {
        let err = UtcDateTime::parse("2024-01-01T01:00:00+01:00").expect_err("must fail");
        assert!(matches!(err, ValidationError::TimestampNotUtc { .. }));
    }

    #[test]
    fn lenient_parse_normalizes_offsets_and_naive_values() {
        let offset = UtcDateTime::parse_lenient("2024-06-01T05:00:00-05:00").expect("offset");
        assert_eq!(offset.format_rfc3339(), "2024-06-01T10:00:00Z");

        let naive = UtcDateTime::parse_lenient("2024-06-01T10:15").expect("naive");
        assert_eq!(naive.format_rfc3339(), "2024-06-01T10:15:00Z");

        assert!(UtcDateTime::parse_lenient("yesterday").is_err());
    }

    #[test]
    fn converts_unix_millis_and_hour_offsets() {
        let at = UtcDateTime::from_unix_millis(1_717_236_000_000).expect("millis");
        assert_eq!(at.format_rfc3339(), "2024-06-01T10:00:00Z");
        assert_eq!(at.date_string(), "2024-06-01");

        let earlier = at.hours_before(24);
        assert_eq!(at.since(earlier).whole_hours(), 24);
    }
}
