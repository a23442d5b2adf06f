use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A UTC timestamp truncated to microsecond precision.
///
/// Truncation happens on every way in (construction, parsing, deserialization)
/// so two values built from the same instant always compare equal, whatever
/// precision the source clock or storage had.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DateTime(chrono::DateTime<Utc>);

impl DateTime {
    pub fn new<Tz: chrono::TimeZone>(dt: chrono::DateTime<Tz>) -> Self {
        Self(dt.with_timezone(&Utc).trunc_subsecs(6))
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn as_chrono(&self) -> &chrono::DateTime<Utc> {
        &self.0
    }

    /// RFC 3339 rendering with microseconds, e.g. `2024-01-02T03:04:05.000006Z`.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(dt: chrono::DateTime<Utc>) -> Self {
        Self::new(dt)
    }
}

impl FromStr for DateTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        chrono::DateTime::parse_from_rfc3339(s).map(Self::new)
    }
}

impl Display for DateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for DateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        chrono::DateTime::<Utc>::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone, Timelike};

    use super::*;

    #[test]
    fn test_truncates_to_microseconds_and_converts_to_utc() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset
            .with_ymd_and_hms(2024, 1, 2, 5, 4, 5)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();

        let dt = DateTime::new(local);
        assert_eq!(dt.to_string(), "2024-01-02T03:04:05.123456Z");
    }

    #[test]
    fn test_parse_truncates_too() {
        let a: DateTime = "2024-01-02T03:04:05.123456789Z".parse().unwrap();
        let b: DateTime = "2024-01-02T03:04:05.123456Z".parse().unwrap();

        assert_eq!(a, b);
        assert!("yesterday".parse::<DateTime>().is_err());
    }

    #[test]
    fn test_orders_by_time() {
        let earlier: DateTime = "2024-01-02T03:04:05Z".parse().unwrap();
        let later: DateTime = "2024-01-02T03:04:06Z".parse().unwrap();

        assert!(earlier < later);
    }

    #[test]
    fn test_deserialize_truncates() {
        let dt: DateTime = serde_json::from_str("\"2024-01-02T03:04:05.999999999Z\"").unwrap();
        assert_eq!(dt.to_string(), "2024-01-02T03:04:05.999999Z");
    }
}
