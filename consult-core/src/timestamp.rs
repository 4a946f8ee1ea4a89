//! Canonical instants shared by the air-quality and weather series.
//!
//! Both upstreams describe the same hour in different textual forms, so every
//! value is parsed into a UTC instant truncated to whole seconds before any
//! comparison or join.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::TimestampError;

/// Output format, e.g. `2024-01-01T00:00:00Z`
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Zone-less formats used by the weather service (requested in GMT)
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.trunc_subsecs(0))
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Parse an RFC 3339 instant or a zone-less `YYYY-MM-DDTHH:MM[:SS]` taken as UTC.
    pub fn parse(input: &str) -> Result<Self, TimestampError> {
        let trimmed = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self::from_datetime(dt.with_timezone(&Utc)));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(|naive| Self::from_datetime(naive.and_utc()))
            .ok_or_else(|| TimestampError(input.to_string()))
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn plus_hours(&self, hours: i64) -> Self {
        Self(self.0 + chrono::Duration::hours(hours))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CANONICAL_FORMAT))
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
