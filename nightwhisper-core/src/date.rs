//! Canonical UTC calendar-day keys.
//!
//! Daily gating compares these keys by string equality, so they are always
//! produced from UTC and always formatted `YYYY-MM-DD`.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `YYYY-MM-DD` UTC date key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateKey(String);

impl DateKey {
    /// Key for the UTC calendar day containing `instant`.
    #[must_use]
    pub fn from_utc(instant: DateTime<Utc>) -> Self {
        Self(instant.format("%Y-%m-%d").to_string())
    }

    /// Key for the current UTC day. Compute once per process and pass it down.
    #[must_use]
    pub fn today() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Parse a `YYYY-MM-DD` string, rejecting anything that is not a real date.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
            .ok()
            .map(|date| Self(date.format("%Y-%m-%d").to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
