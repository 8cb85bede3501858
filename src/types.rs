//! Common types used throughout the insights pipeline
//!
//! This module contains shared type definitions, type aliases,
//! and small value types used across multiple modules.

use crate::error::{Error, Result};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// A raw provider row, keyed by provider-defined field names
pub type Record = JsonObject;

/// Date format used on every external interface
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Identifiers
// ============================================================================

/// Provider-side identifier of an asynchronous report job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque continuation token for a paginated result set
///
/// Handed back to the provider verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An ad account discovered under a business
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    /// Numeric account id without the `act_` prefix
    pub account_id: String,
}

impl Account {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }
}

// ============================================================================
// Date Range
// ============================================================================

/// Inclusive reporting window, in UTC calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting ranges that end before they start
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::date_range(format!(
                "end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a range from two `YYYY-MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// Parse optional bounds
    ///
    /// A missing end is today (UTC); a missing start is `days` before the end.
    pub fn parse_or_trailing(start: Option<&str>, end: Option<&str>, days: i64) -> Result<Self> {
        let end = match end.filter(|s| !s.is_empty()) {
            Some(s) => parse_date(s)?,
            None => Utc::now().date_naive(),
        };
        let start = match start.filter(|s| !s.is_empty()) {
            Some(s) => parse_date(s)?,
            None => days_before(end, days)?,
        };
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Start formatted as `YYYY-MM-DD`
    pub fn since(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    /// End formatted as `YYYY-MM-DD`
    pub fn until(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.since(), self.until())
    }
}

fn days_before(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    u64::try_from(days)
        .ok()
        .and_then(|d| date.checked_sub_days(Days::new(d)))
        .ok_or_else(|| Error::date_range(format!("cannot go back {days} days from {date}")))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| Error::date_range(format!("'{value}' is not a YYYY-MM-DD date: {e}")))
}

// ============================================================================
// JWT Algorithm
// ============================================================================

/// JWT signing algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    /// RSA using SHA-256
    #[default]
    RS256,
    /// RSA using SHA-384
    RS384,
    /// RSA using SHA-512
    RS512,
}

impl From<JwtAlgorithm> for jsonwebtoken::Algorithm {
    fn from(alg: JwtAlgorithm) -> Self {
        match alg {
            JwtAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            JwtAlgorithm::RS384 => jsonwebtoken::Algorithm::RS384,
            JwtAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
        }
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_range_parse() {
        let range = DateRange::parse("2024-01-01", "2024-01-02").unwrap();
        assert_eq!(range.since(), "2024-01-01");
        assert_eq!(range.until(), "2024-01-02");
        assert_eq!(range.to_string(), "2024-01-01..2024-01-02");
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        let err = DateRange::parse("2024-02-01", "2024-01-01").unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange { .. }));
    }

    #[test]
    fn test_date_range_rejects_bad_format() {
        assert!(DateRange::parse("01/02/2024", "2024-01-03").is_err());
        assert!(DateRange::parse("2024-01-01", "").is_err());
    }

    #[test]
    fn test_date_range_trailing_default() {
        let range = DateRange::parse_or_trailing(None, None, 7).unwrap();
        assert_eq!((range.end() - range.start()).num_days(), 7);
        assert_eq!(range.end(), Utc::now().date_naive());

        let range = DateRange::parse_or_trailing(Some("2024-03-03"), Some(""), 7).unwrap();
        assert_eq!(range.since(), "2024-03-03");
        assert_eq!(range.end(), Utc::now().date_naive());
    }

    #[test]
    fn test_date_range_default_start_follows_end() {
        let range = DateRange::parse_or_trailing(None, Some("2020-01-10"), 7).unwrap();
        assert_eq!(range.since(), "2020-01-03");
        assert_eq!(range.until(), "2020-01-10");
    }

    #[test]
    fn test_date_range_unreachable_window_is_an_error() {
        let err = DateRange::parse_or_trailing(None, Some("2020-01-10"), i64::MAX).unwrap_err();
        assert!(matches!(err, Error::InvalidDateRange { .. }));
        assert!(DateRange::parse_or_trailing(None, None, -1).is_err());
    }

    #[test]
    fn test_jwt_algorithm_conversion() {
        assert_eq!(jsonwebtoken::Algorithm::RS256, JwtAlgorithm::RS256.into());
        assert_eq!(jsonwebtoken::Algorithm::RS512, JwtAlgorithm::RS512.into());
    }

    #[test]
    fn test_option_string_none_if_empty() {
        assert_eq!(
            Some("test".to_string()).none_if_empty(),
            Some("test".to_string())
        );
        assert_eq!(Some(String::new()).none_if_empty(), None);
        assert_eq!(None::<String>.none_if_empty(), None);
    }
}
