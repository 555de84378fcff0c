use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::LogRecord;

/// Time range for searching logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start time (inclusive)
    pub from: DateTime<Utc>,
    /// End time (inclusive)
    pub to: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new time range
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Parse a range from two RFC3339 strings
    pub fn parse_rfc3339(from: &str, to: &str) -> Result<Self> {
        let parse = |value: &str| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| Error::timestamp(format!("invalid RFC3339 timestamp '{}': {}", value, e)))
        };
        Ok(Self::new(parse(from)?, parse(to)?))
    }

    /// Create a time range for the last N hours
    pub fn last_hours(hours: i64) -> Self {
        let to = Utc::now();
        let from = to - Duration::hours(hours);
        Self { from, to }
    }

    /// Create a time range for the last N days
    pub fn last_days(days: i64) -> Self {
        let to = Utc::now();
        let from = to - Duration::days(days);
        Self { from, to }
    }

    /// Create a time range for the last 24 hours
    pub fn last_24_hours() -> Self {
        Self::last_hours(24)
    }

    /// Create a time range for today
    pub fn today() -> Self {
        let now = Utc::now();
        let from = Utc
            .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
            .single()
            .unwrap_or(now);
        Self { from, to: now }
    }

    /// Check if a timestamp lies within the range
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.from && *timestamp <= self.to
    }

    /// Check if the range is empty (`from` after `to`)
    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::last_24_hours()
    }
}

/// A search over one tenant's logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query, e.g. `msg:hello AND level:error`; empty matches everything
    pub query: String,
    /// Inclusive time window applied to the `time` field
    pub range: TimeRange,
    /// Maximum number of results; the engine default applies when unset
    pub limit: Option<usize>,
}

impl SearchRequest {
    /// Create a new search request
    pub fn new(query: impl Into<String>, range: TimeRange) -> Self {
        Self {
            query: query.into(),
            range,
            limit: None,
        }
    }

    /// Set the result cap
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The result cap, falling back to a default
    pub fn limit_or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default)
    }
}

/// Records matching a search, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub records: Vec<LogRecord>,
    /// Wall time spent searching
    pub took: StdDuration,
}

impl SearchResults {
    /// Number of records returned
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing matched
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
