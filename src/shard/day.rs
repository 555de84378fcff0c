//! Calendar-day shard keys
//!
//! Every record is routed to exactly one shard, chosen from the UTC calendar
//! day of its own timestamp. The key is rendered as `YYYYMMDD`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::shard::{ShardError, ShardResult};

/// UTC calendar day used as the shard partition key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey {
    key: String,
    start: DateTime<Utc>,
}

impl DayKey {
    /// Derive the day key for a timestamp
    pub fn from_timestamp(timestamp: &DateTime<Utc>) -> Self {
        let start = Utc
            .with_ymd_and_hms(timestamp.year(), timestamp.month(), timestamp.day(), 0, 0, 0)
            .single()
            .unwrap_or(*timestamp);

        Self {
            key: format!(
                "{:04}{:02}{:02}",
                timestamp.year(),
                timestamp.month(),
                timestamp.day()
            ),
            start,
        }
    }

    /// Parse a `YYYYMMDD` key, rejecting anything that is not a real date
    pub fn parse(key: &str) -> ShardResult<Self> {
        let start = Self::start_of(key)?;
        Ok(Self {
            key: key.to_string(),
            start,
        })
    }

    /// The key as a string slice
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Start of the day (inclusive)
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// The `[start, end)` interval covered by this day
    pub fn time_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.start + ChronoDuration::days(1))
    }

    /// Check if a timestamp falls on this day
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        let (start, end) = self.time_range();
        *timestamp >= start && *timestamp < end
    }

    /// Check if this day intersects the inclusive range `[from, to]`
    pub fn overlaps(&self, from: &DateTime<Utc>, to: &DateTime<Utc>) -> bool {
        let (start, end) = self.time_range();
        start <= *to && end > *from
    }

    fn start_of(key: &str) -> ShardResult<DateTime<Utc>> {
        if key.len() != 8 || !key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ShardError::invalid_day(key));
        }

        let year = key[0..4]
            .parse::<i32>()
            .map_err(|_| ShardError::invalid_day(format!("invalid year in {}", key)))?;
        let month = key[4..6]
            .parse::<u32>()
            .map_err(|_| ShardError::invalid_day(format!("invalid month in {}", key)))?;
        let day = key[6..8]
            .parse::<u32>()
            .map_err(|_| ShardError::invalid_day(format!("invalid day in {}", key)))?;

        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
            .single()
            .ok_or_else(|| ShardError::invalid_day(format!("invalid date {}", key)))
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl FromStr for DayKey {
    type Err = ShardError;

    fn from_str(s: &str) -> ShardResult<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DayKey {
    type Error = ShardError;

    fn try_from(value: String) -> ShardResult<Self> {
        Self::parse(&value)
    }
}

impl From<DayKey> for String {
    fn from(key: DayKey) -> Self {
        key.key
    }
}
