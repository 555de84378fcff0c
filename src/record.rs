//! Structured log records
//!
//! A [`LogRecord`] is one ingested event: an identifier, the UTC instant it
//! happened at, and an open map of JSON fields. The `id` and `time` keys are
//! always present in `fields`, so the serialized field map alone is enough to
//! rebuild the record.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Field holding the record identifier
pub const ID_FIELD: &str = "id";
/// Field holding the record timestamp
pub const TIME_FIELD: &str = "time";
/// Optional severity field
pub const LEVEL_FIELD: &str = "level";
/// Message field
pub const MSG_FIELD: &str = "msg";

/// Display format for record timestamps
const DISPLAY_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Fractional digits kept in record timestamps
pub const TIME_PRECISION_DIGITS: u16 = 6;

/// One ingested log event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unique, time-sortable identifier
    pub id: String,
    /// Instant the event happened at
    pub timestamp: DateTime<Utc>,
    /// All fields, including `id` and `time`
    pub fields: Map<String, Value>,
}

/// The display projection of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    /// `YYYY/MM/DD HH:MM:SS`
    pub time: String,
    /// Message, prefixed by the level when present
    pub message: String,
    /// JSON object of every remaining field
    pub data: String,
}

impl LogRecord {
    /// Create a record, stamping `id` and `time` into its fields
    ///
    /// The timestamp is truncated to microseconds, the precision shards index.
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, mut fields: Map<String, Value>) -> Self {
        let id = id.into();
        let timestamp = timestamp.trunc_subsecs(TIME_PRECISION_DIGITS);
        fields.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        fields.insert(TIME_FIELD.to_string(), Value::String(format_time(&timestamp)));

        Self { id, timestamp, fields }
    }

    /// Rebuild a record from its serialized field map
    pub fn from_raw(raw: &[u8]) -> Result<Self> {
        let fields: Map<String, Value> = serde_json::from_slice(raw)?;

        let id = fields
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::corruption("stored record has no id"))?
            .to_string();

        let time = fields
            .get(TIME_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::corruption(format!("stored record {} has no time", id)))?;

        let timestamp = DateTime::parse_from_rfc3339(time)
            .map_err(|e| Error::corruption(format!("stored record {} has invalid time: {}", id, e)))?
            .with_timezone(&Utc);

        Ok(Self { id, timestamp, fields })
    }

    /// Serialize the field map
    pub fn to_raw(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.fields)?)
    }

    /// Look up a field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The `level` field, if any
    pub fn level(&self) -> Option<&Value> {
        self.field(LEVEL_FIELD)
    }

    /// The `msg` field, if any
    pub fn msg(&self) -> Option<&Value> {
        self.field(MSG_FIELD)
    }

    /// Timestamp formatted for display
    pub fn formatted_time(&self) -> String {
        self.timestamp.format(DISPLAY_TIME_FORMAT).to_string()
    }

    /// Message formatted for display, prefixed by the level when present
    pub fn formatted_message(&self) -> String {
        let message = self.msg().map(value_text).unwrap_or_default();
        match self.level() {
            Some(level) => format!("{} {}", value_text(level), message),
            None => message,
        }
    }

    /// JSON object of all fields except `id`, `time`, `level` and `msg`
    pub fn formatted_data(&self) -> Result<String> {
        let data: Map<String, Value> = self
            .fields
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(serde_json::to_string(&data)?)
    }

    /// Build the display projection
    pub fn view(&self) -> Result<RecordView> {
        Ok(RecordView {
            time: self.formatted_time(),
            message: self.formatted_message(),
            data: self.formatted_data()?,
        })
    }
}

/// Render a timestamp the way it is stored in `fields["time"]`
pub fn format_time(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Text of a JSON value: strings verbatim, anything else as JSON
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_reserved(key: &str) -> bool {
    matches!(key, ID_FIELD | TIME_FIELD | LEVEL_FIELD | MSG_FIELD)
}
