//! Drain payload parsing
//!
//! A bulk payload is newline-delimited text. Each line carries eight
//! space-separated fields:
//!
//! ```text
//! <version> <pri> <RFC3339-timestamp> <host> <app> <process> <msgid> <message>
//! ```
//!
//! The message is either a bare string, stored as `msg`, or a JSON object whose
//! top-level keys are merged into the record. Malformed lines are skipped and
//! reported; they never fail the payload.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::id::IdGenerator;
use crate::record::{LogRecord, MSG_FIELD};

/// Number of space-separated fields in a drain line
pub const DRAIN_FIELD_COUNT: usize = 8;

/// Reasons a single drain line is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line has fewer than eight fields
    #[error("expected 8 fields, found {found}")]
    TooFewFields { found: usize },

    /// The third field is not an RFC3339 timestamp
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// The message looks like a JSON object but does not parse as one
    #[error("invalid JSON message: {0}")]
    InvalidJson(String),
}

/// A line that was skipped, with its 1-based position in the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLine {
    pub line_number: usize,
    pub error: ParseError,
}

/// Result of parsing one payload
#[derive(Debug, Clone, Default)]
pub struct ParsedPayload {
    /// Valid records, in input order
    pub records: Vec<LogRecord>,
    /// Lines that were skipped
    pub rejected: Vec<RejectedLine>,
}

impl ParsedPayload {
    /// Check if no valid records were produced
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A parsed line before it is given an identifier
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub timestamp: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

/// Parse a single drain line
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let parts: Vec<&str> = line.splitn(DRAIN_FIELD_COUNT, ' ').collect();
    if parts.len() != DRAIN_FIELD_COUNT {
        return Err(ParseError::TooFewFields { found: parts.len() });
    }

    let timestamp = DateTime::parse_from_rfc3339(parts[2])
        .map_err(|e| ParseError::InvalidTimestamp {
            value: parts[2].to_string(),
            reason: e.to_string(),
        })?
        .with_timezone(&Utc);

    let mut fields = Map::new();
    fields.insert("host".to_string(), Value::String(parts[3].to_string()));
    fields.insert("app".to_string(), Value::String(parts[4].to_string()));
    fields.insert("process".to_string(), Value::String(parts[5].to_string()));

    let message = parts[7];
    if message.len() >= 2 && message.starts_with('{') && message.ends_with('}') {
        let embedded: Map<String, Value> =
            serde_json::from_str(message).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        fields.extend(embedded);
    } else {
        fields.insert(MSG_FIELD.to_string(), Value::String(message.to_string()));
    }

    Ok(ParsedLine { timestamp, fields })
}

/// Parse a bulk payload, assigning every valid record an identifier
pub fn parse_payload(payload: &str, ids: &IdGenerator) -> ParsedPayload {
    let mut parsed = ParsedPayload::default();

    let body = payload.strip_suffix('\n').unwrap_or(payload);
    if body.is_empty() {
        return parsed;
    }

    for (index, line) in body.split('\n').enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(ParsedLine { timestamp, fields }) => {
                parsed.records.push(LogRecord::new(ids.generate(), timestamp, fields));
            }
            Err(error) => {
                warn!(line_number, error = %error, "Skipping malformed drain line");
                parsed.rejected.push(RejectedLine { line_number, error });
            }
        }
    }

    parsed
}
