//! Full-text index capability used by each shard
//!
//! The engine never talks to a text-indexing library directly. It builds an
//! [`IndexDocument`] per record, hands a shard's documents over in one
//! [`ShardIndex::add_batch`] call, and reads back [`SearchHit`]s and raw
//! payloads. [`IndexBackend`] creates or opens one such index per shard
//! directory.

mod tantivy_shard;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::query::SearchRequest;
use crate::record::{value_text, LogRecord};
use crate::shard::ShardStats;

pub use tantivy_shard::{TantivyBackend, TantivyShard};

/// Minimum heap a shard writer may be given
pub const MIN_WRITER_HEAP_SIZE: usize = 15_000_000;

/// One document as handed to a shard index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    /// Record identifier, used as the document key
    pub id: String,
    /// Indexed `time` value
    pub time: DateTime<Utc>,
    /// Indexed `level` text
    pub level: Option<String>,
    /// Indexed `msg` text
    pub msg: Option<String>,
    /// Serialized field map, stored but not indexed
    pub raw: Vec<u8>,
}

impl IndexDocument {
    /// Build the document for a record
    pub fn from_record(record: &LogRecord) -> Result<Self> {
        Ok(Self {
            id: record.id.clone(),
            time: record.timestamp,
            level: record.level().map(value_text),
            msg: record.msg().map(value_text),
            raw: record.to_raw()?,
        })
    }
}

/// A matching document, identified by key and time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: String,
    pub time: DateTime<Utc>,
}

impl SearchHit {
    /// Newest first, then highest id first
    pub fn cmp_newest_first(&self, other: &Self) -> std::cmp::Ordering {
        other.time.cmp(&self.time).then_with(|| other.id.cmp(&self.id))
    }
}

/// A single shard's full-text index
pub trait ShardIndex: Send + Sync {
    /// Add documents and commit them together
    fn add_batch(&self, docs: Vec<IndexDocument>) -> Result<()>;

    /// Fetch the raw payload stored under a key
    fn get_raw(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Run a query restricted to the request's time range, newest first
    fn search(&self, request: &SearchRequest, limit: usize) -> Result<Vec<SearchHit>>;

    /// Statistics snapshot
    fn stats(&self) -> Result<ShardStats>;
}

/// Creates and opens shard indices on disk
pub trait IndexBackend: Send + Sync {
    /// Create a new, empty index in `path`
    fn create(&self, path: &Path) -> Result<Arc<dyn ShardIndex>>;

    /// Open a persisted index in `path`
    fn open(&self, path: &Path) -> Result<Arc<dyn ShardIndex>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_document_from_record() -> Result<()> {
        let fields = json!({"msg": "disk full", "level": 3, "host": "h"});
        let timestamp = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let record = LogRecord::new("A", timestamp, fields.as_object().unwrap().clone());

        let doc = IndexDocument::from_record(&record)?;
        assert_eq!(doc.id, "A");
        assert_eq!(doc.msg.as_deref(), Some("disk full"));
        assert_eq!(doc.level.as_deref(), Some("3"));
        assert_eq!(LogRecord::from_raw(&doc.raw)?, record);

        Ok(())
    }

    #[test]
    fn test_hit_ordering() {
        let t = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let mut hits = vec![
            SearchHit { id: "A".into(), time: t },
            SearchHit { id: "B".into(), time: t },
            SearchHit { id: "C".into(), time: t - chrono::Duration::seconds(1) },
        ];
        hits.sort_by(SearchHit::cmp_newest_first);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "A", "C"]);
    }
}
