//! Shard statistics
//!
//! Point-in-time snapshots of a shard's contents, reported per day for
//! operational visibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics snapshot for one shard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    /// Number of committed documents
    pub doc_count: u64,
    /// Number of index segments
    pub segment_count: usize,
    /// Size of the shard's files on disk in bytes
    pub size_bytes: u64,
    /// Start of the day covered by the shard
    pub start_time: Option<DateTime<Utc>>,
    /// End of the day covered by the shard (exclusive)
    pub end_time: Option<DateTime<Utc>>,
}

impl ShardStats {
    /// Create new empty shard stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the shard holds no documents
    pub fn is_empty(&self) -> bool {
        self.doc_count == 0
    }

    /// Calculate the average stored size per document
    pub fn avg_doc_size(&self) -> f64 {
        if self.doc_count == 0 {
            return 0.0;
        }

        self.size_bytes as f64 / self.doc_count as f64
    }
}
