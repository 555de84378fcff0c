//! Ingestion and search counters
//!
//! One [`IngestMetrics`] is shared by a registry and all of its engines. Every
//! counter is a relaxed atomic; [`IngestMetrics::snapshot`] produces a
//! serializable point-in-time copy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Counters for ingestion, indexing and search
#[derive(Debug)]
pub struct IngestMetrics {
    // Ingestion
    /// Non-empty lines received
    lines_received: AtomicU64,
    /// Lines turned into records
    records_parsed: AtomicU64,
    /// Lines skipped as malformed
    malformed_lines: AtomicU64,

    // Indexing
    /// Records committed to a shard
    records_indexed: AtomicU64,
    /// Successful shard commits
    shard_commits: AtomicU64,
    /// Failed shard commits
    commit_failures: AtomicU64,
    /// Shards created on disk
    shards_created: AtomicU64,
    /// Persisted shards opened
    shards_opened: AtomicU64,

    // Search
    /// Searches executed
    searches: AtomicU64,
    /// Records returned by searches
    search_hits: AtomicU64,
    /// Cumulative search time in nanoseconds
    search_duration_ns: AtomicU64,

    start_time: Instant,
}

/// Point-in-time copy of [`IngestMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub lines_received: u64,
    pub records_parsed: u64,
    pub malformed_lines: u64,
    pub records_indexed: u64,
    pub shard_commits: u64,
    pub commit_failures: u64,
    pub shards_created: u64,
    pub shards_opened: u64,
    pub searches: u64,
    pub search_hits: u64,
    pub search_time_ms: u64,
    pub uptime_secs: u64,
}

impl Default for IngestMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestMetrics {
    /// Create a zeroed metrics collector
    pub fn new() -> Self {
        Self {
            lines_received: AtomicU64::new(0),
            records_parsed: AtomicU64::new(0),
            malformed_lines: AtomicU64::new(0),
            records_indexed: AtomicU64::new(0),
            shard_commits: AtomicU64::new(0),
            commit_failures: AtomicU64::new(0),
            shards_created: AtomicU64::new(0),
            shards_opened: AtomicU64::new(0),
            searches: AtomicU64::new(0),
            search_hits: AtomicU64::new(0),
            search_duration_ns: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record the outcome of parsing one payload
    pub fn record_payload(&self, parsed: usize, malformed: usize) {
        let parsed = parsed as u64;
        let malformed = malformed as u64;
        self.lines_received.fetch_add(parsed + malformed, Ordering::Relaxed);
        self.records_parsed.fetch_add(parsed, Ordering::Relaxed);
        self.malformed_lines.fetch_add(malformed, Ordering::Relaxed);
    }

    /// Record a successful shard commit of `records` records
    pub fn record_commit(&self, records: usize) {
        self.shard_commits.fetch_add(1, Ordering::Relaxed);
        self.records_indexed.fetch_add(records as u64, Ordering::Relaxed);
    }

    /// Increment failed commit count
    pub fn increment_commit_failures(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment created shard count
    pub fn increment_shards_created(&self) {
        self.shards_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment opened shard count
    pub fn increment_shards_opened(&self) {
        self.shards_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed search
    pub fn record_search(&self, duration: Duration, hits: usize) {
        self.searches.fetch_add(1, Ordering::Relaxed);
        self.search_hits.fetch_add(hits as u64, Ordering::Relaxed);
        self.search_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Get total search time
    pub fn get_search_duration(&self) -> Duration {
        Duration::from_nanos(self.search_duration_ns.load(Ordering::Relaxed))
    }

    /// Get average search time
    pub fn get_avg_search_duration(&self) -> Duration {
        let searches = self.searches.load(Ordering::Relaxed);
        if searches == 0 {
            return Duration::ZERO;
        }

        self.get_search_duration() / searches as u32
    }

    /// Get uptime of the metrics collector
    pub fn get_uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_received: self.lines_received.load(Ordering::Relaxed),
            records_parsed: self.records_parsed.load(Ordering::Relaxed),
            malformed_lines: self.malformed_lines.load(Ordering::Relaxed),
            records_indexed: self.records_indexed.load(Ordering::Relaxed),
            shard_commits: self.shard_commits.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            shards_created: self.shards_created.load(Ordering::Relaxed),
            shards_opened: self.shards_opened.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            search_hits: self.search_hits.load(Ordering::Relaxed),
            search_time_ms: self.get_search_duration().as_millis() as u64,
            uptime_secs: self.get_uptime().as_secs(),
        }
    }

    /// Get a human-readable report of all metrics
    pub fn get_report(&self) -> String {
        let snapshot = self.snapshot();
        let mut report = String::new();

        report.push_str("=== firlog metrics ===\n\n");
        report.push_str(&format!("Uptime: {:?}\n\n", self.get_uptime()));

        report.push_str("Ingestion:\n");
        report.push_str(&format!("  Lines: {}\n", snapshot.lines_received));
        report.push_str(&format!("  Records: {}\n", snapshot.records_parsed));
        report.push_str(&format!("  Malformed: {}\n\n", snapshot.malformed_lines));

        report.push_str("Indexing:\n");
        report.push_str(&format!("  Indexed: {}\n", snapshot.records_indexed));
        report.push_str(&format!("  Commits: {}\n", snapshot.shard_commits));
        report.push_str(&format!("  Failed Commits: {}\n", snapshot.commit_failures));
        report.push_str(&format!("  Shards Created: {}\n", snapshot.shards_created));
        report.push_str(&format!("  Shards Opened: {}\n\n", snapshot.shards_opened));

        report.push_str("Search:\n");
        report.push_str(&format!("  Searches: {}\n", snapshot.searches));
        report.push_str(&format!("  Hits: {}\n", snapshot.search_hits));
        report.push_str(&format!("  Avg. Search Time: {:?}\n", self.get_avg_search_duration()));

        report
    }
}
