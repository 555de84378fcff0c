//! Per-tenant engine
//!
//! A [`TenantEngine`] owns every shard of one tenant. Indexing groups records
//! by day and commits each day's documents in a single batch. Search fans the
//! query out to the shards in parallel, merges the hits newest first and
//! rebuilds each record from the raw payload stored next to it.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::index::{IndexBackend, IndexDocument, SearchHit};
use crate::metrics::IngestMetrics;
use crate::query::{SearchRequest, SearchResults};
use crate::record::LogRecord;
use crate::shard::{DayKey, ShardManager, ShardStats};

/// Default number of results when a request sets no limit
pub const DEFAULT_SEARCH_LIMIT: usize = 1000;

/// All shards of one tenant plus indexing and search over them
pub struct TenantEngine {
    shards: ShardManager,
    metrics: Arc<IngestMetrics>,
    default_limit: usize,
    prune_shards: bool,
}

impl TenantEngine {
    /// Open the engine for `token`, discovering its persisted shards
    pub fn open(
        token: impl Into<String>,
        tenant_dir: impl Into<PathBuf>,
        backend: Arc<dyn IndexBackend>,
        metrics: Arc<IngestMetrics>,
    ) -> Result<Self> {
        let shards = ShardManager::open(token, tenant_dir, backend, Arc::clone(&metrics))?;
        Ok(Self {
            shards,
            metrics,
            default_limit: DEFAULT_SEARCH_LIMIT,
            prune_shards: true,
        })
    }

    /// Set the result cap used when a request sets none
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }

    /// Enable or disable skipping shards outside the search range
    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.prune_shards = prune;
        self
    }

    /// Tenant token
    pub fn token(&self) -> &str {
        self.shards.tenant()
    }

    /// The tenant's shard router
    pub fn shards(&self) -> &ShardManager {
        &self.shards
    }

    /// Index records, committing one batch per day touched
    ///
    /// Every day's batch is attempted. A failed batch loses only that day's
    /// records; batches already committed for other days stay committed. The
    /// first failure is returned. On success the number of shards written is
    /// returned.
    pub fn index(&self, records: &[LogRecord]) -> Result<usize> {
        let mut batches: BTreeMap<DayKey, Vec<IndexDocument>> = BTreeMap::new();
        for record in records {
            batches
                .entry(DayKey::from_timestamp(&record.timestamp))
                .or_default()
                .push(IndexDocument::from_record(record)?);
        }

        let touched = batches.len();
        let mut first_error = None;

        for (day, docs) in batches {
            let count = docs.len();
            let committed = self
                .shards
                .shard_for(&day)
                .and_then(|shard| shard.index().add_batch(docs));

            match committed {
                Ok(()) => {
                    self.metrics.record_commit(count);
                    debug!(tenant = %self.token(), day = %day, records = count, "Committed shard batch");
                }
                Err(e) => {
                    self.metrics.increment_commit_failures();
                    error!(
                        tenant = %self.token(),
                        day = %day,
                        records = count,
                        error = %e,
                        suggestion = ?e.suggestion(),
                        "Shard batch failed"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(touched),
        }
    }

    /// Search the tenant's shards, newest first
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let start = Instant::now();
        let limit = request.limit_or(self.default_limit);

        if limit == 0 || request.range.is_empty() {
            return Ok(SearchResults {
                records: Vec::new(),
                took: start.elapsed(),
            });
        }

        let shards = if self.prune_shards {
            self.shards.shards_overlapping(&request.range)
        } else {
            self.shards.shards()
        };

        debug!(tenant = %self.token(), query = %request.query, shards = shards.len(), limit, "Searching shards");

        let per_shard = shards
            .par_iter()
            .map(|shard| shard.index().search(request, limit))
            .collect::<Result<Vec<Vec<SearchHit>>>>()?;

        let mut hits: Vec<SearchHit> = per_shard
            .into_iter()
            .flatten()
            .filter(|hit| request.range.contains(&hit.time))
            .collect();
        hits.sort_by(SearchHit::cmp_newest_first);
        hits.truncate(limit);

        let mut records = hits
            .par_iter()
            .map(|hit| self.rehydrate(hit))
            .collect::<Result<Vec<LogRecord>>>()?;

        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });

        let took = start.elapsed();
        self.metrics.record_search(took, records.len());

        Ok(SearchResults { records, took })
    }

    /// Statistics for every open shard, keyed by day
    pub fn stats(&self) -> Result<BTreeMap<String, ShardStats>> {
        self.shards.stats()
    }

    fn rehydrate(&self, hit: &SearchHit) -> Result<LogRecord> {
        let day = DayKey::from_timestamp(&hit.time);
        let shard = self
            .shards
            .get(&day)
            .ok_or_else(|| Error::corruption(format!("hit {} points at unopened shard {}", hit.id, day)))?;

        let raw = shard
            .index()
            .get_raw(&hit.id)?
            .ok_or_else(|| Error::corruption(format!("no stored payload for {} in shard {}", hit.id, day)))?;

        LogRecord::from_raw(&raw)
    }
}
