//! Shard router
//!
//! Maps a day key to the open shard for that day, opening it from disk or
//! creating it on first use. The map only grows: a shard stays open for the
//! life of its manager.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::{util, DayKey, ShardError, ShardStats};
use crate::error::Result;
use crate::index::{IndexBackend, ShardIndex};
use crate::metrics::IngestMetrics;
use crate::query::TimeRange;

/// An open shard: one day's index for one tenant
pub struct Shard {
    day: DayKey,
    path: PathBuf,
    index: Arc<dyn ShardIndex>,
}

impl Shard {
    /// Day covered by the shard
    pub fn day(&self) -> &DayKey {
        &self.day
    }

    /// Directory holding the shard
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The shard's index
    pub fn index(&self) -> &dyn ShardIndex {
        self.index.as_ref()
    }

    /// Statistics, including the covered day
    pub fn stats(&self) -> Result<ShardStats> {
        let (start, end) = self.day.time_range();
        let mut stats = self.index.stats()?;
        stats.start_time = Some(start);
        stats.end_time = Some(end);
        Ok(stats)
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("day", &self.day)
            .field("path", &self.path)
            .finish()
    }
}

/// Owns the open shards of one tenant
pub struct ShardManager {
    tenant: String,
    tenant_dir: PathBuf,
    backend: Arc<dyn IndexBackend>,
    metrics: Arc<IngestMetrics>,
    shards: RwLock<BTreeMap<DayKey, Arc<Shard>>>,
}

impl ShardManager {
    /// Create a manager over `tenant_dir`, opening every shard already on disk
    pub fn open(
        tenant: impl Into<String>,
        tenant_dir: impl Into<PathBuf>,
        backend: Arc<dyn IndexBackend>,
        metrics: Arc<IngestMetrics>,
    ) -> Result<Self> {
        let tenant = tenant.into();
        let tenant_dir = tenant_dir.into();
        util::ensure_tenant_dir(&tenant_dir)?;

        let mut shards = BTreeMap::new();
        for (day, path) in util::list_shard_dirs(&tenant_dir)? {
            // A shard that fails here is retried, and reported, on first use
            match backend.open(&path) {
                Ok(index) => {
                    metrics.increment_shards_opened();
                    shards.insert(day.clone(), Arc::new(Shard { day, path, index }));
                }
                Err(e) => warn!(tenant = %tenant, day = %day, error = %e, "Failed to open persisted shard"),
            }
        }

        info!(tenant = %tenant, shards = shards.len(), "Opened tenant shards");

        Ok(Self {
            tenant,
            tenant_dir,
            backend,
            metrics,
            shards: RwLock::new(shards),
        })
    }

    /// Tenant the manager belongs to
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Directory holding the tenant's shards
    pub fn tenant_dir(&self) -> &Path {
        &self.tenant_dir
    }

    /// Get the open shard for a day, opening or creating it if needed
    pub fn shard_for(&self, day: &DayKey) -> Result<Arc<Shard>> {
        if let Some(shard) = self.shards.read().get(day) {
            return Ok(Arc::clone(shard));
        }

        let mut shards = self.shards.write();
        // Another caller may have opened it while we waited
        if let Some(shard) = shards.get(day) {
            return Ok(Arc::clone(shard));
        }

        let path = util::shard_path(&self.tenant_dir, day);
        let index = if util::shard_exists(&self.tenant_dir, day) {
            let index = self
                .backend
                .open(&path)
                .map_err(|e| ShardError::open(day.as_str(), &path, e.to_string()))?;
            self.metrics.increment_shards_opened();
            info!(tenant = %self.tenant, day = %day, "Opened shard");
            index
        } else {
            let index = self
                .backend
                .create(&path)
                .map_err(|e| ShardError::open(day.as_str(), &path, e.to_string()))?;
            self.metrics.increment_shards_created();
            info!(tenant = %self.tenant, day = %day, "Created shard");
            index
        };

        let shard = Arc::new(Shard {
            day: day.clone(),
            path,
            index,
        });
        shards.insert(day.clone(), Arc::clone(&shard));

        Ok(shard)
    }

    /// Get a shard only if it is already open
    pub fn get(&self, day: &DayKey) -> Option<Arc<Shard>> {
        self.shards.read().get(day).cloned()
    }

    /// All open shards, oldest first
    pub fn shards(&self) -> Vec<Arc<Shard>> {
        self.shards.read().values().cloned().collect()
    }

    /// Open shards whose day intersects the range
    pub fn shards_overlapping(&self, range: &TimeRange) -> Vec<Arc<Shard>> {
        self.shards
            .read()
            .values()
            .filter(|shard| shard.day.overlaps(&range.from, &range.to))
            .cloned()
            .collect()
    }

    /// Number of open shards
    pub fn len(&self) -> usize {
        self.shards.read().len()
    }

    /// Check if no shard is open
    pub fn is_empty(&self) -> bool {
        self.shards.read().is_empty()
    }

    /// Statistics for every open shard, keyed by day
    pub fn stats(&self) -> Result<BTreeMap<String, ShardStats>> {
        self.shards()
            .iter()
            .map(|shard| Ok((shard.day.to_string(), shard.stats()?)))
            .collect()
    }
}
