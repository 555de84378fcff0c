//! Tenant registry
//!
//! Maps authentication tokens to their [`TenantEngine`]. Engines for the
//! configured tokens are opened by [`TenantRegistry::prewarm`]; any other
//! token gets its engine on first use. Concurrent first uses of one token
//! open exactly one engine, and opening one tenant's engine never blocks
//! requests for the others.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{validate_token, EngineConfig};
use crate::engine::TenantEngine;
use crate::error::Result;
use crate::id::IdGenerator;
use crate::index::{IndexBackend, TantivyBackend};
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::parser::parse_payload;
use crate::query::{SearchRequest, SearchResults};
use crate::shard::ShardStats;

/// Outcome of ingesting one payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Records parsed and committed
    pub accepted: usize,
    /// Lines skipped as malformed
    pub rejected: usize,
    /// Shards written to
    pub shards_touched: usize,
}

/// An engine that is opened at most once
type EngineSlot = OnceCell<Arc<TenantEngine>>;

/// Process-wide token to engine map
pub struct TenantRegistry {
    config: EngineConfig,
    backend: Arc<dyn IndexBackend>,
    engines: RwLock<HashMap<String, Arc<EngineSlot>>>,
    ids: IdGenerator,
    metrics: Arc<IngestMetrics>,
}

impl TenantRegistry {
    /// Create a registry backed by tantivy shards
    pub fn new(config: EngineConfig) -> Result<Self> {
        let backend = Arc::new(TantivyBackend::new(config.writer_heap_size));
        Self::with_backend(config, backend)
    }

    /// Create a registry with a custom index backend
    pub fn with_backend(config: EngineConfig, backend: Arc<dyn IndexBackend>) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(Self {
            ids: IdGenerator::new(config.entropy_pool_size),
            config,
            backend,
            engines: RwLock::new(HashMap::new()),
            metrics: Arc::new(IngestMetrics::new()),
        })
    }

    /// Create a registry and open the engines of every configured token
    pub fn open(config: EngineConfig) -> Result<Self> {
        let registry = Self::new(config)?;
        registry.prewarm()?;
        Ok(registry)
    }

    /// Open the engine of every configured token
    pub fn prewarm(&self) -> Result<()> {
        for token in &self.config.tokens {
            self.engine(token)?;
        }
        info!(tenants = self.config.tokens.len(), "Pre-warmed tenant engines");
        Ok(())
    }

    /// Get the engine for a token, opening it if needed
    pub fn engine(&self, token: &str) -> Result<Arc<TenantEngine>> {
        let existing = self.engines.read().get(token).cloned();
        let slot = match existing {
            Some(slot) => slot,
            None => {
                validate_token(token)?;
                let mut engines = self.engines.write();
                Arc::clone(engines.entry(token.to_string()).or_default())
            }
        };

        // Only callers for this token wait here; a failed open leaves the
        // slot empty for the next caller to retry
        slot.get_or_try_init(|| self.open_engine(token)).map(Arc::clone)
    }

    fn open_engine(&self, token: &str) -> Result<Arc<TenantEngine>> {
        let engine = TenantEngine::open(
            token,
            self.config.tenant_dir(token),
            Arc::clone(&self.backend),
            Arc::clone(&self.metrics),
        )?
        .with_default_limit(self.config.default_search_limit)
        .with_pruning(self.config.prune_shards);

        info!(tenant = %token, "Opened tenant engine");
        Ok(Arc::new(engine))
    }

    /// Check if a token is in the configured list
    pub fn is_configured(&self, token: &str) -> bool {
        self.config.tokens.iter().any(|t| t == token)
    }

    /// Tokens with an open engine, sorted
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = self
            .engines
            .read()
            .iter()
            .filter(|(_, slot)| slot.get().is_some())
            .map(|(token, _)| token.clone())
            .collect();
        tokens.sort();
        tokens
    }

    /// Parse and index a drain payload for a tenant
    pub fn ingest(&self, token: &str, payload: &str) -> Result<IngestReport> {
        let parsed = parse_payload(payload, &self.ids);
        self.metrics.record_payload(parsed.records.len(), parsed.rejected.len());

        let mut report = IngestReport {
            accepted: 0,
            rejected: parsed.rejected.len(),
            shards_touched: 0,
        };

        if parsed.is_empty() {
            debug!(tenant = %token, rejected = report.rejected, "Payload has no valid records");
            return Ok(report);
        }

        let engine = self.engine(token)?;
        report.shards_touched = engine.index(&parsed.records)?;
        report.accepted = parsed.records.len();

        Ok(report)
    }

    /// Search a tenant's logs
    pub fn search(&self, token: &str, request: &SearchRequest) -> Result<SearchResults> {
        self.engine(token)?.search(request)
    }

    /// Statistics of every open engine: token to day to shard stats
    pub fn stats(&self) -> Result<BTreeMap<String, BTreeMap<String, ShardStats>>> {
        let engines: Vec<Arc<TenantEngine>> = self
            .engines
            .read()
            .values()
            .filter_map(|slot| slot.get().cloned())
            .collect();
        engines
            .iter()
            .map(|engine| Ok((engine.token().to_string(), engine.stats()?)))
            .collect()
    }

    /// Snapshot of the shared counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The registry's configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TimeRange;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;
    use test_log::test;

    fn config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig::new().with_data_dir(dir).with_tokens(["alpha", "beta"])
    }

    #[test]
    fn test_prewarm_opens_configured_tokens() -> Result<()> {
        let temp_dir = tempdir()?;
        let registry = TenantRegistry::open(config(temp_dir.path()))?;

        assert_eq!(registry.tokens(), vec!["alpha".to_string(), "beta".to_string()]);
        assert!(temp_dir.path().join("alpha").is_dir());
        assert!(registry.is_configured("beta"));
        assert!(!registry.is_configured("gamma"));

        Ok(())
    }

    #[test]
    fn test_engine_is_shared() -> Result<()> {
        let temp_dir = tempdir()?;
        let registry = Arc::new(TenantRegistry::new(config(temp_dir.path()))?);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.engine("gamma").map(|e| Arc::as_ptr(&e) as usize))
            })
            .collect();

        let pointers: Vec<usize> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Result<_>>()?;
        assert!(pointers.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(registry.tokens(), vec!["gamma".to_string()]);

        Ok(())
    }

    /// Backend whose shard opens wait until released
    #[derive(Default)]
    struct GatedBackend {
        entered: AtomicBool,
        release: AtomicBool,
    }

    impl IndexBackend for GatedBackend {
        fn create(&self, path: &std::path::Path) -> Result<Arc<dyn crate::index::ShardIndex>> {
            TantivyBackend::default().create(path)
        }

        fn open(&self, path: &std::path::Path) -> Result<Arc<dyn crate::index::ShardIndex>> {
            self.entered.store(true, Ordering::SeqCst);
            while !self.release.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }
            TantivyBackend::default().create(path)
        }
    }

    #[test]
    fn test_slow_open_does_not_block_other_tenants() -> Result<()> {
        let temp_dir = tempdir()?;
        std::fs::create_dir_all(temp_dir.path().join("slow").join("20200101_1.shard"))?;

        let backend = Arc::new(GatedBackend::default());
        let registry = Arc::new(TenantRegistry::with_backend(
            config(temp_dir.path()),
            Arc::clone(&backend) as Arc<dyn IndexBackend>,
        )?);

        let slow = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.engine("slow").map(|e| e.shards().len()))
        };
        while !backend.entered.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }

        registry.engine("fast")?;
        assert_eq!(registry.tokens(), vec!["fast".to_string()]);
        assert!(registry.stats()?["fast"].is_empty());

        backend.release.store(true, Ordering::SeqCst);
        assert_eq!(slow.join().unwrap()?, 1);
        assert_eq!(registry.tokens(), vec!["fast".to_string(), "slow".to_string()]);

        Ok(())
    }

    #[test]
    fn test_unsafe_token_is_rejected() -> Result<()> {
        let temp_dir = tempdir()?;
        let registry = TenantRegistry::new(config(temp_dir.path()))?;
        assert!(registry.engine("../alpha").is_err());
        assert!(registry.tokens().is_empty());
        Ok(())
    }

    #[test]
    fn test_empty_payload_does_not_open_engine() -> Result<()> {
        let temp_dir = tempdir()?;
        let registry = TenantRegistry::new(config(temp_dir.path()))?;

        let report = registry.ingest("alpha", "\n")?;
        assert_eq!(report, IngestReport::default());

        let report = registry.ingest("alpha", "not a drain line\n")?;
        assert_eq!(report.rejected, 1);
        assert_eq!(report.accepted, 0);
        assert!(registry.tokens().is_empty());

        Ok(())
    }

    #[test]
    fn test_ingest_and_search() -> Result<()> {
        let temp_dir = tempdir()?;
        let registry = TenantRegistry::new(config(temp_dir.path()))?;

        let payload = "1 <1>1 2020-01-01T00:00:00Z host1 app1 web.1 - hello world\n\
                       1 <1>1 2020-01-02T00:00:00Z host1 app1 web.1 - hello again\n\
                       broken\n";
        let report = registry.ingest("alpha", payload)?;
        assert_eq!(
            report,
            IngestReport {
                accepted: 2,
                rejected: 1,
                shards_touched: 2,
            }
        );

        let range = TimeRange::parse_rfc3339("2020-01-01T00:00:00Z", "2020-01-01T23:59:59Z")?;
        let results = registry.search("alpha", &SearchRequest::new("msg:hello", range))?;
        assert_eq!(results.len(), 1);
        assert_eq!(results.records[0].fields["msg"], "hello world");

        // Tenants are isolated
        let other = registry.search("beta", &SearchRequest::new("msg:hello", range))?;
        assert!(other.is_empty());

        let stats = registry.stats()?;
        assert_eq!(stats["alpha"].len(), 2);
        assert!(stats["beta"].is_empty());

        let metrics = registry.metrics();
        assert_eq!(metrics.records_indexed, 2);
        assert_eq!(metrics.malformed_lines, 1);

        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = TenantRegistry::new(EngineConfig::new()).err().unwrap();
        assert!(matches!(err, crate::error::Error::Config(_)));
    }
}
