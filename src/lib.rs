//! # firlog
//!
//! Multi-tenant log ingestion and search over day-sharded full-text indices.
//!
//! Drain payloads are parsed into [`LogRecord`]s, given time-sortable
//! identifiers and routed to one shard per UTC calendar day under a
//! per-tenant directory. Each shard's records are committed in one batch.
//! Searches fan out to a tenant's shards, merge the hits newest first and
//! rebuild every record from the raw payload stored alongside it.
//!
//! ```no_run
//! use firlog::{EngineConfig, SearchRequest, TenantRegistry, TimeRange};
//!
//! # fn main() -> firlog::Result<()> {
//! let config = EngineConfig::new()
//!     .with_data_dir("data")
//!     .with_tokens(["token-a"]);
//! let registry = TenantRegistry::open(config)?;
//!
//! registry.ingest(
//!     "token-a",
//!     "1 <1>1 2020-01-01T00:00:00Z host1 app1 web.1 - hello world\n",
//! )?;
//!
//! let range = TimeRange::parse_rfc3339("2020-01-01T00:00:00Z", "2020-01-01T23:59:59Z")?;
//! let results = registry.search("token-a", &SearchRequest::new("msg:hello", range))?;
//! for record in &results.records {
//!     let view = record.view()?;
//!     println!("{} {} {}", view.time, view.message, view.data);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod id;
pub mod index;
pub mod metrics;
pub mod parser;
pub mod query;
pub mod record;
pub mod registry;
pub mod shard;

pub use config::EngineConfig;
pub use engine::TenantEngine;
pub use error::{Error, Result};
pub use id::IdGenerator;
pub use index::{IndexBackend, IndexDocument, SearchHit, ShardIndex, TantivyBackend};
pub use metrics::{IngestMetrics, MetricsSnapshot};
pub use parser::{parse_line, parse_payload, ParseError, ParsedPayload};
pub use query::{SearchRequest, SearchResults, TimeRange};
pub use record::{LogRecord, RecordView};
pub use registry::{IngestReport, TenantRegistry};
pub use shard::{DayKey, ShardManager, ShardStats};
