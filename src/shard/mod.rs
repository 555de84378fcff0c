//! Day-based shard management for log storage
//!
//! This module organizes each tenant's logs into one shard per UTC calendar
//! day. Each shard is an independent full-text index living in its own
//! directory under the tenant directory, named `<YYYYMMDD>_1.shard`.

mod day;
mod error;
mod info;
mod manager;
pub(crate) mod util;

pub use day::DayKey;
pub use error::{ShardError, ShardResult};
pub use info::ShardStats;
pub use manager::{Shard, ShardManager};

/// Directory extension for shard directories
pub(crate) const SHARD_EXTENSION: &str = "shard";
/// Layout version embedded in shard directory names
pub(crate) const SHARD_LAYOUT_VERSION: u32 = 1;
