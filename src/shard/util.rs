//! Utility functions for shard layout
//!
//! Provides helpers for naming shard directories under a tenant directory and
//! discovering the shards that already exist on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::shard::{DayKey, ShardError, ShardResult, SHARD_EXTENSION, SHARD_LAYOUT_VERSION};

/// Get the directory for a day's shard
pub fn shard_path(tenant_dir: &Path, day: &DayKey) -> PathBuf {
    tenant_dir.join(format!("{}_{}.{}", day, SHARD_LAYOUT_VERSION, SHARD_EXTENSION))
}

/// Check if a shard directory exists
pub fn shard_exists(tenant_dir: &Path, day: &DayKey) -> bool {
    shard_path(tenant_dir, day).is_dir()
}

/// Recover the day key from a shard directory name
pub fn parse_shard_dir_name(path: &Path) -> ShardResult<DayKey> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ShardError::layout(path, "shard name is not valid UTF-8"))?;

    let stem = name
        .strip_suffix(&format!(".{}", SHARD_EXTENSION))
        .ok_or_else(|| ShardError::layout(path, "missing shard extension"))?;

    let (day, version) = stem
        .split_once('_')
        .ok_or_else(|| ShardError::layout(path, "missing layout version"))?;

    if version != SHARD_LAYOUT_VERSION.to_string() {
        return Err(ShardError::layout(
            path,
            format!("unsupported layout version {}", version),
        ));
    }

    DayKey::parse(day)
}

/// List all shard directories under a tenant directory, sorted by day
pub fn list_shard_dirs(tenant_dir: &Path) -> ShardResult<Vec<(DayKey, PathBuf)>> {
    if !tenant_dir.exists() {
        return Ok(Vec::new());
    }

    let mut result = Vec::new();

    for entry in fs::read_dir(tenant_dir)? {
        let entry = entry?;
        let path = entry.path();

        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with('.'));
        if hidden || !path.is_dir() {
            continue;
        }

        match parse_shard_dir_name(&path) {
            Ok(day) => result.push((day, path)),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unrecognised tenant entry"),
        }
    }

    result.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(result)
}

/// Create the tenant directory if it doesn't exist
pub fn ensure_tenant_dir(tenant_dir: &Path) -> ShardResult<()> {
    if !tenant_dir.exists() {
        fs::create_dir_all(tenant_dir).map_err(|e| {
            ShardError::layout(tenant_dir, format!("Failed to create tenant directory: {}", e))
        })?;
    }

    Ok(())
}

/// Total size in bytes of the files directly inside a shard directory
pub fn dir_size_bytes(path: &Path) -> ShardResult<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let metadata = entry?.metadata()?;
        if metadata.is_file() {
            total += metadata.len();
        }
    }
    Ok(total)
}
