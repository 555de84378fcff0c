//! Configuration for firlog
//!
//! This module provides the options for a tenant registry: where data lives,
//! which tenants are configured, and how shards are written and searched.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_SEARCH_LIMIT;
use crate::error::{Error, Result};
use crate::index::MIN_WRITER_HEAP_SIZE;

/// Configuration options for a tenant registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct EngineConfig {
    // Storage
    /// Base directory; each tenant lives in `data_dir/<token>`
    pub data_dir: PathBuf,
    /// Configured tenant tokens
    pub tokens: Vec<String>,
    /// Memory budget of each shard's index writer in bytes
    pub writer_heap_size: usize,

    // Search
    /// Result cap used when a request sets none
    pub default_search_limit: usize,
    /// Skip shards whose day lies outside the search range
    pub prune_shards: bool,

    // Identifiers
    /// Number of idle entropy sources kept for identifier generation
    pub entropy_pool_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tokens: Vec::new(),
            writer_heap_size: 50_000_000,
            default_search_limit: DEFAULT_SEARCH_LIMIT,
            prune_shards: true,
            entropy_pool_size: 10,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base data directory
    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the configured tokens
    pub fn with_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Set the configured tokens from a comma-separated list
    pub fn with_token_list(self, list: &str) -> Self {
        self.with_tokens(parse_token_list(list))
    }

    /// Set the per-shard writer heap size
    pub fn with_writer_heap_size(mut self, size: usize) -> Self {
        self.writer_heap_size = size;
        self
    }

    /// Set the default search limit
    pub fn with_default_search_limit(mut self, limit: usize) -> Self {
        self.default_search_limit = limit;
        self
    }

    /// Enable or disable shard pruning
    pub fn with_prune_shards(mut self, prune: bool) -> Self {
        self.prune_shards = prune;
        self
    }

    /// Set the entropy pool size
    pub fn with_entropy_pool_size(mut self, size: usize) -> Self {
        self.entropy_pool_size = size;
        self
    }

    /// Directory holding a tenant's shards
    pub fn tenant_dir(&self, token: &str) -> PathBuf {
        self.data_dir.join(token)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.tokens.is_empty() {
            return Err(Error::config("At least one token must be configured"));
        }

        for token in &self.tokens {
            validate_token(token)?;
        }

        if self.writer_heap_size < MIN_WRITER_HEAP_SIZE {
            return Err(Error::config(format!(
                "Writer heap size must be at least {} bytes",
                MIN_WRITER_HEAP_SIZE
            )));
        }

        if self.default_search_limit < 1 {
            return Err(Error::config("Default search limit must be at least 1"));
        }

        if self.entropy_pool_size < 1 {
            return Err(Error::config("Entropy pool size must be at least 1"));
        }

        Ok(())
    }

    /// Create a human-readable string representation of the configuration
    pub fn to_string_pretty(&self) -> String {
        let mut result = String::new();

        result.push_str("=== firlog configuration ===\n\n");

        result.push_str("Storage:\n");
        result.push_str(&format!("  Data Directory: {:?}\n", self.data_dir));
        result.push_str(&format!("  Tokens: {}\n", self.tokens.len()));
        result.push_str(&format!("  Writer Heap: {} MB\n", self.writer_heap_size / 1_000_000));

        result.push_str("\nSearch:\n");
        result.push_str(&format!("  Default Limit: {}\n", self.default_search_limit));
        result.push_str(&format!("  Prune Shards: {}\n", self.prune_shards));

        result.push_str("\nIdentifiers:\n");
        result.push_str(&format!("  Entropy Pool: {}\n", self.entropy_pool_size));

        result
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse TOML: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize to TOML: {}", e)))?;

        std::fs::write(path, content)?;

        Ok(())
    }
}

/// Split a comma-separated token list, dropping empty entries
pub fn parse_token_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check that a token is usable as a single directory name
pub fn validate_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(Error::config("Tokens must not be empty"));
    }

    if token.starts_with('.') || token.contains('/') || token.contains('\\') {
        return Err(Error::config(format!(
            "Token '{}' is not a valid directory name",
            token
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert!(config.tokens.is_empty());
        assert_eq!(config.writer_heap_size, 50_000_000);
        assert_eq!(config.default_search_limit, 1000);
        assert_eq!(config.entropy_pool_size, 10);
        assert!(config.prune_shards);
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::new()
            .with_data_dir("/var/lib/firlog")
            .with_tokens(["a", "b"])
            .with_writer_heap_size(20_000_000)
            .with_default_search_limit(50)
            .with_prune_shards(false)
            .with_entropy_pool_size(4);

        assert_eq!(config.tenant_dir("a"), PathBuf::from("/var/lib/firlog/a"));
        assert_eq!(config.tokens, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.writer_heap_size, 20_000_000);
        assert_eq!(config.default_search_limit, 50);
        assert!(!config.prune_shards);
        assert_eq!(config.entropy_pool_size, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let valid = EngineConfig::new().with_tokens(["token-a"]);
        assert!(valid.validate().is_ok());

        assert!(EngineConfig::new().validate().is_err());
        assert!(valid.clone().with_tokens(["../etc"]).validate().is_err());
        assert!(valid.clone().with_tokens(["a/b"]).validate().is_err());
        assert!(valid.clone().with_tokens([".."]).validate().is_err());
        assert!(valid.clone().with_tokens([""]).validate().is_err());
        assert!(valid.clone().with_writer_heap_size(1_000_000).validate().is_err());
        assert!(valid.clone().with_default_search_limit(0).validate().is_err());
        assert!(valid.with_entropy_pool_size(0).validate().is_err());
    }

    #[test]
    fn test_parse_token_list() {
        assert_eq!(parse_token_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_token_list("").is_empty());

        let config = EngineConfig::new().with_token_list("token-a, token-b");
        assert_eq!(config.tokens, vec!["token-a".to_string(), "token-b".to_string()]);
        assert!(EngineConfig::new().with_token_list(" , ").validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() -> Result<()> {
        let temp_dir = tempdir()?;
        let path = temp_dir.path().join("firlog.toml");

        let config = EngineConfig::new()
            .with_tokens(["a"])
            .with_default_search_limit(25);
        config.to_toml_file(&path)?;

        let loaded = EngineConfig::from_toml_file(&path)?;
        assert_eq!(loaded, config);

        std::fs::write(&path, "tokens = [\"x\"]\n")?;
        let partial = EngineConfig::from_toml_file(&path)?;
        assert_eq!(partial.tokens, vec!["x".to_string()]);
        assert_eq!(partial.default_search_limit, 1000);

        std::fs::write(&path, "tokens = 3\n")?;
        assert!(matches!(EngineConfig::from_toml_file(&path), Err(Error::Config(_))));

        Ok(())
    }

    #[test]
    fn test_config_pretty_string() {
        let pretty = EngineConfig::new().with_tokens(["a"]).to_string_pretty();
        assert!(pretty.contains("Tokens: 1"));
        assert!(pretty.contains("Default Limit: 1000"));
    }
}
