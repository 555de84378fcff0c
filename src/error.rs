//! Error handling for firlog
//!
//! This module provides error types and result aliases for ingestion, indexing
//! and search operations.

use std::io;
use thiserror::Error;

use crate::shard::ShardError;

/// Errors that can occur in firlog operations
#[derive(Error, Debug)]
pub enum Error {
    /// Errors related to I/O operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors raised by the underlying full-text index
    #[error("Index error: {0}")]
    Index(String),

    /// Errors related to query parsing or execution
    #[error("Query error: {0}")]
    Query(String),

    /// Errors related to shard routing and layout
    #[error("Shard error: {0}")]
    Shard(String),

    /// Errors related to configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored record could not be re-hydrated
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Errors related to timestamp operations
    #[error("Timestamp error: {0}")]
    Timestamp(String),
}

/// Result type for firlog operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new index error
    pub fn index(message: impl Into<String>) -> Self {
        Self::Index(message.into())
    }

    /// Create a new query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }

    /// Create a new shard error
    pub fn shard(message: impl Into<String>) -> Self {
        Self::Shard(message.into())
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption(message.into())
    }

    /// Create a new timestamp error
    pub fn timestamp(message: impl Into<String>) -> Self {
        Self::Timestamp(message.into())
    }

    /// Check if this is an I/O error
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Check if this is a storage-level failure (index, shard or I/O)
    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Index(_) | Self::Shard(_))
    }

    /// Check if this is a query error
    pub fn is_query_error(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    /// Check if this is a corruption error
    pub fn is_corruption_error(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }

    /// Get a user-friendly suggestion for resolving the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Io(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                Some("Verify permissions on the data directory".to_string())
            }
            Self::Query(_) => Some(
                "Only the time, level and msg fields are searchable by name".to_string(),
            ),
            Self::Config(_) => Some("Check the engine configuration values".to_string()),
            Self::Corruption(_) => {
                Some("A stored record is unreadable; consider restoring the shard from a backup".to_string())
            }
            _ => None,
        }
    }
}

impl From<tantivy::TantivyError> for Error {
    fn from(err: tantivy::TantivyError) -> Self {
        Self::Index(err.to_string())
    }
}

impl From<ShardError> for Error {
    fn from(err: ShardError) -> Self {
        match err {
            ShardError::Io(err) => Self::Io(err),
            other => Self::shard(other.to_string()),
        }
    }
}
