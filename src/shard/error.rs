//! Error types for the shard module
//!
//! Defines error types specific to day-key derivation and shard layout.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during shard operations
#[derive(Error, Debug)]
pub enum ShardError {
    /// Error when a day key is malformed
    #[error("Invalid day key: {0}")]
    InvalidDay(String),

    /// Error when a shard directory name does not follow the layout
    #[error("Unrecognised shard entry {path:?}: {message}")]
    Layout {
        path: PathBuf,
        message: String,
    },

    /// Error when a shard cannot be opened or created
    #[error("Failed to open shard {day} at {path:?}: {message}")]
    Open {
        day: String,
        path: PathBuf,
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for shard operations
pub type ShardResult<T> = std::result::Result<T, ShardError>;

impl ShardError {
    /// Create a new invalid day key error
    pub fn invalid_day(key: impl Into<String>) -> Self {
        Self::InvalidDay(key.into())
    }

    /// Create a new layout error
    pub fn layout(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Layout {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new open error
    pub fn open(day: impl Into<String>, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Open {
            day: day.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this is an I/O error
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_error_creation() {
        let err = ShardError::layout("/data/t1/notes.txt", "not a shard directory");
        assert!(matches!(err, ShardError::Layout { ref path, .. } if path == &PathBuf::from("/data/t1/notes.txt")));

        let err = ShardError::invalid_day("2023131");
        assert_eq!(err.to_string(), "Invalid day key: 2023131");
    }

    #[test]
    fn test_shard_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = ShardError::from(io_err);
        assert!(err.is_io_error());
    }
}
