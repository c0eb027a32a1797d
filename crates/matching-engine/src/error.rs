//! Matching engine error types

use common::OrderId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during order matching and snapshot handling
#[derive(Error, Debug)]
pub enum MatchingError {
    /// Invalid order
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// An active order with this id is already resting
    #[error("Duplicate order id: {0}")]
    DuplicateOrder(OrderId),

    /// Snapshot file could not be opened, read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Snapshot content is structurally invalid
    #[error("Snapshot parse error: {0}")]
    Parse(String),

    /// Snapshot content is well formed but cannot be restored as-is
    #[error("Snapshot integrity violation: {0}")]
    Integrity(String),
}

impl MatchingError {
    /// Create an invalid order error
    pub fn invalid_order(msg: impl Into<String>) -> Self {
        Self::InvalidOrder(msg.into())
    }

    /// Wrap an I/O error with the file it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }
}
