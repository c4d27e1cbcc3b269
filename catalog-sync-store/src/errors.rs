//! Primary store error types.

use catalog_sync_shared::EntityKind;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while reading from or writing to the primary store.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// The entity does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    /// The store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A write was rejected.
    #[error("Write error: {0}")]
    WriteError(String),

    /// Reading a catalog export failed.
    #[error("IO error: {0}")]
    IoError(String),

    /// A catalog export could not be decoded.
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl StoreError {
    /// Create a not found error.
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a write error.
    pub fn write(msg: impl Into<String>) -> Self {
        Self::WriteError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}
