//! Error types for the catalog sync pipeline.

use catalog_sync_repository::SearchIndexError;
use catalog_sync_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error from the primary store.
    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    /// Error from the search index.
    #[error("Search index error: {0}")]
    SearchIndexError(#[from] SearchIndexError),

    /// Error from the job queue.
    #[error("Queue error: {0}")]
    QueueError(String),

    /// Error persisting or restoring queue state.
    #[error("Snapshot error: {0}")]
    SnapshotError(String),
}

impl PipelineError {
    /// Create a queue error.
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::QueueError(msg.into())
    }

    /// Create a snapshot error.
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::SnapshotError(msg.into())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::SnapshotError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::SnapshotError(err.to_string())
    }
}
