//! Result types for batch search index operations.

use crate::errors::SearchIndexError;

/// Result of a batch operation for a single document.
///
/// Indicates whether writing one document succeeded and carries the error
/// if it failed.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document's `objectID`.
    pub object_id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

impl BatchOperationResult {
    pub fn succeeded(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(object_id: impl Into<String>, error: SearchIndexError) -> Self {
        Self {
            object_id: object_id.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// Callers use the per-item results to report partial failures without
/// failing the whole batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-item results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: BatchOperationSummary) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.results.extend(other.results);
    }
}
