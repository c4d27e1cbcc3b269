//! Search index client implementation.
//!
//! This module provides the main client for interacting with the search index.
//! Pipeline code uses this to save, delete, and query documents.

use std::borrow::Cow;

use crate::config::SearchIndexConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::types::BatchOperationSummary;
use catalog_sync_shared::{EntityKind, SearchDocument, SearchRequest, SearchResponse};

/// The main client for interacting with the search index.
///
/// Validates requests and enforces the configured limits before delegating
/// to the injected provider.
pub struct SearchIndexClient {
    provider: Box<dyn SearchIndexProvider>,
    config: SearchIndexConfig,
}

impl SearchIndexClient {
    /// Create a new SearchIndexClient with default configuration.
    pub fn new(provider: Box<dyn SearchIndexProvider>) -> Self {
        Self {
            provider,
            config: SearchIndexConfig::default(),
        }
    }

    /// Create a new SearchIndexClient with custom configuration.
    pub fn with_config(provider: Box<dyn SearchIndexProvider>, config: SearchIndexConfig) -> Self {
        Self { provider, config }
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    fn validate_object_id(object_id: &str) -> Result<(), SearchIndexError> {
        if object_id.trim().is_empty() {
            return Err(SearchIndexError::validation("objectID is required"));
        }
        Ok(())
    }

    /// Save a single document into its kind's namespace.
    pub async fn save(&self, document: &SearchDocument) -> Result<(), SearchIndexError> {
        Self::validate_object_id(document.object_id())?;
        self.provider.save_object(document.kind(), document).await
    }

    /// Save a batch of documents into one namespace.
    ///
    /// Individual failures are reported in the summary. The batch size is
    /// limited by the configured max_batch_size (default: 1000).
    pub async fn save_batch(
        &self,
        kind: EntityKind,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        self.validate_batch_size(documents.len())?;

        for document in documents {
            Self::validate_object_id(document.object_id())?;
            if document.kind() != kind {
                return Err(SearchIndexError::validation(format!(
                    "document {} belongs to {}, not {}",
                    document.object_id(),
                    document.kind(),
                    kind
                )));
            }
        }

        self.provider.save_objects(kind, documents).await
    }

    /// Delete a document. Missing documents are not an error.
    pub async fn delete(&self, kind: EntityKind, object_id: &str) -> Result<(), SearchIndexError> {
        Self::validate_object_id(object_id)?;
        self.provider.delete_object(kind, object_id).await
    }

    /// Query one namespace. Page sizes above the configured maximum are clamped.
    pub async fn search(
        &self,
        kind: EntityKind,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchIndexError> {
        let request = self.clamp(request);
        self.provider.search(kind, &request).await
    }

    fn clamp<'a>(&self, request: &'a SearchRequest) -> Cow<'a, SearchRequest> {
        let max = self.config.max_hits_per_page.max(1);
        if (1..=max).contains(&request.hits_per_page) {
            return Cow::Borrowed(request);
        }
        let mut clamped = request.clone();
        clamped.hits_per_page = request.hits_per_page.clamp(1, max);
        Cow::Owned(clamped)
    }

    /// Remove every document from a namespace.
    pub async fn clear(&self, kind: EntityKind) -> Result<(), SearchIndexError> {
        self.provider.clear_index(kind).await
    }

    /// Create a namespace with its settings if absent.
    pub async fn configure(&self, kind: EntityKind) -> Result<(), SearchIndexError> {
        self.provider.configure_index(kind).await
    }

    /// Check if the search engine is reachable.
    pub async fn health_check(&self) -> Result<bool, SearchIndexError> {
        self.provider.health_check().await
    }
}
