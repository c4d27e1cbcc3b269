//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::BatchOperationSummary;
use catalog_sync_shared::{EntityKind, SearchDocument, SearchRequest, SearchResponse};

/// Abstracts the underlying search engine.
///
/// Every operation is scoped to one of the per-kind namespaces (listings,
/// threads, users). Implementations are injected into `SearchIndexClient`
/// so tests can run against the in-memory index or a mock.
///
/// All methods return `Result<T, SearchIndexError>` for consistent error handling across
/// different backend implementations.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Save a document, replacing any existing document with the same `objectID`.
    ///
    /// # Arguments
    ///
    /// * `kind` - The namespace to write into
    /// * `document` - The document to save
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was saved
    /// * `Err(SearchIndexError)` - If the write fails
    async fn save_object(
        &self,
        kind: EntityKind,
        document: &SearchDocument,
    ) -> Result<(), SearchIndexError>;

    /// Save multiple documents and return a per-document summary.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Aggregate statistics and individual results
    /// * `Err(SearchIndexError)` - If the request fails entirely
    async fn save_objects(
        &self,
        kind: EntityKind,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Delete a document by `objectID`.
    ///
    /// A document that does not exist is considered successfully deleted.
    async fn delete_object(&self, kind: EntityKind, object_id: &str)
        -> Result<(), SearchIndexError>;

    /// Remove every document from a namespace, keeping its configuration.
    async fn clear_index(&self, kind: EntityKind) -> Result<(), SearchIndexError>;

    /// Create the namespace with its mappings and ranking settings if it does not exist.
    async fn configure_index(&self, kind: EntityKind) -> Result<(), SearchIndexError>;

    /// Execute a query against one namespace.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchResponse)` - Hits for the requested page, totals and facet counts
    /// * `Err(SearchIndexError)` - If the query fails
    async fn search(
        &self,
        kind: EntityKind,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchIndexError>;

    /// Check if the search engine is healthy and reachable.
    async fn health_check(&self) -> Result<bool, SearchIndexError>;
}

/// Lets one provider instance sit behind a `SearchIndexClient` while other
/// owners keep a handle to it.
#[async_trait]
impl<P: SearchIndexProvider + ?Sized> SearchIndexProvider for Arc<P> {
    async fn save_object(
        &self,
        kind: EntityKind,
        document: &SearchDocument,
    ) -> Result<(), SearchIndexError> {
        (**self).save_object(kind, document).await
    }

    async fn save_objects(
        &self,
        kind: EntityKind,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        (**self).save_objects(kind, documents).await
    }

    async fn delete_object(
        &self,
        kind: EntityKind,
        object_id: &str,
    ) -> Result<(), SearchIndexError> {
        (**self).delete_object(kind, object_id).await
    }

    async fn clear_index(&self, kind: EntityKind) -> Result<(), SearchIndexError> {
        (**self).clear_index(kind).await
    }

    async fn configure_index(&self, kind: EntityKind) -> Result<(), SearchIndexError> {
        (**self).configure_index(kind).await
    }

    async fn search(
        &self,
        kind: EntityKind,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchIndexError> {
        (**self).search(kind, request).await
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        (**self).health_check().await
    }
}
