//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust client.

use std::time::Instant;

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, DeleteByQueryParts, DeleteParts, IndexParts, OpenSearch, SearchParts,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::opensearch::queries::{build_search_body, document_to_source, parse_search_response};
use crate::types::{BatchOperationResult, BatchOperationSummary};
use catalog_sync_shared::{EntityKind, SearchDocument, SearchRequest, SearchResponse};

/// OpenSearch client implementation.
///
/// Each entity kind lives in its own index; the document `objectID` is used
/// as the OpenSearch `_id`, so saving the same entity twice overwrites it.
///
/// # Example
///
/// ```ignore
/// use catalog_sync_repository::opensearch::{IndexConfig, OpenSearchClient};
/// let client = OpenSearchClient::new("http://localhost:9200", IndexConfig::new("catalog")).await?;
/// client.configure_index(EntityKind::Listing).await?;
/// client.save_object(EntityKind::Listing, &document).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index naming configuration
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, index_config: IndexConfig) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            prefix = %index_config.prefix,
            "Created OpenSearch client"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    fn index_name(&self, kind: EntityKind) -> String {
        self.index_config.index_name(kind)
    }

    /// Split a bulk response into per-document results, in request order.
    fn bulk_results(documents: &[SearchDocument], body: &Value) -> Vec<BatchOperationResult> {
        let items = body.get("items").and_then(Value::as_array);

        documents
            .iter()
            .enumerate()
            .map(|(position, document)| {
                let outcome = items
                    .and_then(|items| items.get(position))
                    .and_then(|item| item.get("index"));

                match outcome.and_then(|o| o.get("error")) {
                    Some(err) => BatchOperationResult::failed(
                        document.object_id(),
                        SearchIndexError::index(err.to_string()),
                    ),
                    None if outcome.is_some() => BatchOperationResult::succeeded(document.object_id()),
                    None => BatchOperationResult::failed(
                        document.object_id(),
                        SearchIndexError::parse("missing bulk item result"),
                    ),
                }
            })
            .collect()
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchClient {
    /// Index a document under its `objectID`, replacing any previous version.
    #[instrument(skip(self, document), fields(object_id = %document.object_id()))]
    async fn save_object(
        &self,
        kind: EntityKind,
        document: &SearchDocument,
    ) -> Result<(), SearchIndexError> {
        let index = self.index_name(kind);

        let response = self
            .client
            .index(IndexParts::IndexId(&index, document.object_id()))
            .body(document_to_source(document.to_value()))
            .send()
            .await
            .map_err(|e| SearchIndexError::index(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index request failed");
            return Err(SearchIndexError::index(format!(
                "Index failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index, "Document saved");
        Ok(())
    }

    /// Index a batch of documents with a single `_bulk` request.
    ///
    /// Item-level failures are reported in the summary; only a failure of the
    /// whole request is returned as an error.
    async fn save_objects(
        &self,
        kind: EntityKind,
        documents: &[SearchDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let index = self.index_name(kind);
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for document in documents {
            body.push(json!({ "index": { "_id": document.object_id() } }).into());
            body.push(document_to_source(document.to_value()).into());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(&index))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::bulk_operation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(SearchIndexError::bulk_operation(format!(
                "Bulk failed with status {}: {}",
                status, error_body
            )));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let summary = BatchOperationSummary::from_results(Self::bulk_results(documents, &response_body));
        debug!(
            index = %index,
            total = summary.total,
            failed = summary.failed,
            "Bulk save completed"
        );
        Ok(summary)
    }

    /// Delete a document from the search index.
    ///
    /// If the document doesn't exist, the operation is considered successful.
    async fn delete_object(
        &self,
        kind: EntityKind,
        object_id: &str,
    ) -> Result<(), SearchIndexError> {
        let index = self.index_name(kind);

        let response = self
            .client
            .delete(DeleteParts::IndexId(&index, object_id))
            .send()
            .await
            .map_err(|e| SearchIndexError::delete(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - document may not exist
        if !status.is_success() && status.as_u16() != 404 {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Delete request failed");
            return Err(SearchIndexError::delete(format!(
                "Delete failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index, object_id = %object_id, "Document deleted");
        Ok(())
    }

    async fn clear_index(&self, kind: EntityKind) -> Result<(), SearchIndexError> {
        let index = self.index_name(kind);

        let response = self
            .client
            .delete_by_query(DeleteByQueryParts::Index(&[&index]))
            .body(json!({ "query": { "match_all": {} } }))
            .refresh(true)
            .send()
            .await
            .map_err(|e| SearchIndexError::configuration(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() && status.as_u16() != 404 {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::configuration(format!(
                "Clear failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %index, "Index cleared");
        Ok(())
    }

    async fn configure_index(&self, kind: EntityKind) -> Result<(), SearchIndexError> {
        let index = self.index_name(kind);

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[&index]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if exists.status_code().is_success() {
            debug!(index = %index, "Index already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&index))
            .body(get_index_settings(kind))
            .send()
            .await
            .map_err(|e| SearchIndexError::configuration(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::configuration(format!(
                "Index creation failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %index, "Index created");
        Ok(())
    }

    async fn search(
        &self,
        kind: EntityKind,
        request: &SearchRequest,
    ) -> Result<SearchResponse, SearchIndexError> {
        let index = self.index_name(kind);
        let started = Instant::now();

        let response = self
            .client
            .search(SearchParts::Index(&[&index]))
            .body(build_search_body(kind, request))
            .send()
            .await
            .map_err(|e| SearchIndexError::query(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::query(format!(
                "Search failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let parsed = parse_search_response(request, &body)?;
        debug!(
            index = %index,
            nb_hits = parsed.nb_hits,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Search completed"
        );
        Ok(parsed)
    }

    async fn health_check(&self) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Ok(matches!(
            body.get("status").and_then(Value::as_str),
            Some("green") | Some("yellow")
        ))
    }
}
