//! # Catalog Sync Repository
//!
//! This crate provides the boundary to the search engine. It includes the
//! error type, the provider interface, a validating client wrapper, and two
//! implementations: OpenSearch and an in-memory index with the same filter
//! and ranking semantics.

pub mod client;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod schema;
pub mod types;

pub use client::SearchIndexClient;
pub use config::SearchIndexConfig;
pub use errors::SearchIndexError;
pub use interfaces::SearchIndexProvider;
pub use memory::InMemorySearchIndex;
pub use opensearch::{IndexConfig, OpenSearchClient};
pub use types::{BatchOperationResult, BatchOperationSummary};
