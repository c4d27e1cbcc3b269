//! # Catalog Sync Pipeline
//!
//! This crate keeps the search index in step with the primary store and
//! maintains the trending classification.
//!
//! ## Architecture
//!
//! 1. **Processor**: Transforms entities into flat search documents
//! 2. **Loader**: Best-effort synchronizer that writes documents to the index
//! 3. **Search**: Builds per-namespace queries and fans out federated searches
//! 4. **Queue**: Delayed, retrying job queue for trending recomputation
//! 5. **Trending**: Evaluates and persists the trending flag under a hard cap
//! 6. **Backfill**: Batch resync of the index from the primary store
//! 7. **Orchestrator**: Routes after-commit change events to the above

pub mod backfill;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;
pub mod queue;
pub mod search;
pub mod trending;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::PipelineError;
