//! Processor module for the catalog sync pipeline.
//!
//! Transforms primary-store entities into search documents.

mod document_transformer;

pub use document_transformer::{DocumentTransformer, ProcessedEntity};
