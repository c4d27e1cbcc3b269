//! # Catalog Sync
//!
//! Main library for the catalog search sync and trending pipeline.
//!
//! This crate provides the configuration, dependency wiring and operational
//! entrypoints behind the `catalog-sync` binary.

pub mod config;
pub mod feed;

pub use config::{Dependencies, LogFormat, Settings};

use thiserror::Error;

/// Errors that can occur during startup or while running a command.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] catalog_sync_pipeline::PipelineError),

    /// Search index error.
    #[error("Search index error: {0}")]
    SearchIndexError(#[from] catalog_sync_repository::SearchIndexError),

    /// Primary store error.
    #[error("Store error: {0}")]
    StoreError(#[from] catalog_sync_store::StoreError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
