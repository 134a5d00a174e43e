//! # Elastic Sync
//!
//! Main library for the elastic-sync indexing service.
//!
//! This crate provides the entry point and configuration for running
//! the indexing pipeline that keeps an Elasticsearch index synchronized
//! with a transactional data store.

pub mod config;

pub use config::Dependencies;

use thiserror::Error;

/// Errors that can occur during service initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] elastic_sync_pipeline::PipelineError),

    /// Transport error.
    #[error("Transport error: {0}")]
    TransportError(#[from] elastic_sync_repository::TransportError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
