//! Error types for the indexing pipeline.

use thiserror::Error;

use elastic_sync_repository::TransportError;
use elastic_sync_shared::MappingError;

/// Errors that can occur in the indexing pipeline.
///
/// The first three variants are admission errors: they are surfaced
/// synchronously to the producer so it can apply its own backpressure
/// upstream, and are never silently swallowed.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The operation queue is at capacity.
    #[error("Queue is full")]
    QueueFull,

    /// The circuit breaker is open; submissions fail fast until reset.
    #[error("Circuit breaker is open")]
    BreakerOpen,

    /// The writer was stopped while the submission was pending.
    #[error("Submission cancelled by shutdown")]
    Cancelled,

    /// Error from the search engine transport.
    #[error("Transport error: {0}")]
    TransportError(#[from] TransportError),

    /// Error translating an entity into a document.
    #[error("Mapping error: {0}")]
    MappingError(#[from] MappingError),

    /// Error from the change-capture collaborator.
    #[error("Source error: {0}")]
    SourceError(String),

    /// Error from the data-set scan collaborator.
    #[error("Scan error: {0}")]
    ScanError(String),

    /// The background worker failed.
    #[error("Worker error: {0}")]
    WorkerError(String),
}

impl PipelineError {
    /// Create a source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::SourceError(msg.into())
    }

    /// Create a scan error.
    pub fn scan(msg: impl Into<String>) -> Self {
        Self::ScanError(msg.into())
    }

    /// Create a worker error.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::WorkerError(msg.into())
    }

    /// Whether this is an admission error surfaced by `submit`.
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            Self::QueueFull | Self::BreakerOpen | Self::Cancelled
        )
    }
}
