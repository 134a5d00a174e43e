//! # Elastic Sync Pipeline
//!
//! This crate provides the indexing pipeline that keeps a search index
//! synchronized with a transactional data store without blocking the
//! transactions that produce the changes.
//!
//! ## Architecture
//!
//! 1. **Writer**: bounded queue, background consumer worker, bulk batching
//! 2. **Breaker**: consecutive-failure circuit breaker gating all sends
//! 3. **Source**: interface to the transaction-capture collaborator
//! 4. **Reindex**: chunked full resynchronization through the same writer

pub mod breaker;
pub mod errors;
pub mod reindex;
pub mod source;
pub mod writer;

pub use breaker::{BreakerState, CircuitBreaker};
pub use errors::PipelineError;
pub use reindex::{EntityChunk, EntityScanner, ReindexOrchestrator, ReindexReport, ReindexStatus};
pub use source::{ChangeConsumer, ChangeSource, EntityChange};
pub use writer::{DrainPolicy, IndexWriter, MetricsSnapshot, WriterMetrics};
