//! Search transport trait definition.
//!
//! This module defines the abstract interface for delivering write
//! operations to the search engine, allowing for different backend
//! implementations (Elasticsearch, mocks, failure-injection decorators).

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::types::BulkReport;
use elastic_sync_shared::Operation;

/// Abstract interface for delivering operations to the search engine.
///
/// The pipeline never talks to the network directly; it depends on this
/// trait, so tests and failure-simulation strategies are plugged in at
/// construction time instead of subclassing the writer.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the transport is shared between
/// the writer worker and the reindex orchestrator.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Deliver a batch of operations in a single bulk request.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkReport)` - The request was delivered; the report carries
    ///   per-item outcomes (individual items may still have failed)
    /// * `Err(TransportError)` - The request as a whole failed; the caller
    ///   treats the batch as a single retry unit
    async fn bulk_send(&self, operations: &[Operation]) -> Result<BulkReport, TransportError>;

    /// Deliver a single operation, used when bulk execution is disabled.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The operation was accepted
    /// * `Err(TransportError)` - Delivery failed
    async fn send(&self, operation: &Operation) -> Result<(), TransportError>;

    /// Check if the search engine is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The search engine is healthy
    /// * `Ok(false)` - The search engine answered but is unhealthy
    /// * `Err(TransportError)` - The health check could not be executed
    async fn health_check(&self) -> Result<bool, TransportError>;
}
