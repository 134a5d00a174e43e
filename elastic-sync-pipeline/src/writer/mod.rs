//! The queued bulk-indexing writer.
//!
//! [`IndexWriter`] owns the bounded operation queue and the single
//! background consumer worker. Producers submit operations through
//! [`IndexWriter::submit`]; the worker drains the queue into bulk batches
//! and delivers them through the injected [`SearchTransport`]. The queue is
//! the only synchronization point between producers and the consumer, so
//! FIFO admission order is the global delivery order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::errors::PipelineError;
use elastic_sync_repository::{SearchTransport, TransportError};
use elastic_sync_shared::{IndexConfiguration, Operation};

/// Maximum number of operations drained into a single bulk request.
///
/// Bounds the bulk payload size; the batcher stops earlier when the queue is
/// momentarily empty, which bounds latency.
pub const MAX_BULK_SIZE: usize = 500;

/// Delay before a failed batch is re-attempted on the next worker cycle.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// What to do with queued operations when the writer stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Best-effort delivery of everything still queued.
    Flush,
    /// Discard everything still queued.
    Discard,
}

/// Operational counters for the writer.
///
/// `queued` counts admitted operations, `sent` operations accepted by the
/// search engine, `failed` per-item rejections inside delivered bulk
/// requests, and `dropped` operations discarded without delivery (retry
/// exhaustion, open breaker, or a discarding shutdown).
#[derive(Debug, Default)]
pub struct WriterMetrics {
    queued: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl WriterMetrics {
    fn add_queued(&self, n: usize) {
        self.queued.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn add_sent(&self, n: usize) {
        self.sent.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn add_failed(&self, n: usize) {
        self.failed.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn add_dropped(&self, n: usize) {
        self.dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// A point-in-time copy of the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queued: self.queued.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the writer counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Operations admitted to the queue.
    pub queued: u64,
    /// Operations accepted by the search engine.
    pub sent: u64,
    /// Per-item rejections inside delivered bulk requests.
    pub failed: u64,
    /// Operations discarded without delivery.
    pub dropped: u64,
}

/// The pipeline driver: bounded queue plus background consumer worker.
pub struct IndexWriter {
    tx: mpsc::Sender<Operation>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<WriterMetrics>,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    async_indexation: bool,
}

impl IndexWriter {
    /// Start a writer with the default [`DrainPolicy::Flush`] shutdown
    /// behavior.
    pub fn start(config: &IndexConfiguration, transport: Arc<dyn SearchTransport>) -> Self {
        Self::start_with_policy(config, transport, DrainPolicy::Flush)
    }

    /// Start a writer with an explicit shutdown drain policy.
    ///
    /// Spawns the single consumer worker; the bounded queue created here is
    /// the only synchronization point between producers and the worker.
    pub fn start_with_policy(
        config: &IndexConfiguration,
        transport: Arc<dyn SearchTransport>,
        drain_policy: DrainPolicy,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let breaker = Arc::new(CircuitBreaker::new(config.max_consecutive_errors()));
        let metrics = Arc::new(WriterMetrics::default());

        let worker = Worker {
            rx,
            transport,
            breaker: Arc::clone(&breaker),
            metrics: Arc::clone(&metrics),
            retry_on_error: config.retry_on_error(),
            execute_bulk: config.execute_bulk(),
            drain_policy,
            shutdown: shutdown_rx,
        };

        let handle = tokio::spawn(worker.run());

        info!(
            queue_capacity = config.queue_capacity(),
            execute_bulk = config.execute_bulk(),
            retry_on_error = config.retry_on_error(),
            max_consecutive_errors = config.max_consecutive_errors(),
            "Started index writer"
        );

        Self {
            tx,
            breaker,
            metrics,
            shutdown_tx,
            worker: Mutex::new(Some(handle)),
            async_indexation: config.async_indexation(),
        }
    }

    /// Submit an operation for delivery to the search engine.
    ///
    /// With `async_indexation` disabled the call suspends until the queue
    /// admits the operation (never until the remote write completes); with
    /// it enabled the call returns immediately, failing with
    /// [`PipelineError::QueueFull`] when the queue is at capacity. In both
    /// modes an open breaker fails fast with
    /// [`PipelineError::BreakerOpen`], and a shutdown observed while the
    /// submission is pending yields [`PipelineError::Cancelled`].
    pub async fn submit(&self, operation: Operation) -> Result<(), PipelineError> {
        if self.breaker.is_open() {
            return Err(PipelineError::BreakerOpen);
        }

        if self.async_indexation {
            match self.tx.try_send(operation) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => return Err(PipelineError::QueueFull),
                Err(TrySendError::Closed(_)) => return Err(PipelineError::Cancelled),
            }
        } else {
            self.tx
                .send(operation)
                .await
                .map_err(|_| PipelineError::Cancelled)?;
        }

        self.metrics.add_queued(1);
        Ok(())
    }

    /// Stop the writer.
    ///
    /// Signals shutdown, waits for the worker to apply the drain policy and
    /// terminate, and unblocks suspended producers with
    /// [`PipelineError::Cancelled`]. An in-flight bulk send completes (or
    /// times out at the transport level) before the worker exits.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.worker.lock().await.take() {
            handle
                .await
                .map_err(|e| PipelineError::worker(e.to_string()))?;
        }

        Ok(())
    }

    /// The circuit breaker gating this writer.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Explicitly reset the breaker, re-enabling submissions after a trip.
    pub fn reset_breaker(&self) {
        self.breaker.reset();
        info!("Circuit breaker reset");
    }

    /// The writer's operational counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// The single consumer of the operation queue.
struct Worker {
    rx: mpsc::Receiver<Operation>,
    transport: Arc<dyn SearchTransport>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<WriterMetrics>,
    retry_on_error: bool,
    execute_bulk: bool,
    drain_policy: DrainPolicy,
    shutdown: broadcast::Receiver<()>,
}

impl Worker {
    async fn run(mut self) {
        // A failed batch held for one re-attempt per cycle. Every attempt
        // counts toward the breaker, so retries terminate after at most
        // max_consecutive_errors attempts.
        let mut pending_retry: Option<Vec<Operation>> = None;

        loop {
            let batch = if let Some(batch) = pending_retry.take() {
                tokio::select! {
                    biased;
                    _ = self.shutdown.recv() => {
                        self.drain_remaining(Some(batch)).await;
                        return;
                    }
                    _ = tokio::time::sleep(RETRY_DELAY) => batch,
                }
            } else {
                tokio::select! {
                    biased;
                    _ = self.shutdown.recv() => {
                        self.drain_remaining(None).await;
                        return;
                    }
                    op = self.rx.recv() => match op {
                        Some(op) => self.assemble_batch(op),
                        None => {
                            debug!("All producers dropped, worker exiting");
                            return;
                        }
                    },
                }
            };

            if self.breaker.is_open() {
                self.metrics.add_dropped(batch.len());
                continue;
            }

            match self.dispatch(&batch).await {
                Ok((sent, item_failures)) => {
                    self.breaker.record_success();
                    self.metrics.add_sent(sent);
                    if item_failures > 0 {
                        self.metrics.add_failed(item_failures);
                        warn!(failed = item_failures, "Bulk request had per-item failures");
                    }
                }
                Err(e) => {
                    let state = self.breaker.record_failure();
                    warn!(
                        error = %e,
                        consecutive_failures = self.breaker.consecutive_failures(),
                        batch_size = batch.len(),
                        "Bulk attempt failed"
                    );

                    if state == BreakerState::Open {
                        error!(
                            consecutive_failures = self.breaker.consecutive_failures(),
                            "Circuit breaker opened; discarding operations until reset"
                        );
                        self.metrics.add_dropped(batch.len());
                    } else if self.retry_on_error && e.is_transient() {
                        pending_retry = Some(batch);
                    } else {
                        self.metrics.add_dropped(batch.len());
                    }
                }
            }
        }
    }

    /// Drain the queue into one batch: the awaited first operation, then
    /// whatever is immediately available up to [`MAX_BULK_SIZE`]. With bulk
    /// execution disabled every operation is its own batch, so sequential
    /// single sends preserve delivery order.
    fn assemble_batch(&mut self, first: Operation) -> Vec<Operation> {
        let mut batch = vec![first];
        if self.execute_bulk {
            while batch.len() < MAX_BULK_SIZE {
                match self.rx.try_recv() {
                    Ok(op) => batch.push(op),
                    Err(_) => break,
                }
            }
        }
        batch
    }

    /// Deliver one batch, returning (accepted, per-item failures).
    async fn dispatch(&self, batch: &[Operation]) -> Result<(usize, usize), TransportError> {
        if self.execute_bulk {
            let report = self.transport.bulk_send(batch).await?;
            Ok((report.succeeded, report.failed))
        } else {
            self.transport.send(&batch[0]).await?;
            Ok((1, 0))
        }
    }

    /// Apply the drain policy to everything still queued, then exit.
    async fn drain_remaining(&mut self, carried: Option<Vec<Operation>>) {
        // Closing the queue unblocks suspended producers with an error the
        // writer surfaces as Cancelled.
        self.rx.close();

        let mut remaining = carried.unwrap_or_default();
        while let Ok(op) = self.rx.try_recv() {
            remaining.push(op);
        }

        if remaining.is_empty() {
            info!("Worker stopped");
            return;
        }

        match self.drain_policy {
            DrainPolicy::Discard => {
                info!(
                    discarded = remaining.len(),
                    "Discarding queued operations on shutdown"
                );
                self.metrics.add_dropped(remaining.len());
            }
            DrainPolicy::Flush => {
                info!(count = remaining.len(), "Flushing queued operations on shutdown");
                let chunk_size = if self.execute_bulk { MAX_BULK_SIZE } else { 1 };
                for chunk in remaining.chunks(chunk_size) {
                    if self.breaker.is_open() {
                        self.metrics.add_dropped(chunk.len());
                        continue;
                    }
                    match self.dispatch(chunk).await {
                        Ok((sent, item_failures)) => {
                            self.breaker.record_success();
                            self.metrics.add_sent(sent);
                            self.metrics.add_failed(item_failures);
                        }
                        Err(e) => {
                            self.breaker.record_failure();
                            warn!(error = %e, count = chunk.len(), "Best-effort flush failed");
                            self.metrics.add_dropped(chunk.len());
                        }
                    }
                }
            }
        }

        info!("Worker stopped");
    }
}
