//! Chunked full resynchronization of the search index.
//!
//! The [`ReindexOrchestrator`] walks the whole data set through an
//! [`EntityScanner`] in cursor-delimited chunks and pushes every mappable
//! entity through the same writer the live change stream uses, so reindex
//! traffic is subject to the same queue bounds and circuit breaker.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use crate::errors::PipelineError;
use crate::writer::IndexWriter;
use elastic_sync_shared::{Entity, IndexConfiguration, Mapping, Operation};

/// Delay before re-attempting admission when the queue is full.
const ADMISSION_RETRY_DELAY: Duration = Duration::from_millis(50);

/// One cursor-delimited page of the data set.
#[derive(Debug, Clone, Default)]
pub struct EntityChunk {
    /// Entities in this page, in scan order.
    pub entities: Vec<Entity>,
    /// Cursor for the next page, or `None` when the scan is exhausted.
    pub next_cursor: Option<String>,
}

/// Pages through the full data set of the transactional store.
#[async_trait]
pub trait EntityScanner: Send + Sync {
    /// Fetch the next page of at most `limit` entities, starting after
    /// `cursor` (`None` starts from the beginning).
    async fn next_chunk(
        &mut self,
        cursor: Option<String>,
        limit: usize,
    ) -> Result<EntityChunk, PipelineError>;
}

/// How a reindex run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexStatus {
    /// Every scanned entity was submitted or deliberately skipped.
    Completed,
    /// The run finished but some entities failed to translate.
    PartiallyFailed,
    /// The circuit breaker opened mid-run; the remainder was not scanned.
    AbortedByBreaker,
    /// The writer shut down mid-run.
    Aborted,
}

/// Outcome of a reindex run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexReport {
    /// Entities read from the scanner.
    pub scanned: usize,
    /// Operations admitted to the writer.
    pub submitted: usize,
    /// Entities whose mapping translation failed.
    pub failed: usize,
    /// Entities without a usable key property.
    pub skipped: usize,
    /// How the run ended.
    pub status: ReindexStatus,
}

/// Drives a full resynchronization through the shared writer.
pub struct ReindexOrchestrator {
    writer: Arc<IndexWriter>,
    mapping: Arc<dyn Mapping>,
    key_property: String,
    batch_size: usize,
    initialize_until: u64,
}

impl ReindexOrchestrator {
    pub fn new(config: &IndexConfiguration, writer: Arc<IndexWriter>) -> Self {
        Self {
            writer,
            mapping: config.mapping(),
            key_property: config.key_property().to_string(),
            batch_size: config.reindex_batch_size(),
            initialize_until: config.initialize_until(),
        }
    }

    /// Whether a startup reindex is due right now.
    ///
    /// The configured deadline is an absolute epoch-millisecond timestamp;
    /// the default of zero means a reindex is never due.
    pub fn due(&self) -> bool {
        now_ms() < self.initialize_until
    }

    /// Run the reindex if it is due, otherwise do nothing.
    pub async fn run_if_due<S: EntityScanner>(
        &self,
        scanner: S,
    ) -> Result<Option<ReindexReport>, PipelineError> {
        if !self.due() {
            info!("Reindex window closed, skipping full resynchronization");
            return Ok(None);
        }
        self.run(scanner).await.map(Some)
    }

    /// Walk the full data set and submit an index operation per entity.
    ///
    /// Untranslatable entities are counted and skipped, never fatal. An open
    /// breaker or a writer shutdown aborts the run; the report says how far
    /// it got.
    #[instrument(skip(self, scanner))]
    pub async fn run<S: EntityScanner>(
        &self,
        mut scanner: S,
    ) -> Result<ReindexReport, PipelineError> {
        info!(batch_size = self.batch_size, "Starting full reindex");

        let mut report = ReindexReport {
            scanned: 0,
            submitted: 0,
            failed: 0,
            skipped: 0,
            status: ReindexStatus::Completed,
        };
        let mut cursor: Option<String> = None;

        loop {
            let chunk = scanner.next_chunk(cursor.take(), self.batch_size).await?;

            for entity in &chunk.entities {
                report.scanned += 1;

                let Some(operation) = self.operation_for(entity, &mut report) else {
                    continue;
                };

                match self.submit_with_backpressure(operation).await {
                    Ok(()) => report.submitted += 1,
                    Err(PipelineError::BreakerOpen) => {
                        error!(
                            scanned = report.scanned,
                            submitted = report.submitted,
                            "Circuit breaker opened during reindex, aborting"
                        );
                        report.status = ReindexStatus::AbortedByBreaker;
                        return Ok(report);
                    }
                    Err(PipelineError::Cancelled) => {
                        warn!(
                            scanned = report.scanned,
                            submitted = report.submitted,
                            "Writer stopped during reindex, aborting"
                        );
                        report.status = ReindexStatus::Aborted;
                        return Ok(report);
                    }
                    Err(e) => return Err(e),
                }
            }

            cursor = chunk.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        if report.failed > 0 {
            report.status = ReindexStatus::PartiallyFailed;
        }

        info!(
            scanned = report.scanned,
            submitted = report.submitted,
            failed = report.failed,
            skipped = report.skipped,
            "Reindex finished"
        );

        Ok(report)
    }

    fn operation_for(&self, entity: &Entity, report: &mut ReindexReport) -> Option<Operation> {
        let key = match entity.string_property(&self.key_property) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                warn!(
                    key_property = %self.key_property,
                    "Entity has no usable key property, skipping"
                );
                report.skipped += 1;
                return None;
            }
        };

        match self.mapping.document_for(entity) {
            Ok(document) => Some(Operation::index(key, document)),
            Err(e) => {
                warn!(key = %key, error = %e, "Mapping failed during reindex");
                report.failed += 1;
                None
            }
        }
    }

    /// Submit, waiting out a momentarily full queue. A full queue drains
    /// unless the breaker opens, and an open breaker surfaces as its own
    /// error, so this terminates.
    async fn submit_with_backpressure(&self, operation: Operation) -> Result<(), PipelineError> {
        loop {
            match self.writer.submit(operation.clone()).await {
                Err(PipelineError::QueueFull) => {
                    tokio::time::sleep(ADMISSION_RETRY_DELAY).await;
                }
                other => return other,
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use elastic_sync_repository::{BulkReport, SearchTransport, TransportError};
    use elastic_sync_shared::{DocumentBody, MappingError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullTransport;

    #[async_trait]
    impl SearchTransport for NullTransport {
        async fn bulk_send(&self, operations: &[Operation]) -> Result<BulkReport, TransportError> {
            Ok(BulkReport {
                total: operations.len(),
                succeeded: operations.len(),
                failed: 0,
                items: Vec::new(),
            })
        }

        async fn send(&self, _operation: &Operation) -> Result<(), TransportError> {
            Ok(())
        }

        async fn health_check(&self) -> Result<bool, TransportError> {
            Ok(true)
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl SearchTransport for FailingTransport {
        async fn bulk_send(&self, _operations: &[Operation]) -> Result<BulkReport, TransportError> {
            Err(TransportError::connection("engine down"))
        }

        async fn send(&self, _operation: &Operation) -> Result<(), TransportError> {
            Err(TransportError::connection("engine down"))
        }

        async fn health_check(&self) -> Result<bool, TransportError> {
            Ok(false)
        }
    }

    /// In-memory scanner over a fixed data set, tracking page fetches.
    struct VecScanner {
        entities: Vec<Entity>,
        calls: Arc<AtomicUsize>,
    }

    impl VecScanner {
        fn new(entities: Vec<Entity>) -> Self {
            Self {
                entities,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl EntityScanner for VecScanner {
        async fn next_chunk(
            &mut self,
            cursor: Option<String>,
            limit: usize,
        ) -> Result<EntityChunk, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let start: usize = match cursor {
                Some(c) => c
                    .parse()
                    .map_err(|_| PipelineError::scan("bad cursor"))?,
                None => 0,
            };
            let end = (start + limit).min(self.entities.len());
            let next_cursor = if end < self.entities.len() {
                Some(end.to_string())
            } else {
                None
            };
            Ok(EntityChunk {
                entities: self.entities[start..end].to_vec(),
                next_cursor,
            })
        }
    }

    fn entities(n: usize) -> Vec<Entity> {
        (0..n)
            .map(|i| {
                Entity::new()
                    .with_property("uuid", format!("uuid-{}", i))
                    .with_property("name", format!("entity {}", i))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_full_scan_submits_every_entity() {
        let config = IndexConfiguration::default().with_reindex_batch_size(1000);
        let writer = Arc::new(IndexWriter::start(&config, Arc::new(NullTransport)));
        let orchestrator = ReindexOrchestrator::new(&config, Arc::clone(&writer));

        let scanner = VecScanner::new(entities(2500));
        let report = orchestrator.run(scanner).await.unwrap();

        assert_eq!(report.scanned, 2500);
        assert_eq!(report.submitted, 2500);
        assert_eq!(report.failed, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.status, ReindexStatus::Completed);

        writer.stop().await.unwrap();
        assert_eq!(writer.metrics().sent, 2500);
    }

    #[tokio::test]
    async fn test_scanner_sees_configured_limit() {
        let config = IndexConfiguration::default().with_reindex_batch_size(100);
        let writer = Arc::new(IndexWriter::start(&config, Arc::new(NullTransport)));
        let orchestrator = ReindexOrchestrator::new(&config, Arc::clone(&writer));

        let scanner = VecScanner::new(entities(250));
        let calls = Arc::clone(&scanner.calls);
        let report = orchestrator.run(scanner).await.unwrap();

        assert_eq!(report.submitted, 250);
        // 100 + 100 + 50, cursor exhausted on the third page.
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        writer.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_mapping_failure_is_counted_not_fatal() {
        struct PickyMapping;

        impl Mapping for PickyMapping {
            fn configure(&mut self, _options: &HashMap<String, String>) {}

            fn name(&self) -> &str {
                "picky"
            }

            fn document_for(&self, entity: &Entity) -> Result<DocumentBody, MappingError> {
                if entity.string_property("name") == Some("entity 1") {
                    return Err(MappingError::translation("refused"));
                }
                Ok(entity.properties.clone())
            }
        }

        let config = IndexConfiguration::default()
            .with_mapping(Box::new(PickyMapping), &HashMap::new());
        let writer = Arc::new(IndexWriter::start(&config, Arc::new(NullTransport)));
        let orchestrator = ReindexOrchestrator::new(&config, Arc::clone(&writer));

        let report = orchestrator.run(VecScanner::new(entities(3))).await.unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(report.submitted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.status, ReindexStatus::PartiallyFailed);

        writer.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_entity_without_key_is_skipped() {
        let config = IndexConfiguration::default();
        let writer = Arc::new(IndexWriter::start(&config, Arc::new(NullTransport)));
        let orchestrator = ReindexOrchestrator::new(&config, Arc::clone(&writer));

        let mut set = entities(2);
        set.push(Entity::new().with_property("name", "keyless"));

        let report = orchestrator.run(VecScanner::new(set)).await.unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(report.submitted, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.status, ReindexStatus::Completed);

        writer.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_breaker_aborts_run() {
        let config = IndexConfiguration::default()
            .with_queue_capacity(1)
            .with_max_consecutive_errors(1);
        let writer = Arc::new(IndexWriter::start(&config, Arc::new(FailingTransport)));
        let orchestrator = ReindexOrchestrator::new(&config, Arc::clone(&writer));

        let total = 100;
        let report = orchestrator
            .run(VecScanner::new(entities(total)))
            .await
            .unwrap();

        assert_eq!(report.status, ReindexStatus::AbortedByBreaker);
        assert!(report.submitted < total);
        assert!(writer.breaker().is_open());

        writer.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_if_due_honors_window() {
        let config = IndexConfiguration::default();
        let writer = Arc::new(IndexWriter::start(&config, Arc::new(NullTransport)));

        // Default deadline of zero: never due.
        let orchestrator = ReindexOrchestrator::new(&config, Arc::clone(&writer));
        assert!(!orchestrator.due());
        assert!(orchestrator
            .run_if_due(VecScanner::new(entities(5)))
            .await
            .unwrap()
            .is_none());

        // A deadline in the far future: due.
        let config = config.with_initialize_until(u64::MAX);
        let orchestrator = ReindexOrchestrator::new(&config, Arc::clone(&writer));
        assert!(orchestrator.due());
        let report = orchestrator
            .run_if_due(VecScanner::new(entities(5)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.submitted, 5);

        writer.stop().await.unwrap();
    }
}
