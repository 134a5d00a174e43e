//! Interface to the transaction-capture collaborator.
//!
//! A [`ChangeSource`] yields entity changes committed in the transactional
//! store; the [`ChangeConsumer`] translates each change into an [`Operation`]
//! and submits it to the writer. Translation happens on the consumer side so
//! the capture collaborator stays ignorant of mappings and key properties.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::errors::PipelineError;
use crate::writer::IndexWriter;
use elastic_sync_shared::{Entity, IndexConfiguration, Mapping, Operation};

/// A committed change to an entity in the transactional store.
#[derive(Debug, Clone)]
pub enum EntityChange {
    /// The entity was created.
    Created(Entity),
    /// The entity was updated.
    Updated(Entity),
    /// The entity was deleted. The pre-deletion state is carried so the
    /// key property can still be read.
    Deleted(Entity),
}

/// Stream of committed entity changes.
///
/// Implementations wrap whatever capture mechanism the deployment uses;
/// `next_change` returns `Ok(None)` when the stream ends.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    async fn next_change(&mut self) -> Result<Option<EntityChange>, PipelineError>;
}

/// Forwards changes from a [`ChangeSource`] into the writer.
pub struct ChangeConsumer {
    writer: Arc<IndexWriter>,
    mapping: Arc<dyn Mapping>,
    key_property: String,
}

impl ChangeConsumer {
    pub fn new(config: &IndexConfiguration, writer: Arc<IndexWriter>) -> Self {
        Self {
            writer,
            mapping: config.mapping(),
            key_property: config.key_property().to_string(),
        }
    }

    /// Consume the source until it ends or shutdown is signalled.
    ///
    /// Changes that cannot be translated are logged and skipped; admission
    /// errors from the writer are propagated so the caller can apply its
    /// own backpressure. A cancellation observed during shutdown is a clean
    /// exit, not an error.
    pub async fn run<S: ChangeSource>(
        &self,
        mut source: S,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Change consumer received shutdown signal");
                    return Ok(());
                }
                change = source.next_change() => match change? {
                    Some(change) => {
                        if let Some(op) = self.operation_for(&change) {
                            match self.writer.submit(op).await {
                                Ok(()) => {}
                                Err(PipelineError::Cancelled) => {
                                    info!("Writer stopped, change consumer exiting");
                                    return Ok(());
                                }
                                Err(e) => return Err(e),
                            }
                        }
                    }
                    None => {
                        info!("Change stream ended");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Translate a change into the operation to submit, or `None` when the
    /// change cannot be indexed (missing key property, mapping failure).
    pub fn operation_for(&self, change: &EntityChange) -> Option<Operation> {
        let entity = match change {
            EntityChange::Created(e) | EntityChange::Updated(e) | EntityChange::Deleted(e) => e,
        };

        let key = match entity.string_property(&self.key_property) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => {
                warn!(
                    key_property = %self.key_property,
                    "Entity has no usable key property, skipping change"
                );
                return None;
            }
        };

        match change {
            EntityChange::Deleted(_) => Some(Operation::delete(key)),
            EntityChange::Created(entity) | EntityChange::Updated(entity) => {
                let document = match self.mapping.document_for(entity) {
                    Ok(document) => document,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Mapping failed, skipping change");
                        return None;
                    }
                };
                match change {
                    EntityChange::Created(_) => Some(Operation::index(key, document)),
                    _ => Some(Operation::update(key, document)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use uuid::Uuid;

    struct VecSource {
        changes: VecDeque<EntityChange>,
    }

    impl VecSource {
        fn new(changes: Vec<EntityChange>) -> Self {
            Self {
                changes: changes.into(),
            }
        }
    }

    #[async_trait]
    impl ChangeSource for VecSource {
        async fn next_change(&mut self) -> Result<Option<EntityChange>, PipelineError> {
            Ok(self.changes.pop_front())
        }
    }

    fn entity(uuid: &str, name: &str) -> Entity {
        Entity::new()
            .with_property("uuid", uuid)
            .with_property("name", name)
    }

    fn consumer_parts() -> (ChangeConsumer, Arc<IndexWriter>, broadcast::Sender<()>) {
        let config = IndexConfiguration::default();
        let transport = Arc::new(NullTransport);
        let writer = Arc::new(IndexWriter::start(&config, transport));
        let consumer = ChangeConsumer::new(&config, Arc::clone(&writer));
        let (shutdown_tx, _) = broadcast::channel(1);
        (consumer, writer, shutdown_tx)
    }

    struct NullTransport;

    #[async_trait]
    impl elastic_sync_repository::SearchTransport for NullTransport {
        async fn bulk_send(
            &self,
            operations: &[Operation],
        ) -> Result<elastic_sync_repository::BulkReport, elastic_sync_repository::TransportError>
        {
            Ok(elastic_sync_repository::BulkReport {
                total: operations.len(),
                succeeded: operations.len(),
                failed: 0,
                items: Vec::new(),
            })
        }

        async fn send(
            &self,
            _operation: &Operation,
        ) -> Result<(), elastic_sync_repository::TransportError> {
            Ok(())
        }

        async fn health_check(
            &self,
        ) -> Result<bool, elastic_sync_repository::TransportError> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_translates_each_change_kind() {
        let config = IndexConfiguration::default();
        let transport = Arc::new(NullTransport);
        let writer = Arc::new(IndexWriter::start(&config, transport));
        let consumer = ChangeConsumer::new(&config, writer);

        let uuid = Uuid::new_v4().to_string();
        let e = entity(&uuid, "neo");

        let created = consumer
            .operation_for(&EntityChange::Created(e.clone()))
            .unwrap();
        assert!(matches!(created, Operation::Index { .. }));
        assert_eq!(created.key(), uuid);
        assert_eq!(
            created.document().unwrap().get("name"),
            Some(&serde_json::Value::from("neo"))
        );

        let updated = consumer
            .operation_for(&EntityChange::Updated(e.clone()))
            .unwrap();
        assert!(matches!(updated, Operation::Update { .. }));

        let deleted = consumer.operation_for(&EntityChange::Deleted(e)).unwrap();
        assert!(matches!(deleted, Operation::Delete { .. }));
        assert_eq!(deleted.key(), uuid);
    }

    #[tokio::test]
    async fn test_skips_entity_without_key_property() {
        let config = IndexConfiguration::default();
        let transport = Arc::new(NullTransport);
        let writer = Arc::new(IndexWriter::start(&config, transport));
        let consumer = ChangeConsumer::new(&config, writer);

        let e = Entity::new().with_property("name", "no-uuid");
        assert!(consumer.operation_for(&EntityChange::Created(e)).is_none());
    }

    #[tokio::test]
    async fn test_run_forwards_until_stream_end() {
        let (consumer, writer, shutdown_tx) = consumer_parts();

        let changes = vec![
            EntityChange::Created(entity("u1", "a")),
            EntityChange::Updated(entity("u2", "b")),
            EntityChange::Deleted(entity("u3", "c")),
        ];

        consumer
            .run(VecSource::new(changes), shutdown_tx.subscribe())
            .await
            .unwrap();

        assert_eq!(writer.metrics().queued, 3);
        writer.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown_signal() {
        let (consumer, writer, shutdown_tx) = consumer_parts();

        // Signal before running; the biased select observes it first.
        let rx = shutdown_tx.subscribe();
        shutdown_tx.send(()).unwrap();

        consumer
            .run(VecSource::new(vec![EntityChange::Created(entity("u1", "a"))]), rx)
            .await
            .unwrap();

        assert_eq!(writer.metrics().queued, 0);
        writer.stop().await.unwrap();
    }
}
