//! Dependency initialization and wiring for the elastic-sync service.

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::IndexingError;
use elastic_sync_pipeline::{ChangeConsumer, IndexWriter, ReindexOrchestrator};
use elastic_sync_repository::{ElasticsearchTransport, IndexConfig, SearchTransport};
use elastic_sync_shared::IndexConfiguration;

/// Default Elasticsearch host.
const DEFAULT_HOST: &str = "localhost";

/// Default Elasticsearch REST port.
const DEFAULT_PORT: u16 = 9200;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The resolved index configuration.
    pub config: IndexConfiguration,
    /// The running writer.
    pub writer: Arc<IndexWriter>,
    /// Consumer forwarding change-capture events into the writer.
    pub consumer: ChangeConsumer,
    /// Orchestrator for the startup full reindex.
    pub reindexer: ReindexOrchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ELASTICSEARCH_PROTOCOL`: `http` or `https` (default: http)
    /// - `ELASTICSEARCH_HOST`: Elasticsearch host (default: localhost)
    /// - `ELASTICSEARCH_PORT`: Elasticsearch REST port (default: 9200)
    /// - `ELASTICSEARCH_INDEX`: target index name (default: entities)
    /// - `ELASTICSEARCH_AUTH_USER` / `ELASTICSEARCH_AUTH_PASSWORD`: basic
    ///   auth credentials, both or neither
    /// - `KEY_PROPERTY`: entity property used as the document id
    ///   (default: uuid)
    /// - `QUEUE_CAPACITY`: operation queue bound (default: 10000)
    /// - `REINDEX_BATCH_SIZE`: reindex scan page size (default: 1000)
    /// - `MAX_CONSECUTIVE_ERRORS`: circuit breaker tolerance (default: 5)
    /// - `RETRY_ON_ERROR`: re-attempt transient bulk failures
    ///   (default: false)
    /// - `EXECUTE_BULK`: batch operations into bulk requests (default: true)
    /// - `ASYNC_INDEXATION`: non-blocking submission (default: false)
    /// - `READ_TIMEOUT_MS` / `CONNECTION_TIMEOUT_MS`: transport timeouts
    ///   (default: 3000)
    /// - `INITIALIZE_UNTIL`: epoch-ms deadline before which a startup
    ///   reindex runs (default: 0, never)
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails
    pub async fn new() -> Result<Self, IndexingError> {
        let config = load_config()?;
        let index_name =
            env::var("ELASTICSEARCH_INDEX").unwrap_or_else(|_| IndexConfig::default().name);

        info!(
            endpoint = %config.endpoint_url().unwrap_or_default(),
            index = %index_name,
            key_property = %config.key_property(),
            "Initializing dependencies"
        );

        let transport = ElasticsearchTransport::new(&config, IndexConfig::new(&index_name))
            .map_err(|e| IndexingError::config(format!("Failed to create transport: {}", e)))?;

        // Verify the search engine is reachable before starting the pipeline
        let healthy = transport
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("Health check failed: {}", e)))?;

        if !healthy {
            return Err(IndexingError::config("Elasticsearch cluster is unhealthy"));
        }

        info!("Elasticsearch connection verified");

        let transport: Arc<dyn SearchTransport> = Arc::new(transport);
        let writer = Arc::new(IndexWriter::start(&config, transport));
        let consumer = ChangeConsumer::new(&config, Arc::clone(&writer));
        let reindexer = ReindexOrchestrator::new(&config, Arc::clone(&writer));

        Ok(Self {
            config,
            writer,
            consumer,
            reindexer,
        })
    }
}

/// Build the index configuration from environment variables, starting from
/// the documented defaults.
fn load_config() -> Result<IndexConfiguration, IndexingError> {
    // Defaults are read before the consuming builder chain starts.
    let defaults = IndexConfiguration::default();

    let mut config = defaults
        .clone()
        .with_host(env::var("ELASTICSEARCH_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()))
        .with_port(env_or("ELASTICSEARCH_PORT", DEFAULT_PORT)?);

    if let Ok(protocol) = env::var("ELASTICSEARCH_PROTOCOL") {
        config = config.with_protocol(protocol);
    }
    if let Ok(key_property) = env::var("KEY_PROPERTY") {
        config = config.with_key_property(key_property);
    }

    config = config
        .with_queue_capacity(env_or("QUEUE_CAPACITY", defaults.queue_capacity())?)
        .with_reindex_batch_size(env_or("REINDEX_BATCH_SIZE", defaults.reindex_batch_size())?)
        .with_max_consecutive_errors(env_or(
            "MAX_CONSECUTIVE_ERRORS",
            defaults.max_consecutive_errors(),
        )?)
        .with_retry_on_error(env_or("RETRY_ON_ERROR", defaults.retry_on_error())?)
        .with_execute_bulk(env_or("EXECUTE_BULK", defaults.execute_bulk())?)
        .with_async_indexation(env_or("ASYNC_INDEXATION", defaults.async_indexation())?)
        .with_read_timeout(env_or("READ_TIMEOUT_MS", defaults.read_timeout_ms())?)
        .with_connection_timeout(env_or(
            "CONNECTION_TIMEOUT_MS",
            defaults.connection_timeout_ms(),
        )?)
        .with_initialize_until(env_or("INITIALIZE_UNTIL", defaults.initialize_until())?);

    match (
        env::var("ELASTICSEARCH_AUTH_USER"),
        env::var("ELASTICSEARCH_AUTH_PASSWORD"),
    ) {
        (Ok(user), Ok(password)) => Ok(config.with_auth_credentials(user, password)),
        (Err(_), Err(_)) => Ok(config),
        _ => Err(IndexingError::config(
            "ELASTICSEARCH_AUTH_USER and ELASTICSEARCH_AUTH_PASSWORD must be set together",
        )),
    }
}

/// Read an environment variable, falling back to `default` when unset and
/// failing on an unparsable value.
fn env_or<T>(name: &str, default: T) -> Result<T, IndexingError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| IndexingError::config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_to_default() {
        let value: u16 = env_or("ELASTIC_SYNC_TEST_UNSET_VAR", 9200).unwrap();
        assert_eq!(value, 9200);
    }

    #[test]
    fn test_load_config_applies_documented_defaults() {
        let config = load_config().unwrap();

        assert_eq!(config.host(), Some(DEFAULT_HOST));
        assert_eq!(config.port(), Some(DEFAULT_PORT));
        assert_eq!(config.queue_capacity(), 10_000);
        assert_eq!(config.reindex_batch_size(), 1_000);
        assert_eq!(config.max_consecutive_errors(), 5);
        assert!(!config.retry_on_error());
        assert!(config.execute_bulk());
        assert!(!config.async_indexation());
        assert_eq!(config.initialize_until(), 0);
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        env::set_var("ELASTIC_SYNC_TEST_GARBAGE_PORT", "not-a-port");
        let result: Result<u16, _> = env_or("ELASTIC_SYNC_TEST_GARBAGE_PORT", 9200);
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
        env::remove_var("ELASTIC_SYNC_TEST_GARBAGE_PORT");
    }
}
