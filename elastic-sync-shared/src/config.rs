//! Immutable indexing configuration.
//!
//! [`IndexConfiguration`] is a value object: every `with_*` mutator returns a
//! new instance differing only in the mutated field, and equality covers
//! every field so the owning runtime can detect "configuration changed since
//! last start" and decide whether a full reindex is needed.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::mapping::{DefaultMapping, Mapping};

/// Default connection protocol.
pub const DEFAULT_PROTOCOL: &str = "http";
/// Default name of the entity property used as the document identity key.
pub const DEFAULT_KEY_PROPERTY: &str = "uuid";
/// Default consecutive-failure tolerance before the breaker trips.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 5;
/// Default capacity of the operation queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
/// Default chunk size for full reindex scans.
pub const DEFAULT_REINDEX_BATCH_SIZE: usize = 1_000;
/// Default read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 3_000;
/// Default connection timeout in milliseconds.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 3_000;

/// Basic-auth credentials for the search engine, both fields required.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthCredentials {
    /// Username.
    pub user: String,
    /// Password.
    pub password: String,
}

impl AuthCredentials {
    /// Create a credentials pair.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Immutable configuration for the indexing pipeline.
///
/// Constructed once at module start and replaced wholesale on any settings
/// change. Derived copies are produced with the `with_*` mutators; the
/// original is never mutated in place.
#[derive(Clone)]
pub struct IndexConfiguration {
    protocol: String,
    host: Option<String>,
    port: Option<u16>,
    key_property: String,
    retry_on_error: bool,
    max_consecutive_errors: u32,
    queue_capacity: usize,
    reindex_batch_size: usize,
    execute_bulk: bool,
    auth: Option<AuthCredentials>,
    mapping: Arc<dyn Mapping>,
    async_indexation: bool,
    read_timeout_ms: u64,
    connection_timeout_ms: u64,
    initialize_until: u64,
}

impl Default for IndexConfiguration {
    /// A fully-populated default configuration with a configured
    /// [`DefaultMapping`] installed.
    fn default() -> Self {
        let mut mapping = DefaultMapping::new();
        mapping.configure(&HashMap::new());

        Self {
            protocol: DEFAULT_PROTOCOL.to_string(),
            host: None,
            port: None,
            key_property: DEFAULT_KEY_PROPERTY.to_string(),
            retry_on_error: false,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reindex_batch_size: DEFAULT_REINDEX_BATCH_SIZE,
            execute_bulk: true,
            auth: None,
            mapping: Arc::new(mapping),
            async_indexation: false,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            initialize_until: 0,
        }
    }
}

impl IndexConfiguration {
    /// Set the connection protocol.
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Set the search engine host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the search engine port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the name of the entity property used as the document identity key.
    pub fn with_key_property(mut self, key_property: impl Into<String>) -> Self {
        let key_property = key_property.into();
        debug_assert!(!key_property.is_empty(), "key property must not be empty");
        self.key_property = key_property;
        self
    }

    /// Set whether failed operations are retried or discarded.
    pub fn with_retry_on_error(mut self, retry_on_error: bool) -> Self {
        self.retry_on_error = retry_on_error;
        self
    }

    /// Set the consecutive-failure tolerance of the circuit breaker.
    pub fn with_max_consecutive_errors(mut self, max_consecutive_errors: u32) -> Self {
        debug_assert!(max_consecutive_errors > 0);
        self.max_consecutive_errors = max_consecutive_errors;
        self
    }

    /// Set the capacity of the operation queue.
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        debug_assert!(queue_capacity > 0);
        self.queue_capacity = queue_capacity;
        self
    }

    /// Set the chunk size for full reindex scans.
    pub fn with_reindex_batch_size(mut self, reindex_batch_size: usize) -> Self {
        debug_assert!(reindex_batch_size > 0);
        self.reindex_batch_size = reindex_batch_size;
        self
    }

    /// Set whether operations are batched into bulk requests.
    pub fn with_execute_bulk(mut self, execute_bulk: bool) -> Self {
        self.execute_bulk = execute_bulk;
        self
    }

    /// Set basic-auth credentials, both-or-neither.
    pub fn with_auth_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.auth = Some(AuthCredentials::new(user, password));
        self
    }

    /// Install a mapping, configuring it with the supplied options first.
    ///
    /// The configure step happens before the mapping becomes reachable, so a
    /// mapping can never be installed unconfigured.
    pub fn with_mapping(
        mut self,
        mut mapping: Box<dyn Mapping>,
        options: &HashMap<String, String>,
    ) -> Self {
        mapping.configure(options);
        self.mapping = Arc::from(mapping);
        self
    }

    /// Set whether submission returns before queue admission completes.
    pub fn with_async_indexation(mut self, async_indexation: bool) -> Self {
        self.async_indexation = async_indexation;
        self
    }

    /// Set the transport read timeout in milliseconds.
    pub fn with_read_timeout(mut self, read_timeout_ms: u64) -> Self {
        self.read_timeout_ms = read_timeout_ms;
        self
    }

    /// Set the transport connection timeout in milliseconds.
    pub fn with_connection_timeout(mut self, connection_timeout_ms: u64) -> Self {
        self.connection_timeout_ms = connection_timeout_ms;
        self
    }

    /// Set the epoch-millisecond watermark before which a full reindex is
    /// eligible. `0` means never.
    pub fn with_initialize_until(mut self, initialize_until: u64) -> Self {
        self.initialize_until = initialize_until;
        self
    }

    /// Connection protocol.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Search engine host, if configured.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Search engine port, if configured.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Full endpoint URL, available once host and port are configured.
    pub fn endpoint_url(&self) -> Option<String> {
        match (&self.host, self.port) {
            (Some(host), Some(port)) => Some(format!("{}://{}:{}", self.protocol, host, port)),
            _ => None,
        }
    }

    /// Name of the entity property used as the document identity key.
    pub fn key_property(&self) -> &str {
        &self.key_property
    }

    /// Whether failed operations are retried.
    pub fn retry_on_error(&self) -> bool {
        self.retry_on_error
    }

    /// Consecutive-failure tolerance of the circuit breaker.
    pub fn max_consecutive_errors(&self) -> u32 {
        self.max_consecutive_errors
    }

    /// Capacity of the operation queue.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Chunk size for full reindex scans.
    pub fn reindex_batch_size(&self) -> usize {
        self.reindex_batch_size
    }

    /// Whether operations are batched into bulk requests.
    pub fn execute_bulk(&self) -> bool {
        self.execute_bulk
    }

    /// Basic-auth credentials, if configured.
    pub fn auth(&self) -> Option<&AuthCredentials> {
        self.auth.as_ref()
    }

    /// The installed mapping.
    pub fn mapping(&self) -> Arc<dyn Mapping> {
        Arc::clone(&self.mapping)
    }

    /// Whether submission returns before queue admission completes.
    pub fn async_indexation(&self) -> bool {
        self.async_indexation
    }

    /// Transport read timeout in milliseconds.
    pub fn read_timeout_ms(&self) -> u64 {
        self.read_timeout_ms
    }

    /// Transport connection timeout in milliseconds.
    pub fn connection_timeout_ms(&self) -> u64 {
        self.connection_timeout_ms
    }

    /// Epoch-millisecond watermark before which a full reindex is eligible.
    pub fn initialize_until(&self) -> u64 {
        self.initialize_until
    }

    /// Whether the reindex eligibility window is open at `now_ms`.
    ///
    /// A watermark of `0` means never eligible, preventing unwanted full
    /// reindexes long after a configuration change.
    pub fn reindex_window_open(&self, now_ms: u64) -> bool {
        now_ms < self.initialize_until
    }
}

impl PartialEq for IndexConfiguration {
    /// Field-complete equality.
    ///
    /// Every field participates, including `initialize_until` — a change in
    /// any field, even one with no indexing-behavior effect, must force
    /// re-initialization detection. The mapping is compared by its stable
    /// name.
    fn eq(&self, other: &Self) -> bool {
        self.protocol == other.protocol
            && self.host == other.host
            && self.port == other.port
            && self.key_property == other.key_property
            && self.retry_on_error == other.retry_on_error
            && self.max_consecutive_errors == other.max_consecutive_errors
            && self.queue_capacity == other.queue_capacity
            && self.reindex_batch_size == other.reindex_batch_size
            && self.execute_bulk == other.execute_bulk
            && self.auth == other.auth
            && self.mapping.name() == other.mapping.name()
            && self.async_indexation == other.async_indexation
            && self.read_timeout_ms == other.read_timeout_ms
            && self.connection_timeout_ms == other.connection_timeout_ms
            && self.initialize_until == other.initialize_until
    }
}

impl Eq for IndexConfiguration {}

impl Hash for IndexConfiguration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.protocol.hash(state);
        self.host.hash(state);
        self.port.hash(state);
        self.key_property.hash(state);
        self.retry_on_error.hash(state);
        self.max_consecutive_errors.hash(state);
        self.queue_capacity.hash(state);
        self.reindex_batch_size.hash(state);
        self.execute_bulk.hash(state);
        self.auth.hash(state);
        self.mapping.name().hash(state);
        self.async_indexation.hash(state);
        self.read_timeout_ms.hash(state);
        self.connection_timeout_ms.hash(state);
        self.initialize_until.hash(state);
    }
}

impl fmt::Debug for IndexConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexConfiguration")
            .field("protocol", &self.protocol)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("key_property", &self.key_property)
            .field("retry_on_error", &self.retry_on_error)
            .field("max_consecutive_errors", &self.max_consecutive_errors)
            .field("queue_capacity", &self.queue_capacity)
            .field("reindex_batch_size", &self.reindex_batch_size)
            .field("execute_bulk", &self.execute_bulk)
            .field("auth_user", &self.auth.as_ref().map(|a| a.user.as_str()))
            .field("mapping", &self.mapping.name())
            .field("async_indexation", &self.async_indexation)
            .field("read_timeout_ms", &self.read_timeout_ms)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("initialize_until", &self.initialize_until)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingError;
    use crate::operation::{DocumentBody, Entity};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc as StdArc;

    #[test]
    fn test_defaults() {
        let config = IndexConfiguration::default();

        assert_eq!(config.protocol(), "http");
        assert!(config.host().is_none());
        assert!(config.port().is_none());
        assert_eq!(config.key_property(), "uuid");
        assert!(!config.retry_on_error());
        assert_eq!(config.max_consecutive_errors(), 5);
        assert_eq!(config.queue_capacity(), 10_000);
        assert_eq!(config.reindex_batch_size(), 1_000);
        assert!(config.execute_bulk());
        assert!(config.auth().is_none());
        assert!(!config.async_indexation());
        assert_eq!(config.read_timeout_ms(), 3_000);
        assert_eq!(config.connection_timeout_ms(), 3_000);
        assert_eq!(config.initialize_until(), 0);
    }

    #[test]
    fn test_with_mutators_preserve_other_fields() {
        let base = IndexConfiguration::default()
            .with_host("localhost")
            .with_port(9200);

        let derived = base.clone().with_queue_capacity(42);

        assert_eq!(derived.queue_capacity(), 42);
        assert_eq!(derived.host(), base.host());
        assert_eq!(derived.port(), base.port());
        assert_eq!(derived.key_property(), base.key_property());
        assert_eq!(derived.retry_on_error(), base.retry_on_error());
        assert_eq!(derived.execute_bulk(), base.execute_bulk());
        assert_eq!(derived.initialize_until(), base.initialize_until());
        assert_ne!(derived, base);
        assert_eq!(derived.with_queue_capacity(base.queue_capacity()), base);
    }

    #[test]
    fn test_equality_considers_initialize_until() {
        let a = IndexConfiguration::default().with_host("localhost").with_port(9200);
        let b = a.clone().with_initialize_until(1_700_000_000_000);

        assert_ne!(a, b);
        assert_eq!(a, b.with_initialize_until(0));
    }

    #[test]
    fn test_equality_considers_auth() {
        let a = IndexConfiguration::default();
        let b = a.clone().with_auth_credentials("elastic", "changeme");

        assert_ne!(a, b);
    }

    #[test]
    fn test_endpoint_url() {
        let config = IndexConfiguration::default()
            .with_protocol("https")
            .with_host("search.example.com")
            .with_port(9243);

        assert_eq!(
            config.endpoint_url(),
            Some("https://search.example.com:9243".to_string())
        );
        assert!(IndexConfiguration::default().endpoint_url().is_none());
    }

    #[test]
    fn test_reindex_window() {
        let config = IndexConfiguration::default().with_initialize_until(1_000);

        assert!(config.reindex_window_open(999));
        assert!(!config.reindex_window_open(1_000));
        assert!(!IndexConfiguration::default().reindex_window_open(0));
    }

    /// Mapping that records whether configure was called.
    struct TrackingMapping {
        configured: StdArc<AtomicBool>,
    }

    impl Mapping for TrackingMapping {
        fn configure(&mut self, _options: &HashMap<String, String>) {
            self.configured.store(true, Ordering::SeqCst);
        }

        fn name(&self) -> &str {
            "tracking"
        }

        fn document_for(&self, entity: &Entity) -> Result<DocumentBody, MappingError> {
            Ok(entity.properties.clone())
        }
    }

    #[test]
    fn test_with_mapping_configures_before_install() {
        let configured = StdArc::new(AtomicBool::new(false));
        let mapping = TrackingMapping {
            configured: StdArc::clone(&configured),
        };

        let config = IndexConfiguration::default()
            .with_mapping(Box::new(mapping), &HashMap::new());

        assert!(configured.load(Ordering::SeqCst));
        assert_eq!(config.mapping().name(), "tracking");
    }

    #[test]
    fn test_swapped_mapping_is_configuration_drift() {
        let a = IndexConfiguration::default();
        let b = a.clone().with_mapping(
            Box::new(TrackingMapping {
                configured: StdArc::new(AtomicBool::new(false)),
            }),
            &HashMap::new(),
        );

        assert_ne!(a, b);
    }
}
