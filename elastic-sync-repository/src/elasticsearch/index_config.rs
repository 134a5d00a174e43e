//! Target index configuration.

/// Default name of the search index.
pub const DEFAULT_INDEX_NAME: &str = "entities";

/// Identifies the index all operations are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// The index name.
    pub name: String,
}

impl IndexConfig {
    /// Create an index configuration with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_NAME)
    }
}
