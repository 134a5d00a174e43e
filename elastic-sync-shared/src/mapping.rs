//! The document-mapping collaborator.
//!
//! A [`Mapping`] translates a domain [`Entity`] into the JSON document body
//! written to the search engine. Mappings are installed through
//! [`IndexConfiguration::with_mapping`](crate::config::IndexConfiguration::with_mapping),
//! which configures them before they become reachable, so an installed
//! mapping can never be unconfigured.

use std::collections::HashMap;

use thiserror::Error;

use crate::operation::{DocumentBody, Entity};

/// Errors produced while translating an entity into a document.
///
/// A mapping failure is always a per-operation failure: the single entity is
/// dropped and counted, the rest of the batch is unaffected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    /// The entity could not be translated into a document.
    #[error("Translation error: {0}")]
    TranslationError(String),

    /// A property required by the mapping is missing from the entity.
    #[error("Missing property: {0}")]
    MissingProperty(String),
}

impl MappingError {
    /// Create a translation error.
    pub fn translation(msg: impl Into<String>) -> Self {
        Self::TranslationError(msg.into())
    }

    /// Create a missing-property error.
    pub fn missing_property(name: impl Into<String>) -> Self {
        Self::MissingProperty(name.into())
    }
}

/// Strategy for converting domain entities into search documents.
///
/// Implementations must be `Send + Sync`; the configured mapping is shared
/// between the writer and the reindex orchestrator.
pub trait Mapping: Send + Sync {
    /// Apply a string-keyed option map to this mapping.
    ///
    /// Called exactly once, by `IndexConfiguration::with_mapping`, before the
    /// mapping is installed.
    fn configure(&mut self, options: &HashMap<String, String>);

    /// A stable name identifying this mapping strategy.
    ///
    /// Participates in configuration equality: swapping the mapping strategy
    /// counts as configuration drift.
    fn name(&self) -> &str;

    /// Translate an entity into a document body.
    fn document_for(&self, entity: &Entity) -> Result<DocumentBody, MappingError>;
}

/// Default mapping: the document is the entity's property bag.
///
/// Recognized options:
/// - `exclude_properties`: comma-separated property names omitted from the
///   produced document.
#[derive(Debug, Default)]
pub struct DefaultMapping {
    excluded: Vec<String>,
}

impl DefaultMapping {
    /// Create an unconfigured default mapping.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Mapping for DefaultMapping {
    fn configure(&mut self, options: &HashMap<String, String>) {
        if let Some(excluded) = options.get("exclude_properties") {
            self.excluded = excluded
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    fn name(&self) -> &str {
        "default"
    }

    fn document_for(&self, entity: &Entity) -> Result<DocumentBody, MappingError> {
        if entity.properties.is_empty() {
            return Err(MappingError::translation("entity has no properties"));
        }

        let mut document = entity.properties.clone();
        for name in &self.excluded {
            document.remove(name);
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping_copies_properties() {
        let mapping = DefaultMapping::new();
        let entity = Entity::new()
            .with_property("uuid", "abc")
            .with_property("name", "Widget");

        let doc = mapping.document_for(&entity).unwrap();

        assert_eq!(doc.get("uuid").and_then(|v| v.as_str()), Some("abc"));
        assert_eq!(doc.get("name").and_then(|v| v.as_str()), Some("Widget"));
    }

    #[test]
    fn test_default_mapping_excludes_configured_properties() {
        let mut mapping = DefaultMapping::new();
        let mut options = HashMap::new();
        options.insert(
            "exclude_properties".to_string(),
            "secret, internal".to_string(),
        );
        mapping.configure(&options);

        let entity = Entity::new()
            .with_property("uuid", "abc")
            .with_property("secret", "hidden")
            .with_property("internal", 42);

        let doc = mapping.document_for(&entity).unwrap();

        assert!(doc.contains_key("uuid"));
        assert!(!doc.contains_key("secret"));
        assert!(!doc.contains_key("internal"));
    }

    #[test]
    fn test_default_mapping_rejects_empty_entity() {
        let mapping = DefaultMapping::new();
        let entity = Entity::new();

        let result = mapping.document_for(&entity);

        assert!(matches!(result, Err(MappingError::TranslationError(_))));
    }
}
