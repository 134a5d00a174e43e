//! Write operations and the domain entities they are derived from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON document body sent to the search engine.
pub type DocumentBody = serde_json::Map<String, Value>;

/// A single unit of work destined for the search engine.
///
/// The variant shape encodes the invariant that a document body is present
/// exactly when the operation is not a delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Index (create or replace) a document under `key`.
    Index { key: String, document: DocumentBody },
    /// Partially update the document under `key`, creating it if absent.
    Update { key: String, document: DocumentBody },
    /// Remove the document under `key`.
    Delete { key: String },
}

impl Operation {
    /// Create an index operation. The key must not be empty.
    pub fn index(key: impl Into<String>, document: DocumentBody) -> Self {
        let key = key.into();
        debug_assert!(!key.is_empty(), "operation key must not be empty");
        Self::Index { key, document }
    }

    /// Create an update operation. The key must not be empty.
    pub fn update(key: impl Into<String>, document: DocumentBody) -> Self {
        let key = key.into();
        debug_assert!(!key.is_empty(), "operation key must not be empty");
        Self::Update { key, document }
    }

    /// Create a delete operation. The key must not be empty.
    pub fn delete(key: impl Into<String>) -> Self {
        let key = key.into();
        debug_assert!(!key.is_empty(), "operation key must not be empty");
        Self::Delete { key }
    }

    /// The external identity key of the document this operation targets.
    pub fn key(&self) -> &str {
        match self {
            Self::Index { key, .. } | Self::Update { key, .. } | Self::Delete { key } => key,
        }
    }

    /// The document body, present for index and update operations.
    pub fn document(&self) -> Option<&DocumentBody> {
        match self {
            Self::Index { document, .. } | Self::Update { document, .. } => Some(document),
            Self::Delete { .. } => None,
        }
    }

    /// Whether this operation removes a document.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete { .. })
    }
}

/// A domain entity as seen by the indexing pipeline.
///
/// Entities are property bags; which property serves as the document's
/// external identity is named by the configuration's `key_property`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// The entity's properties.
    pub properties: DocumentBody,
}

impl Entity {
    /// Create an entity with no properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property, builder-style.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Look up a string-valued property by name.
    pub fn string_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_index_operation_carries_document() {
        let mut doc = DocumentBody::new();
        doc.insert("name".to_string(), "Test".into());

        let op = Operation::index("key-1", doc.clone());

        assert_eq!(op.key(), "key-1");
        assert_eq!(op.document(), Some(&doc));
        assert!(!op.is_delete());
    }

    #[test]
    fn test_delete_operation_has_no_document() {
        let key = Uuid::new_v4().to_string();
        let op = Operation::delete(key.clone());

        assert_eq!(op.key(), key);
        assert!(op.document().is_none());
        assert!(op.is_delete());
    }

    #[test]
    fn test_entity_properties() {
        let entity = Entity::new()
            .with_property("uuid", "abc-123")
            .with_property("name", "Widget")
            .with_property("count", 3);

        assert_eq!(entity.string_property("uuid"), Some("abc-123"));
        assert_eq!(entity.string_property("name"), Some("Widget"));
        assert!(entity.string_property("count").is_none());
        assert!(entity.property("missing").is_none());
    }
}
