//! Metadata lookup by type name.

use crate::error::{PersistError, PersistResult};
use crate::mapping::class::ClassMetadata;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of document type metadata.
///
/// Implementations resolve and cache metadata; the persister looks types
/// up by name and holds on to the returned `Arc`.
pub trait MetadataRegistry: Send + Sync {
    /// Returns the metadata of a type, if it is known.
    fn metadata_for(&self, type_name: &str) -> Option<Arc<ClassMetadata>>;

    /// Returns the metadata of a type or an [`PersistError::UnknownDocumentType`].
    fn require(&self, type_name: &str) -> PersistResult<Arc<ClassMetadata>> {
        self.metadata_for(type_name)
            .ok_or_else(|| PersistError::unknown_document_type(type_name))
    }
}

/// A registry whose types are fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    classes: HashMap<String, Arc<ClassMetadata>>,
}

impl StaticRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a type, replacing any previous metadata of the same name.
    #[must_use]
    pub fn with(mut self, metadata: ClassMetadata) -> Self {
        self.register(metadata);
        self
    }

    /// Registers a type, replacing any previous metadata of the same name.
    pub fn register(&mut self, metadata: ClassMetadata) {
        self.classes
            .insert(metadata.name.clone(), Arc::new(metadata));
    }

    /// Builds a registry from a JSON array of class metadata.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::InvalidMetadata`] if the JSON does not
    /// describe a list of classes.
    pub fn from_json(json: &str) -> PersistResult<Self> {
        let classes: Vec<ClassMetadata> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for class in classes {
            registry.register(class);
        }
        Ok(registry)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns true if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl MetadataRegistry for StaticRegistry {
    fn metadata_for(&self, type_name: &str) -> Option<Arc<ClassMetadata>> {
        self.classes.get(type_name).cloned()
    }
}
