//! Embedded document encoding.

use super::{raw_value, Serializer};
use crate::error::{PersistError, PersistResult};
use crate::handle::DocumentHandle;
use crate::mapping::{ClassMetadata, FieldMapping};
use crate::property::PropertyValue;
use docmap_codec::{Document, Value};

/// The chain of embedded documents currently being encoded.
pub(super) struct EmbedPath {
    chain: Vec<DocumentHandle>,
    max_depth: usize,
}

impl EmbedPath {
    pub(super) fn new(max_depth: usize) -> Self {
        Self {
            chain: Vec::new(),
            max_depth,
        }
    }

    fn enter(&mut self, handle: DocumentHandle, type_name: &str) -> PersistResult<()> {
        if self.chain.contains(&handle) {
            return Err(PersistError::EmbeddedCycle {
                type_name: type_name.to_string(),
            });
        }
        if self.chain.len() >= self.max_depth {
            return Err(PersistError::EmbeddingTooDeep {
                depth: self.max_depth,
            });
        }
        self.chain.push(handle);
        Ok(())
    }

    fn leave(&mut self) {
        self.chain.pop();
    }
}

impl Serializer<'_> {
    /// Encodes `target` as a nested document.
    ///
    /// A target that is not a managed document is returned as is.
    /// Not-saved and null fields of the target are left out.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::EmbeddedCycle`] if the target embeds itself
    /// directly or indirectly, and [`PersistError::EmbeddingTooDeep`] if
    /// nesting exceeds the configured depth.
    pub fn resolve_embedded(
        &self,
        mapping: &FieldMapping,
        target: &PropertyValue,
    ) -> PersistResult<Value> {
        self.embed(mapping, target, &mut EmbedPath::new(self.config.max_embed_depth))
    }

    pub(super) fn embed(
        &self,
        mapping: &FieldMapping,
        target: &PropertyValue,
        path: &mut EmbedPath,
    ) -> PersistResult<Value> {
        let Some(handle) = target.as_handle() else {
            return raw_value(mapping, target);
        };
        let type_name = self
            .tracker
            .document_type(handle)
            .ok_or(PersistError::UnknownDocument { handle })?;
        let metadata = self.registry.require(&type_name)?;

        path.enter(handle, &type_name)?;
        let nested = self.embedded_fields(handle, &metadata, path);
        path.leave();

        let mut doc = nested?;
        self.attach_discriminator(mapping, &type_name, &mut doc);
        Ok(Value::Map(doc))
    }

    fn embedded_fields(
        &self,
        handle: DocumentHandle,
        metadata: &ClassMetadata,
        path: &mut EmbedPath,
    ) -> PersistResult<Document> {
        let mut doc = Document::with_capacity(metadata.fields().len());
        for field in metadata.fields().iter().filter(|f| !f.not_saved) {
            let value = self.tracker.property(handle, &field.name);
            if value.is_null() {
                continue;
            }
            doc.insert(field.name.as_str(), self.encode_value(field, &value, path)?);
        }
        Ok(doc)
    }
}
