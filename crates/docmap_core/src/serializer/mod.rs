//! Field value encoding.
//!
//! The [`Serializer`] turns in-memory field values into stored values:
//! scalars go through the type registry, references become
//! `{$ref, $id, $db}` descriptors and embedded documents become nested
//! documents.

mod embedded;
mod reference;

pub use reference::{has_unresolved_reference, REF_DB_KEY, REF_ID_KEY, REF_KEY};

use crate::config::PersisterConfig;
use crate::error::{PersistError, PersistResult};
use crate::mapping::{FieldMapping, MetadataRegistry};
use crate::property::PropertyValue;
use crate::types::TypeRegistry;
use crate::uow::ChangeTracker;
use docmap_codec::{Document, Value};
use embedded::EmbedPath;

/// Encodes field values according to their mappings.
///
/// Encoding is a pure function of the mapping, the value and what the
/// collaborators report; the serializer holds no state of its own.
#[derive(Clone, Copy)]
pub struct Serializer<'a> {
    registry: &'a dyn MetadataRegistry,
    types: &'a TypeRegistry,
    tracker: &'a dyn ChangeTracker,
    config: &'a PersisterConfig,
}

impl<'a> Serializer<'a> {
    /// Creates a serializer over the given collaborators.
    pub fn new(
        registry: &'a dyn MetadataRegistry,
        types: &'a TypeRegistry,
        tracker: &'a dyn ChangeTracker,
        config: &'a PersisterConfig,
    ) -> Self {
        Self {
            registry,
            types,
            tracker,
            config,
        }
    }

    /// Encodes one field value.
    ///
    /// Null encodes to null. A "many" mapping encodes every element and
    /// yields an array; a single value given to a "many" mapping becomes a
    /// one-element array.
    ///
    /// # Errors
    ///
    /// Returns an error if a scalar converter rejects the value, a
    /// document handle appears in a scalar field, or embedding fails.
    pub fn encode(&self, mapping: &FieldMapping, value: &PropertyValue) -> PersistResult<Value> {
        self.encode_value(mapping, value, &mut EmbedPath::new(self.config.max_embed_depth))
    }

    fn encode_value(
        &self,
        mapping: &FieldMapping,
        value: &PropertyValue,
        path: &mut EmbedPath,
    ) -> PersistResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if !mapping.role.is_many() {
            return self.encode_one(mapping, value, path);
        }
        let items = match value {
            PropertyValue::List(items) => items
                .iter()
                .map(|item| self.encode_one(mapping, item, path))
                .collect::<PersistResult<Vec<_>>>()?,
            single => vec![self.encode_one(mapping, single, path)?],
        };
        Ok(Value::Array(items))
    }

    fn encode_one(
        &self,
        mapping: &FieldMapping,
        value: &PropertyValue,
        path: &mut EmbedPath,
    ) -> PersistResult<Value> {
        if mapping.role.is_embedded() {
            self.embed(mapping, value, path)
        } else if mapping.role.is_reference() {
            self.resolve_reference(mapping, value)
        } else {
            let raw = raw_value(mapping, value)?;
            self.types.convert(&mapping.type_name, &raw)
        }
    }

    /// Adds the discriminator pair of a polymorphic association.
    ///
    /// Does nothing for mappings with a fixed target type.
    fn attach_discriminator(&self, mapping: &FieldMapping, type_name: &str, doc: &mut Document) {
        if !mapping.is_polymorphic() {
            return;
        }
        let field = mapping
            .discriminator_field
            .as_deref()
            .unwrap_or(&self.config.default_discriminator_field);
        let tag = mapping
            .discriminator_map
            .as_ref()
            .map_or(type_name, |map| map.tag_for(type_name));
        doc.insert(field, tag);
    }
}

/// Returns a value that holds no document handles as a plain value.
fn raw_value(mapping: &FieldMapping, value: &PropertyValue) -> PersistResult<Value> {
    value.to_raw().ok_or_else(|| {
        PersistError::mapping_inconsistency(format!(
            "field {} of type {} holds a managed document",
            mapping.name, mapping.type_name
        ))
    })
}
