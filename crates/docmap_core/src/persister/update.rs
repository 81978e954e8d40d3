//! Update payloads.

use super::DocumentPersister;
use crate::changeset::FieldChange;
use crate::error::PersistResult;
use crate::handle::DocumentHandle;
use crate::mapping::{FieldMapping, FieldRole};
use crate::operator::UpdateDocument;
use crate::property::PropertyValue;
use crate::serializer::Serializer;
use crate::translator::{array_operators, translate_array_update, translate_update};
use docmap_codec::Value;

impl DocumentPersister {
    /// Builds the operator document for the pending changes of a managed
    /// document.
    ///
    /// Not-saved and identifier fields are never updated. "Many"
    /// associations use the change tracker's element diff when it has one
    /// and diff the encoded arrays otherwise; plain array fields always
    /// diff the encoded arrays. Other fields are compared in encoded form
    /// and only produce an operator when they differ.
    ///
    /// # Errors
    ///
    /// Returns an error if a value fails to encode or an increment cannot
    /// be computed.
    pub fn prepare_update_data(&self, handle: DocumentHandle) -> PersistResult<UpdateDocument> {
        self.ensure_managed(handle)?;
        let serializer = self.serializer();
        let changes = self.context.tracker.change_set(handle);

        let mut update = UpdateDocument::new();
        for mapping in self.metadata.fields() {
            if mapping.not_saved || mapping.identifier {
                continue;
            }
            let Some(change) = changes.get(&mapping.name) else {
                continue;
            };
            if let Some(partial) = field_update(&serializer, mapping, change)? {
                update.merge(partial);
            }
        }
        Ok(update)
    }
}

fn field_update(
    serializer: &Serializer<'_>,
    mapping: &FieldMapping,
    change: &FieldChange,
) -> PersistResult<Option<UpdateDocument>> {
    if mapping.role.is_many() {
        if let Some(diff) = &change.collection_diff {
            let inserted = encode_elements(serializer, mapping, &diff.inserted)?;
            let deleted = encode_elements(serializer, mapping, &diff.deleted)?;
            return Ok(Some(array_operators(mapping, inserted, deleted)));
        }
    }
    if mapping.role.is_many() || mapping.role == FieldRole::Collection {
        let old = into_elements(serializer.encode(mapping, &change.old)?);
        let new = into_elements(serializer.encode(mapping, &change.new)?);
        return Ok(Some(translate_array_update(mapping, &new, &old)));
    }

    let old = serializer.encode(mapping, &change.old)?;
    let new = serializer.encode(mapping, &change.new)?;
    if old == new {
        return Ok(None);
    }
    translate_update(mapping, &old, &new).map(Some)
}

fn encode_elements(
    serializer: &Serializer<'_>,
    mapping: &FieldMapping,
    elements: &[PropertyValue],
) -> PersistResult<Vec<Value>> {
    if elements.is_empty() {
        return Ok(Vec::new());
    }
    let encoded = serializer.encode(mapping, &PropertyValue::List(elements.to_vec()))?;
    Ok(into_elements(encoded))
}

fn into_elements(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}
