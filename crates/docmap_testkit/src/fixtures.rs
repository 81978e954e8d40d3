//! Test fixtures: mapping metadata and an in-memory unit of work.
//!
//! The fixture model has users with embedded addresses and phone numbers,
//! references to groups and a profile, a polymorphic `favorite` reference
//! to projects or issues, and a file-backed `Image` type.

use docmap_codec::{to_canonical_cbor, Document, Value};
use docmap_core::{
    ChangeSet, ChangeTracker, ClassMetadata, CollectionDiff, DocumentHandle, FieldChange,
    HandleAllocator, Hydrator, PersistError, PersistResult, PropertyValue, StaticRegistry, ID_KEY,
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// JSON metadata of the fixture model.
pub const FIXTURE_METADATA: &str = include_str!("../fixtures/metadata.json");

/// Returns a registry with the fixture model.
pub fn fixture_registry() -> StaticRegistry {
    StaticRegistry::from_json(FIXTURE_METADATA).expect("fixture metadata must parse")
}

#[derive(Debug, Clone)]
struct ManagedDocument {
    type_name: String,
    identifier: Option<Value>,
    properties: BTreeMap<String, PropertyValue>,
    original: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Default)]
struct UnitState {
    documents: HashMap<DocumentHandle, ManagedDocument>,
    identity: HashMap<(String, Vec<u8>), DocumentHandle>,
}

/// A minimal unit of work that keeps managed documents in memory.
///
/// Tracks every field against the state it had when the document was
/// created, loaded or last marked clean, and keeps an identity map so
/// loading the same record twice yields the same handle.
///
/// # Example
///
/// ```rust
/// use docmap_testkit::MemoryUnitOfWork;
/// use docmap_core::ChangeTracker;
///
/// let uow = MemoryUnitOfWork::new();
/// let user = uow.create("User");
/// uow.set(user, "username", "alice");
/// assert_eq!(uow.change_set(user).len(), 1);
///
/// uow.mark_clean(user);
/// assert!(uow.change_set(user).is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MemoryUnitOfWork {
    handles: HandleAllocator,
    state: RwLock<UnitState>,
}

impl MemoryUnitOfWork {
    /// Creates an empty unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts managing a new, unsaved document.
    pub fn create(&self, type_name: &str) -> DocumentHandle {
        let handle = self.handles.allocate();
        self.state.write().documents.insert(
            handle,
            ManagedDocument {
                type_name: type_name.to_string(),
                identifier: None,
                properties: BTreeMap::new(),
                original: BTreeMap::new(),
            },
        );
        handle
    }

    /// Sets a field of a managed document.
    pub fn set(&self, handle: DocumentHandle, field: &str, value: impl Into<PropertyValue>) {
        if let Some(doc) = self.state.write().documents.get_mut(&handle) {
            doc.properties.insert(field.to_string(), value.into());
        }
    }

    /// Returns a field of a managed document, null if unset.
    pub fn get(&self, handle: DocumentHandle, field: &str) -> PropertyValue {
        self.property(handle, field)
    }

    /// Returns the identifier of a managed document.
    pub fn identifier(&self, handle: DocumentHandle) -> Option<Value> {
        self.document_identifier(handle)
    }

    /// Gives a document an identifier without inserting it.
    pub fn set_identifier(&self, handle: DocumentHandle, id: Value) {
        if let Some(doc) = self.state.write().documents.get_mut(&handle) {
            doc.identifier = Some(id);
        }
    }

    /// Returns the number of managed documents.
    pub fn len(&self) -> usize {
        self.state.read().documents.len()
    }

    /// Returns true if no document is managed.
    pub fn is_empty(&self) -> bool {
        self.state.read().documents.is_empty()
    }

    /// Records the identifiers the store assigned to inserted documents.
    ///
    /// Identifiers arrive in stored form and are converted with the type's
    /// identifier strategy. The identifier field, if the type has one, is
    /// set as well and the documents enter the identity map.
    ///
    /// # Errors
    ///
    /// Returns an error if a handle is not managed or an identifier cannot
    /// be encoded.
    pub fn assign_identifiers(
        &self,
        metadata: &ClassMetadata,
        inserted: &[(Value, DocumentHandle)],
    ) -> PersistResult<()> {
        let mut state = self.state.write();
        for (stored, handle) in inserted {
            let key = identity_key(&metadata.name, stored)?;
            let doc = state
                .documents
                .get_mut(handle)
                .ok_or(PersistError::UnknownDocument { handle: *handle })?;
            let id = metadata.identifier_from_store(stored);
            if let Some(field) = metadata.identifier_field() {
                doc.properties
                    .insert(field.name.clone(), PropertyValue::from(id.clone()));
                doc.original
                    .insert(field.name.clone(), PropertyValue::from(id.clone()));
            }
            doc.identifier = Some(id);
            state.identity.insert(key, *handle);
        }
        Ok(())
    }

    /// Makes the current state of a document its new baseline.
    pub fn mark_clean(&self, handle: DocumentHandle) {
        if let Some(doc) = self.state.write().documents.get_mut(&handle) {
            doc.original = doc.properties.clone();
        }
    }

    /// Makes the current state of every document its new baseline.
    pub fn mark_all_clean(&self) {
        for doc in self.state.write().documents.values_mut() {
            doc.original = doc.properties.clone();
        }
    }
}

impl ChangeTracker for MemoryUnitOfWork {
    fn document_type(&self, handle: DocumentHandle) -> Option<String> {
        self.state
            .read()
            .documents
            .get(&handle)
            .map(|doc| doc.type_name.clone())
    }

    fn document_identifier(&self, handle: DocumentHandle) -> Option<Value> {
        self.state
            .read()
            .documents
            .get(&handle)
            .and_then(|doc| doc.identifier.clone())
    }

    fn property(&self, handle: DocumentHandle, field: &str) -> PropertyValue {
        self.state
            .read()
            .documents
            .get(&handle)
            .and_then(|doc| doc.properties.get(field).cloned())
            .unwrap_or_default()
    }

    fn change_set(&self, handle: DocumentHandle) -> ChangeSet {
        let state = self.state.read();
        let Some(doc) = state.documents.get(&handle) else {
            return ChangeSet::new();
        };

        let fields: BTreeSet<&String> = doc.properties.keys().chain(doc.original.keys()).collect();
        let mut changes = ChangeSet::new();
        for field in fields {
            let old = doc.original.get(field).cloned().unwrap_or_default();
            let new = doc.properties.get(field).cloned().unwrap_or_default();
            if old == new {
                continue;
            }
            let diff = match (&old, &new) {
                (PropertyValue::List(before), PropertyValue::List(after)) => {
                    Some(list_diff(before, after))
                }
                _ => None,
            };
            let mut change = FieldChange::new(old, new);
            if let Some(diff) = diff {
                change = change.with_diff(diff);
            }
            changes.insert(field.as_str(), change);
        }
        changes
    }
}

impl Hydrator for MemoryUnitOfWork {
    fn hydrate(&self, metadata: &ClassMetadata, record: Document) -> PersistResult<DocumentHandle> {
        let stored = stored_id(metadata, &record)?;
        let key = identity_key(&metadata.name, &stored)?;

        let mut state = self.state.write();
        if let Some(handle) = state.identity.get(&key) {
            return Ok(*handle);
        }
        let handle = self.handles.allocate();
        let properties = properties_from_record(metadata, &record);
        state.documents.insert(
            handle,
            ManagedDocument {
                type_name: metadata.name.clone(),
                identifier: Some(metadata.identifier_from_store(&stored)),
                original: properties.clone(),
                properties,
            },
        );
        state.identity.insert(key, handle);
        Ok(handle)
    }

    fn refresh(
        &self,
        handle: DocumentHandle,
        metadata: &ClassMetadata,
        record: Document,
    ) -> PersistResult<()> {
        let mut state = self.state.write();
        let doc = state
            .documents
            .get_mut(&handle)
            .ok_or(PersistError::UnknownDocument { handle })?;

        let fresh = properties_from_record(metadata, &record);
        for field in metadata.fields().iter().filter(|f| !f.not_saved) {
            match fresh.get(&field.name) {
                Some(value) => {
                    doc.properties.insert(field.name.clone(), value.clone());
                    doc.original.insert(field.name.clone(), value.clone());
                }
                None => {
                    doc.properties.remove(&field.name);
                    doc.original.remove(&field.name);
                }
            }
        }
        if let Some(stored) = record.get(ID_KEY) {
            doc.identifier = Some(metadata.identifier_from_store(stored));
        }
        Ok(())
    }
}

fn stored_id(metadata: &ClassMetadata, record: &Document) -> PersistResult<Value> {
    record.get(ID_KEY).cloned().ok_or_else(|| {
        PersistError::mapping_inconsistency(format!("{} record has no {ID_KEY}", metadata.name))
    })
}

fn identity_key(type_name: &str, stored: &Value) -> PersistResult<(String, Vec<u8>)> {
    Ok((type_name.to_string(), to_canonical_cbor(stored)?))
}

fn properties_from_record(
    metadata: &ClassMetadata,
    record: &Document,
) -> BTreeMap<String, PropertyValue> {
    metadata
        .fields()
        .iter()
        .filter(|field| !field.not_saved)
        .filter_map(|field| {
            let value = if field.identifier {
                record.get(ID_KEY).map(|id| metadata.identifier_from_store(id))
            } else {
                record.get(&field.name).cloned()
            }?;
            Some((field.name.clone(), property_from_value(value)))
        })
        .collect()
}

fn property_from_value(value: Value) -> PropertyValue {
    match value {
        Value::Array(items) => {
            PropertyValue::List(items.into_iter().map(property_from_value).collect())
        }
        other => PropertyValue::from(other),
    }
}

fn list_diff(before: &[PropertyValue], after: &[PropertyValue]) -> CollectionDiff {
    CollectionDiff::new(
        after.iter().filter(|v| !before.contains(v)).cloned().collect(),
        before.iter().filter(|v| !after.contains(v)).cloned().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_core::MetadataRegistry;

    #[test]
    fn fixture_metadata_parses() {
        let registry = fixture_registry();
        let user = registry.require("User").unwrap();
        assert_eq!(user.collection, "users");
        assert!(user.field_mapping("favorite").unwrap().is_polymorphic());
        assert!(registry.require("Image").unwrap().file);
        assert!(registry.require("Address").unwrap().embedded);
    }

    #[test]
    fn change_set_tracks_modifications() {
        let uow = MemoryUnitOfWork::new();
        let user = uow.create("User");
        uow.set(user, "username", "alice");
        uow.set(user, "count", 1i64);
        uow.mark_clean(user);

        uow.set(user, "count", 2i64);
        let changes = uow.change_set(user);
        assert_eq!(changes.len(), 1);
        let change = changes.get("count").unwrap();
        assert_eq!(change.old, PropertyValue::from(1i64));
        assert_eq!(change.new, PropertyValue::from(2i64));
    }

    #[test]
    fn list_changes_carry_a_diff() {
        let uow = MemoryUnitOfWork::new();
        let user = uow.create("User");
        let a = uow.create("Group");
        let b = uow.create("Group");
        let c = uow.create("Group");
        uow.set(user, "groups", vec![a, b]);
        uow.mark_clean(user);
        uow.set(user, "groups", vec![b, c]);

        let changes = uow.change_set(user);
        let diff = changes.get("groups").unwrap().collection_diff.clone().unwrap();
        assert_eq!(diff.inserted, vec![PropertyValue::Object(c)]);
        assert_eq!(diff.deleted, vec![PropertyValue::Object(a)]);
    }

    #[test]
    fn hydrate_uses_identity_map() {
        let uow = MemoryUnitOfWork::new();
        let registry = fixture_registry();
        let group = registry.require("Group").unwrap();
        let record: Document = [(ID_KEY, Value::from("g1")), ("name", Value::from("admins"))]
            .into_iter()
            .collect();

        let first = uow.hydrate(&group, record.clone()).unwrap();
        let second = uow.hydrate(&group, record).unwrap();
        assert_eq!(first, second);
        assert_eq!(uow.get(first, "name"), PropertyValue::from("admins"));
        assert_eq!(uow.identifier(first), Some(Value::from("g1")));
        assert!(uow.change_set(first).is_empty());
    }

    #[test]
    fn refresh_keeps_unsaved_fields() {
        let uow = MemoryUnitOfWork::new();
        let registry = fixture_registry();
        let user_meta = registry.require("User").unwrap();
        let user = uow.create("User");
        uow.set(user, "password", "secret");
        uow.set(user, "username", "stale");

        let record: Document = [(ID_KEY, Value::from("u1")), ("username", Value::from("fresh"))]
            .into_iter()
            .collect();
        uow.refresh(user, &user_meta, record).unwrap();

        assert_eq!(uow.get(user, "username"), PropertyValue::from("fresh"));
        assert_eq!(uow.get(user, "password"), PropertyValue::from("secret"));
        assert_eq!(uow.identifier(user), Some(Value::from("u1")));
    }

    #[test]
    fn assigned_identifiers_enter_identity_map() {
        let uow = MemoryUnitOfWork::new();
        let registry = fixture_registry();
        let group_meta = registry.require("Group").unwrap();
        let group = uow.create("Group");
        let stored = Value::ObjectId(docmap_codec::ObjectId::new());

        uow.assign_identifiers(&group_meta, &[(stored.clone(), group)]).unwrap();
        assert!(matches!(uow.identifier(group), Some(Value::Text(_))));

        let record: Document = [(ID_KEY, stored)].into_iter().collect();
        assert_eq!(uow.hydrate(&group_meta, record).unwrap(), group);
    }
}
