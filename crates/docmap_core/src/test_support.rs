//! Collaborator stubs shared by the unit tests.

use crate::changeset::ChangeSet;
use crate::error::{PersistError, PersistResult};
use crate::handle::{DocumentHandle, HandleAllocator};
use crate::mapping::{ClassMetadata, DiscriminatorMap, FieldMapping, StaticRegistry};
use crate::property::PropertyValue;
use crate::store::ID_KEY;
use crate::uow::{ChangeTracker, Hydrator};
use docmap_codec::{Document, Value};
use parking_lot::Mutex;
use std::collections::HashMap;

pub(crate) fn fixture_registry() -> StaticRegistry {
    StaticRegistry::new()
        .with(
            ClassMetadata::new("User", "users")
                .field(FieldMapping::id("id"))
                .field(FieldMapping::scalar("username", "string"))
                .field(FieldMapping::scalar("email", "string").nullable(true))
                .field(FieldMapping::increment("count", "int"))
                .field(FieldMapping::collection("tags"))
                .field(FieldMapping::embed_one("address").target("Address"))
                .field(FieldMapping::reference_many("groups").target("Group"))
                .field(FieldMapping::reference_one("profile").target("Profile"))
                .field(
                    FieldMapping::reference_one("favorite").discriminator_map(
                        DiscriminatorMap::new()
                            .with("project", "Project")
                            .with("issue", "Issue"),
                    ),
                )
                .field(FieldMapping::scalar("password", "string").not_saved(true)),
        )
        .with(
            ClassMetadata::embedded_document("Address")
                .field(FieldMapping::scalar("street", "string"))
                .field(FieldMapping::scalar("city", "string"))
                .field(FieldMapping::scalar("note", "string").not_saved(true)),
        )
        .with(
            ClassMetadata::embedded_document("Phonenumber")
                .field(FieldMapping::scalar("number", "string")),
        )
        .with(
            ClassMetadata::embedded_document("Node")
                .field(FieldMapping::scalar("label", "string"))
                .field(FieldMapping::embed_one("child").target("Node"))
                .field(FieldMapping::embed_many("children").target("Node"))
                .field(FieldMapping::embed_one("address").target("Address"))
                .field(FieldMapping::reference_one("owner").target("Profile")),
        )
        .with(
            ClassMetadata::new("Group", "groups")
                .field(FieldMapping::id("id"))
                .field(FieldMapping::scalar("name", "string")),
        )
        .with(
            ClassMetadata::new("Profile", "profiles")
                .field(FieldMapping::id("id"))
                .field(FieldMapping::scalar("bio", "string")),
        )
        .with(
            ClassMetadata::new("Bookmark", "bookmarks")
                .field(FieldMapping::id("id"))
                .field(FieldMapping::reference_one("target").target("Profile")),
        )
        .with(ClassMetadata::new("Project", "projects").field(FieldMapping::id("id")))
        .with(ClassMetadata::new("Issue", "issues").field(FieldMapping::id("id")))
        .with(
            ClassMetadata::new("Image", "images")
                .file(true)
                .field(FieldMapping::id("id"))
                .field(FieldMapping::scalar("name", "string"))
                .field(FieldMapping::scalar("file", "file")),
        )
        .with(
            ClassMetadata::new("Task", "tasks")
                .discriminator("type", "task")
                .field(FieldMapping::id("id"))
                .field(FieldMapping::scalar("title", "string")),
        )
}

#[derive(Default)]
struct StubDocument {
    type_name: String,
    identifier: Option<Value>,
    fields: HashMap<String, PropertyValue>,
    changes: ChangeSet,
}

/// Change tracker over documents created by the test itself.
#[derive(Default)]
pub(crate) struct StubTracker {
    handles: HandleAllocator,
    documents: Mutex<HashMap<DocumentHandle, StubDocument>>,
}

impl StubTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, type_name: &str, fields: &[(&str, PropertyValue)]) -> DocumentHandle {
        let handle = self.handles.allocate();
        let document = StubDocument {
            type_name: type_name.to_string(),
            fields: fields
                .iter()
                .map(|(name, value)| ((*name).to_string(), value.clone()))
                .collect(),
            ..StubDocument::default()
        };
        self.documents.lock().insert(handle, document);
        handle
    }

    pub(crate) fn set_identifier(&self, handle: DocumentHandle, id: Value) {
        if let Some(doc) = self.documents.lock().get_mut(&handle) {
            doc.identifier = Some(id);
        }
    }

    pub(crate) fn set_property(&self, handle: DocumentHandle, field: &str, value: PropertyValue) {
        if let Some(doc) = self.documents.lock().get_mut(&handle) {
            doc.fields.insert(field.to_string(), value);
        }
    }

    pub(crate) fn set_changes(&self, handle: DocumentHandle, changes: ChangeSet) {
        if let Some(doc) = self.documents.lock().get_mut(&handle) {
            doc.changes = changes;
        }
    }
}

impl ChangeTracker for StubTracker {
    fn document_type(&self, handle: DocumentHandle) -> Option<String> {
        self.documents.lock().get(&handle).map(|doc| doc.type_name.clone())
    }

    fn document_identifier(&self, handle: DocumentHandle) -> Option<Value> {
        self.documents.lock().get(&handle).and_then(|doc| doc.identifier.clone())
    }

    fn property(&self, handle: DocumentHandle, field: &str) -> PropertyValue {
        self.documents
            .lock()
            .get(&handle)
            .and_then(|doc| doc.fields.get(field).cloned())
            .unwrap_or_default()
    }

    fn change_set(&self, handle: DocumentHandle) -> ChangeSet {
        self.documents
            .lock()
            .get(&handle)
            .map(|doc| doc.changes.clone())
            .unwrap_or_default()
    }
}

/// Hydrator that records every call and hands out fresh handles.
#[derive(Default)]
pub(crate) struct StubHydrator {
    handles: HandleAllocator,
    by_id: Mutex<Vec<(Value, DocumentHandle)>>,
    pub(crate) refreshed: Mutex<Vec<(DocumentHandle, Document)>>,
}

impl StubHydrator {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

impl Hydrator for StubHydrator {
    fn hydrate(&self, _metadata: &ClassMetadata, record: Document) -> PersistResult<DocumentHandle> {
        let id = record
            .get(ID_KEY)
            .cloned()
            .ok_or_else(|| PersistError::mapping_inconsistency("record without _id"))?;
        let mut by_id = self.by_id.lock();
        if let Some((_, handle)) = by_id.iter().find(|(known, _)| *known == id) {
            return Ok(*handle);
        }
        let handle = self.handles.allocate();
        by_id.push((id, handle));
        Ok(handle)
    }

    fn refresh(
        &self,
        handle: DocumentHandle,
        _metadata: &ClassMetadata,
        record: Document,
    ) -> PersistResult<()> {
        self.refreshed.lock().push((handle, record));
        Ok(())
    }
}
