//! Cross-crate integration test helpers.
//!
//! Wires the fixture model, a [`MemoryUnitOfWork`] and a [`MemoryStore`]
//! into a [`PersistenceContext`] and runs flushes the way a unit of work
//! would: inserts per type, identifiers handed back, reference patches
//! last.

use crate::fixtures::{fixture_registry, MemoryUnitOfWork};
use crate::recording::RecordingStore;
use docmap_codec::{Document, Value};
use docmap_core::{
    ChangeTracker, ClassMetadata, DocumentHandle, DocumentPersister, Hydrator, MemoryStore,
    MetadataRegistry, PersistResult, PersistenceContext, StoreDriver, UpdateListener,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A test harness for integration testing.
pub struct IntegrationHarness {
    /// The backing store.
    pub store: MemoryStore,
    /// The unit of work owning every document.
    pub uow: Arc<MemoryUnitOfWork>,
    /// Context shared by every persister.
    pub context: PersistenceContext,
    recorders: Mutex<HashMap<String, Arc<RecordingStore>>>,
}

impl IntegrationHarness {
    /// Creates a harness over the fixture model with an empty store.
    pub fn new() -> Self {
        let uow = Arc::new(MemoryUnitOfWork::new());
        let context = PersistenceContext::new(
            Arc::new(fixture_registry()),
            Arc::clone(&uow) as Arc<dyn ChangeTracker>,
            Arc::clone(&uow) as Arc<dyn Hydrator>,
        );
        Self {
            store: MemoryStore::new(),
            uow,
            context,
            recorders: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a harness whose persisters notify `listener`.
    pub fn with_listener(listener: Arc<dyn UpdateListener>) -> Self {
        let mut harness = Self::new();
        harness.context = harness.context.with_listener(listener);
        harness
    }

    /// Returns the metadata of a fixture type.
    pub fn metadata(&self, type_name: &str) -> Arc<ClassMetadata> {
        self.context
            .registry
            .require(type_name)
            .expect("Unknown fixture type")
    }

    /// Returns the recording driver of a type's collection.
    pub fn recorder(&self, type_name: &str) -> Arc<RecordingStore> {
        let metadata = self.metadata(type_name);
        let mut recorders = self.recorders.lock();
        let recorder = recorders
            .entry(type_name.to_string())
            .or_insert_with(|| Arc::new(RecordingStore::new(self.store.driver_for(&metadata))));
        Arc::clone(recorder)
    }

    /// Creates a persister for a type, writing through its recorder.
    pub fn persister(&self, type_name: &str) -> DocumentPersister {
        let recorder: Arc<dyn StoreDriver> = self.recorder(type_name);
        self.context
            .persister(type_name, recorder)
            .expect("Failed to create persister")
    }

    /// Inserts documents, grouping them by type in order of first
    /// appearance, then patches deferred references and marks everything
    /// clean.
    ///
    /// # Errors
    ///
    /// Returns the first error of any persister.
    pub fn try_insert_all(&self, handles: &[DocumentHandle]) -> PersistResult<()> {
        let mut persisters: Vec<DocumentPersister> = Vec::new();
        for handle in handles {
            let type_name = self
                .uow
                .document_type(*handle)
                .expect("Document is not managed");
            match persisters.iter_mut().find(|p| p.metadata().name == type_name) {
                Some(persister) => persister.queue_insert(*handle),
                None => {
                    let mut persister = self.persister(&type_name);
                    persister.queue_insert(*handle);
                    persisters.push(persister);
                }
            }
        }

        for persister in &mut persisters {
            let inserted = persister.execute_inserts()?;
            self.uow.assign_identifiers(persister.metadata(), &inserted)?;
        }
        for persister in &mut persisters {
            persister.execute_reference_updates()?;
        }
        self.uow.mark_all_clean();
        Ok(())
    }

    /// Inserts documents, panicking on failure.
    pub fn insert_all(&self, handles: &[DocumentHandle]) {
        self.try_insert_all(handles).expect("Failed to insert documents");
    }

    /// Writes the pending changes of a document and marks it clean.
    pub fn update(&self, handle: DocumentHandle) {
        let type_name = self
            .uow
            .document_type(handle)
            .expect("Document is not managed");
        self.persister(&type_name)
            .update(handle)
            .expect("Failed to update document");
        self.uow.mark_clean(handle);
    }

    /// Returns the stored records of a type.
    pub fn records(&self, type_name: &str) -> Vec<Document> {
        self.store
            .driver_for(&self.metadata(type_name))
            .records()
            .expect("Failed to read records")
    }

    /// Returns the stored record of a document.
    pub fn record_of(&self, handle: DocumentHandle) -> Option<Document> {
        let type_name = self.uow.document_type(handle)?;
        let metadata = self.metadata(&type_name);
        let id = metadata.identifier_to_store(&self.uow.identifier(handle)?);
        self.records(&type_name)
            .into_iter()
            .find(|record| record.get(docmap_core::ID_KEY) == Some(&id))
    }
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the operand of `operator` for `field` in an update document.
pub fn operand<'a>(update: &'a Document, operator: &str, field: &str) -> Option<&'a Value> {
    update.get(operator)?.as_document()?.get(field)
}
