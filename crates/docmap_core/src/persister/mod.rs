//! Insert, update, delete and load orchestration for one document type.

mod insert;
mod loader;
mod update;

pub use insert::PendingReferencePatch;
pub use loader::DocumentCursor;

use crate::config::PersisterConfig;
use crate::error::{PersistError, PersistResult};
use crate::handle::DocumentHandle;
use crate::mapping::{ClassMetadata, MetadataRegistry};
use crate::serializer::Serializer;
use crate::store::{StoreDriver, ID_KEY};
use crate::types::TypeRegistry;
use crate::uow::{ChangeTracker, Hydrator, UpdateListener};
use docmap_codec::{Document, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// The collaborators shared by every persister of a unit of work.
#[derive(Clone)]
pub struct PersistenceContext {
    /// Document type metadata.
    pub registry: Arc<dyn MetadataRegistry>,
    /// Scalar type converters.
    pub types: Arc<TypeRegistry>,
    /// Source of managed documents and their changes.
    pub tracker: Arc<dyn ChangeTracker>,
    /// Turns stored records back into managed documents.
    pub hydrator: Arc<dyn Hydrator>,
    /// Optional observer of prepared updates.
    pub listener: Option<Arc<dyn UpdateListener>>,
    /// Persister settings.
    pub config: PersisterConfig,
}

impl PersistenceContext {
    /// Creates a context with the built-in types and default settings.
    pub fn new(
        registry: Arc<dyn MetadataRegistry>,
        tracker: Arc<dyn ChangeTracker>,
        hydrator: Arc<dyn Hydrator>,
    ) -> Self {
        Self {
            registry,
            types: Arc::new(TypeRegistry::default()),
            tracker,
            hydrator,
            listener: None,
            config: PersisterConfig::default(),
        }
    }

    /// Replaces the type registry.
    #[must_use]
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = Arc::new(types);
        self
    }

    /// Installs an update listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn UpdateListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_config(mut self, config: PersisterConfig) -> Self {
        self.config = config;
        self
    }

    /// Creates the persister for `type_name` writing to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::UnknownDocumentType`] if the type has no
    /// metadata.
    pub fn persister(
        &self,
        type_name: &str,
        store: Arc<dyn StoreDriver>,
    ) -> PersistResult<DocumentPersister> {
        DocumentPersister::new(self, type_name, store)
    }
}

/// Persists documents of one type to one collection.
///
/// Inserts are queued and flushed in a single batch. References to
/// documents that have no identifier yet are left out of the inserted
/// record and patched in by [`DocumentPersister::execute_reference_updates`]
/// once their targets are stored.
///
/// # Example
///
/// ```rust,ignore
/// let mut users = context.persister("User", store.driver_for(&user_meta))?;
/// users.queue_insert(alice);
/// for (id, handle) in users.execute_inserts()? {
///     unit_of_work.set_identifier(handle, id);
/// }
/// users.execute_reference_updates()?;
/// ```
pub struct DocumentPersister {
    context: PersistenceContext,
    metadata: Arc<ClassMetadata>,
    store: Arc<dyn StoreDriver>,
    queued_inserts: Vec<DocumentHandle>,
    pending_patches: BTreeMap<DocumentHandle, Vec<PendingReferencePatch>>,
}

impl DocumentPersister {
    /// Creates a persister, resolving the type's metadata once.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::UnknownDocumentType`] if the type has no
    /// metadata.
    pub fn new(
        context: &PersistenceContext,
        type_name: &str,
        store: Arc<dyn StoreDriver>,
    ) -> PersistResult<Self> {
        let metadata = context.registry.require(type_name)?;
        Ok(Self {
            context: context.clone(),
            metadata,
            store,
            queued_inserts: Vec::new(),
            pending_patches: BTreeMap::new(),
        })
    }

    /// Returns the metadata of the persisted type.
    pub fn metadata(&self) -> &ClassMetadata {
        &self.metadata
    }

    /// Queues a document for the next [`DocumentPersister::execute_inserts`].
    ///
    /// Queuing the same document twice has no further effect.
    pub fn queue_insert(&mut self, handle: DocumentHandle) {
        if !self.queued_inserts.contains(&handle) {
            self.queued_inserts.push(handle);
        }
    }

    /// Returns true if inserts are queued.
    pub fn has_queued_inserts(&self) -> bool {
        !self.queued_inserts.is_empty()
    }

    /// Returns the queued documents in the order they were first queued.
    pub fn queued_inserts(&self) -> &[DocumentHandle] {
        &self.queued_inserts
    }

    /// Returns the number of reference fields waiting to be patched.
    pub fn pending_reference_count(&self) -> usize {
        self.pending_patches.values().map(Vec::len).sum()
    }

    /// Applies the changes of a managed document to its stored record.
    ///
    /// The listener, if any, sees the prepared update first. When the
    /// update both pushes to and pulls from one array field, the colliding
    /// pulls are sent as a separate update before the rest.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::MissingIdentifier`] if the document was
    /// never inserted, or the store's error unchanged.
    pub fn update(&self, handle: DocumentHandle) -> PersistResult<()> {
        let filter = id_filter(self.stored_identifier(handle)?);
        let mut update = self.prepare_update_data(handle)?;
        if update.is_empty() {
            trace!("{handle} has no changes to write");
            return Ok(());
        }
        if let Some(listener) = &self.context.listener {
            listener.pre_update(handle, &self.metadata, &update);
        }

        if let Some(pulls) = update.split_conflicts() {
            debug!(
                collection = %self.metadata.collection,
                "{handle} pushes and pulls one field, sending $pullAll first"
            );
            self.store.update(&filter, &pulls.to_document())?;
        }
        debug!(collection = %self.metadata.collection, "updating {handle}");
        self.store.update(&filter, &update.to_document())?;
        Ok(())
    }

    /// Removes the stored record of a managed document.
    ///
    /// Referenced and embedded documents are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::MissingIdentifier`] if the document was
    /// never inserted, or the store's error unchanged.
    pub fn delete(&self, handle: DocumentHandle) -> PersistResult<()> {
        let filter = id_filter(self.stored_identifier(handle)?);
        debug!(collection = %self.metadata.collection, "deleting {handle}");
        self.store.remove(&filter)?;
        Ok(())
    }

    fn serializer(&self) -> Serializer<'_> {
        Serializer::new(
            self.context.registry.as_ref(),
            &self.context.types,
            self.context.tracker.as_ref(),
            &self.context.config,
        )
    }

    fn ensure_managed(&self, handle: DocumentHandle) -> PersistResult<()> {
        match self.context.tracker.document_type(handle) {
            Some(_) => Ok(()),
            None => Err(PersistError::UnknownDocument { handle }),
        }
    }

    /// Returns the document's identifier in stored form.
    fn stored_identifier(&self, handle: DocumentHandle) -> PersistResult<Value> {
        self.ensure_managed(handle)?;
        self.context
            .tracker
            .document_identifier(handle)
            .filter(|id| !id.is_null())
            .map(|id| self.metadata.identifier_to_store(&id))
            .ok_or_else(|| PersistError::missing_identifier(&self.metadata.name))
    }
}

fn id_filter(id: Value) -> Document {
    [(ID_KEY, id)].into_iter().collect()
}

fn display_id(id: &Value) -> String {
    match id {
        Value::ObjectId(oid) => oid.to_hex(),
        Value::Text(text) => text.clone(),
        Value::Integer(n) => n.to_string(),
        other => format!("{other:?}"),
    }
}
