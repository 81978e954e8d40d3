//! Loading stored records as managed documents.

use super::{display_id, id_filter, DocumentPersister};
use crate::error::{PersistError, PersistResult};
use crate::handle::DocumentHandle;
use crate::mapping::ClassMetadata;
use crate::store::StoreCursor;
use crate::uow::Hydrator;
use docmap_codec::{Document, Value};
use std::sync::Arc;
use tracing::trace;

impl DocumentPersister {
    /// Loads the first record matching `filter`.
    ///
    /// An empty `projection` loads every field.
    ///
    /// # Errors
    ///
    /// Returns the store's or the hydrator's error.
    pub fn load_one(
        &self,
        filter: &Document,
        projection: &[&str],
    ) -> PersistResult<Option<DocumentHandle>> {
        match self.store.find_one(filter, projection)? {
            Some(record) => self.context.hydrator.hydrate(&self.metadata, record).map(Some),
            None => Ok(None),
        }
    }

    /// Loads a document by identifier.
    ///
    /// The identifier is given in the form documents hold it and is
    /// converted with the type's identifier strategy.
    ///
    /// # Errors
    ///
    /// Returns the store's or the hydrator's error.
    pub fn load_by_id(&self, id: &Value) -> PersistResult<Option<DocumentHandle>> {
        trace!(collection = %self.metadata.collection, "loading {}", display_id(id));
        self.load_one(&id_filter(self.metadata.identifier_to_store(id)), &[])
    }

    /// Returns a cursor that loads every record matching `filter` as it is
    /// advanced.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the query cannot be started.
    pub fn load_many(&self, filter: &Document, projection: &[&str]) -> PersistResult<DocumentCursor> {
        let cursor = self.store.find(filter, projection)?;
        Ok(DocumentCursor {
            cursor,
            hydrator: Arc::clone(&self.context.hydrator),
            metadata: Arc::clone(&self.metadata),
        })
    }

    /// Overwrites a managed document with its stored record.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::StaleReference`] if the record no longer
    /// exists, [`PersistError::MissingIdentifier`] if the document was
    /// never inserted, or the store's or the hydrator's error.
    pub fn refresh(&self, handle: DocumentHandle) -> PersistResult<()> {
        let id = self.stored_identifier(handle)?;
        let record = self
            .store
            .find_one(&id_filter(id.clone()), &[])?
            .ok_or_else(|| PersistError::stale_reference(&self.metadata.collection, display_id(&id)))?;
        self.context.hydrator.refresh(handle, &self.metadata, record)
    }
}

/// Lazily hydrating iterator over query results.
pub struct DocumentCursor {
    cursor: Box<dyn StoreCursor>,
    hydrator: Arc<dyn Hydrator>,
    metadata: Arc<ClassMetadata>,
}

impl DocumentCursor {
    /// Moves back to the first result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::NotRestartable`] if the store cannot
    /// rewind the underlying query.
    pub fn rewind(&mut self) -> PersistResult<()> {
        self.cursor.rewind().map_err(PersistError::from)
    }
}

impl Iterator for DocumentCursor {
    type Item = PersistResult<DocumentHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.cursor.next_record()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err.into())),
        };
        Some(self.hydrator.hydrate(&self.metadata, record))
    }
}
