//! Insert payloads, batch inserts and deferred reference patches.

use super::{display_id, id_filter, DocumentPersister};
use crate::error::{PersistError, PersistResult};
use crate::handle::DocumentHandle;
use crate::mapping::FieldMapping;
use crate::operator::UpdateDocument;
use crate::property::PropertyValue;
use crate::serializer::has_unresolved_reference;
use crate::store::{StoreError, ID_KEY};
use docmap_codec::{Document, Value};
use tracing::{debug, warn};

/// A reference field left out of an insert because its target had no
/// identifier yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReferencePatch {
    /// The reference field.
    pub mapping: FieldMapping,
    /// The field value as it was at insert time.
    pub value: PropertyValue,
}

impl DocumentPersister {
    /// Builds the record inserted for a managed document.
    ///
    /// Not-saved fields and null values of non-nullable fields are left
    /// out. The identifier field is written under `_id`. Reference fields
    /// whose target has no identifier yet are left out too and remembered
    /// for [`DocumentPersister::execute_reference_updates`].
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is unknown or a field fails to
    /// encode.
    pub fn prepare_insert_data(&mut self, handle: DocumentHandle) -> PersistResult<Document> {
        let (record, patches) = self.build_insert(handle)?;
        self.record_patches(handle, patches);
        Ok(record)
    }

    /// Replaces the patches remembered for `handle`.
    fn record_patches(&mut self, handle: DocumentHandle, patches: Vec<PendingReferencePatch>) {
        if patches.is_empty() {
            self.pending_patches.remove(&handle);
        } else {
            self.pending_patches.insert(handle, patches);
        }
    }

    fn build_insert(
        &self,
        handle: DocumentHandle,
    ) -> PersistResult<(Document, Vec<PendingReferencePatch>)> {
        self.ensure_managed(handle)?;
        let serializer = self.serializer();
        let changes = self.context.tracker.change_set(handle);
        let mut record = Document::with_capacity(self.metadata.fields().len() + 1);
        let mut patches = Vec::new();

        for mapping in self.metadata.fields().iter().filter(|m| !m.not_saved) {
            let value = changes.new_value(&mapping.name);
            if value.is_null() && !mapping.nullable {
                continue;
            }

            if mapping.identifier {
                let id = value.to_raw().ok_or_else(|| {
                    PersistError::mapping_inconsistency(format!(
                        "identifier {} of {} holds a managed document",
                        mapping.name, self.metadata.name
                    ))
                })?;
                if !id.is_null() {
                    record.insert(ID_KEY, self.metadata.identifier_to_store(&id));
                }
                continue;
            }

            let encoded = serializer.encode(mapping, value)?;
            if mapping.role.is_reference() && has_unresolved_reference(&encoded) {
                patches.push(PendingReferencePatch {
                    mapping: mapping.clone(),
                    value: value.clone(),
                });
                continue;
            }
            record.insert(mapping.name.as_str(), encoded);
        }

        if let Some(discriminator) = &self.metadata.discriminator {
            record.insert(discriminator.field.as_str(), discriminator.value.as_str());
        }
        Ok((record, patches))
    }

    /// Inserts every queued document in one batch.
    ///
    /// Returns the store-assigned identifiers paired with their documents,
    /// in queue order. Documents whose record is empty are skipped. File
    /// documents are refreshed from the stored record afterwards so they
    /// see what the store computed. The queue is empty afterwards even if
    /// the store call fails. Reference patches are remembered only for
    /// documents the store accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be built, or the store's error
    /// unchanged.
    pub fn execute_inserts(&mut self) -> PersistResult<Vec<(Value, DocumentHandle)>> {
        if self.queued_inserts.is_empty() {
            return Ok(Vec::new());
        }
        let queued = std::mem::take(&mut self.queued_inserts);
        for handle in &queued {
            self.pending_patches.remove(handle);
        }

        let mut records = Vec::with_capacity(queued.len());
        let mut owners = Vec::with_capacity(queued.len());
        let mut deferred = Vec::with_capacity(queued.len());
        for handle in queued {
            let (record, patches) = self.build_insert(handle)?;
            if record.is_empty() {
                warn!("{handle} has nothing to insert, skipping");
                continue;
            }
            records.push(record);
            owners.push(handle);
            deferred.push(patches);
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            collection = %self.metadata.collection,
            "inserting {} documents",
            records.len()
        );
        let ids = self.store.batch_insert(records)?;
        if ids.len() != owners.len() {
            return Err(StoreError::protocol(format!(
                "inserted {} records but received {} identifiers",
                owners.len(),
                ids.len()
            ))
            .into());
        }
        for (handle, patches) in owners.iter().zip(deferred) {
            self.record_patches(*handle, patches);
        }

        let inserted: Vec<(Value, DocumentHandle)> = ids.into_iter().zip(owners).collect();
        if self.metadata.file {
            for (id, handle) in &inserted {
                self.reload_file(id, *handle)?;
            }
        }
        if !self.pending_patches.is_empty() {
            debug!(
                "{} reference fields wait for their targets",
                self.pending_reference_count()
            );
        }
        Ok(inserted)
    }

    fn reload_file(&self, id: &Value, handle: DocumentHandle) -> PersistResult<()> {
        let record = self
            .store
            .find_one(&id_filter(id.clone()), &[])?
            .ok_or_else(|| PersistError::stale_reference(&self.metadata.collection, display_id(id)))?;
        self.context.hydrator.refresh(handle, &self.metadata, record)
    }

    /// Writes the reference fields that were left out of earlier inserts.
    ///
    /// Each owner gets one `$set` update with its pending fields, encoded
    /// again now that the targets have identifiers. An owner's patches are
    /// dropped once its update succeeds; on failure the failing owner and
    /// everything after it stay pending.
    ///
    /// # Errors
    ///
    /// Returns an error if an owner has no identifier, a field fails to
    /// encode, or the store rejects the update.
    pub fn execute_reference_updates(&mut self) -> PersistResult<()> {
        while let Some((&owner, patches)) = self.pending_patches.first_key_value() {
            let serializer = self.serializer();
            let mut update = UpdateDocument::new();
            for patch in patches {
                update.set(
                    patch.mapping.name.as_str(),
                    serializer.encode(&patch.mapping, &patch.value)?,
                );
            }

            let filter = id_filter(self.stored_identifier(owner)?);
            debug!(
                collection = %self.metadata.collection,
                "patching {} references of {owner}",
                patches.len()
            );
            self.store.update(&filter, &update.to_document())?;
            self.pending_patches.remove(&owner);
        }
        Ok(())
    }
}
