//! Interfaces to the unit of work that owns managed documents.
//!
//! The persister never holds documents itself. It asks the change tracker
//! what a handle refers to and what changed, and hands stored records to
//! the hydrator to turn them back into managed documents.

use crate::changeset::ChangeSet;
use crate::error::PersistResult;
use crate::handle::DocumentHandle;
use crate::mapping::ClassMetadata;
use crate::operator::UpdateDocument;
use crate::property::PropertyValue;
use docmap_codec::{Document, Value};

/// Read access to managed documents and their pending changes.
pub trait ChangeTracker: Send + Sync {
    /// Returns the type name of a managed document.
    fn document_type(&self, handle: DocumentHandle) -> Option<String>;

    /// Returns the identifier of a managed document, in the form the
    /// document holds it. `None` until the document has been inserted.
    fn document_identifier(&self, handle: DocumentHandle) -> Option<Value>;

    /// Returns the current value of a field.
    fn property(&self, handle: DocumentHandle, field: &str) -> PropertyValue;

    /// Returns the changes since the last flush.
    fn change_set(&self, handle: DocumentHandle) -> ChangeSet;
}

/// Turns stored records into managed documents.
///
/// Implementations keep an identity map: hydrating a record whose
/// identifier is already managed returns the existing handle.
pub trait Hydrator: Send + Sync {
    /// Returns the managed document for a stored record.
    fn hydrate(&self, metadata: &ClassMetadata, record: Document) -> PersistResult<DocumentHandle>;

    /// Overwrites a managed document with a freshly read record.
    fn refresh(
        &self,
        handle: DocumentHandle,
        metadata: &ClassMetadata,
        record: Document,
    ) -> PersistResult<()>;
}

/// Observer notified with each prepared update before it is sent.
pub trait UpdateListener: Send + Sync {
    /// Called once per update, before the split rule is applied.
    fn pre_update(&self, handle: DocumentHandle, metadata: &ClassMetadata, update: &UpdateDocument);
}
