//! # docmap Core
//!
//! Persistence engine that maps managed documents onto a document store.
//!
//! This crate provides:
//! - Type metadata ([`ClassMetadata`], [`FieldMapping`]) and the scalar
//!   [`TypeRegistry`]
//! - The [`Serializer`], which encodes field values, reference
//!   descriptors and embedded documents
//! - The translator from field changes to atomic update operators
//!   (`$set`, `$unset`, `$inc`, `$pushAll`, `$pullAll`)
//! - [`DocumentPersister`], which queues and batches inserts, defers
//!   references to unsaved documents, issues updates and deletes, and
//!   loads stored records back through a [`Hydrator`]
//! - The [`StoreDriver`] interface and an in-memory [`MemoryStore`]
//!
//! The unit of work that owns documents and tracks their changes is not
//! part of this crate; it is reached through [`ChangeTracker`] and
//! [`Hydrator`], and documents are named by [`DocumentHandle`]s.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod changeset;
mod config;
mod error;
mod handle;
mod mapping;
mod operator;
mod persister;
mod property;
mod serializer;
mod store;
mod translator;
mod types;
mod uow;

#[cfg(test)]
mod test_support;

pub use changeset::{ChangeSet, CollectionDiff, FieldChange};
pub use config::{PersisterConfig, DEFAULT_DISCRIMINATOR_FIELD};
pub use error::{PersistError, PersistResult};
pub use handle::{DocumentHandle, HandleAllocator};
pub use mapping::{
    ClassDiscriminator, ClassMetadata, DiscriminatorMap, FieldMapping, FieldRole,
    IdentifierStrategy, MetadataRegistry, StaticRegistry,
};
pub use operator::{Operator, UpdateDocument};
pub use persister::{DocumentCursor, DocumentPersister, PendingReferencePatch, PersistenceContext};
pub use property::PropertyValue;
pub use serializer::{has_unresolved_reference, Serializer, REF_DB_KEY, REF_ID_KEY, REF_KEY};
pub use store::{
    MemoryCollection, MemoryCursor, MemoryStore, StoreCursor, StoreDriver, StoreError,
    StoreResult, ID_KEY,
};
pub use translator::{array_diff, array_operators, translate_array_update, translate_update};
pub use types::{Converter, TypeRegistry};
pub use uow::{ChangeTracker, Hydrator, UpdateListener};

pub use docmap_codec::{Document, ObjectId, Value};
