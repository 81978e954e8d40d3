//! Store driver trait definition.

use crate::store::error::{StoreError, StoreResult};
use docmap_codec::{Document, Value};

/// Key under which every record stores its identifier.
pub const ID_KEY: &str = "_id";

/// A single collection of a document store.
///
/// Drivers speak the store's native record format: [`Document`]s whose
/// values went through the scalar converters. They know nothing about
/// metadata, handles or change tracking.
///
/// # Invariants
///
/// - `batch_insert` returns one identifier per record, in record order
/// - records without `_id` get one assigned by the store
/// - `update` applies `$set`, `$unset`, `$inc`, `$pushAll` and `$pullAll`
///   to the first matching record
/// - drivers must be `Send + Sync`
pub trait StoreDriver: Send + Sync {
    /// Inserts all records in one call and returns their identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if any record is rejected. Whether earlier records
    /// of the batch were kept is driver-defined.
    fn batch_insert(&self, records: Vec<Document>) -> StoreResult<Vec<Value>>;

    /// Applies an operator document to the first record matching `filter`.
    ///
    /// Returns the number of records modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the update document is malformed or cannot be
    /// applied to the matched record.
    fn update(&self, filter: &Document, update: &Document) -> StoreResult<u64>;

    /// Removes every record matching `filter` and returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn remove(&self, filter: &Document) -> StoreResult<u64>;

    /// Returns the first record matching `filter`.
    ///
    /// An empty `projection` returns every field; otherwise only `_id` and
    /// the listed fields are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or a record is
    /// corrupt.
    fn find_one(&self, filter: &Document, projection: &[&str]) -> StoreResult<Option<Document>>;

    /// Returns a cursor over every record matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    fn find(&self, filter: &Document, projection: &[&str]) -> StoreResult<Box<dyn StoreCursor>>;
}

/// A lazily consumed query result.
pub trait StoreCursor: Send {
    /// Returns the next record, or `None` when the cursor is exhausted.
    fn next_record(&mut self) -> Option<StoreResult<Document>>;

    /// Moves the cursor back to its first record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotRestartable`] unless the driver supports
    /// rewinding.
    fn rewind(&mut self) -> StoreResult<()> {
        Err(StoreError::NotRestartable)
    }
}
