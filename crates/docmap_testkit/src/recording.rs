//! Store drivers for observing and failing store calls.

use docmap_codec::{Document, Value};
use docmap_core::{StoreCursor, StoreDriver, StoreError, StoreResult};
use parking_lot::Mutex;
use std::sync::Arc;

/// One call made to a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    /// A batch insert of this many records.
    BatchInsert(usize),
    /// An update with its filter and operator document.
    Update {
        /// Selects the record.
        filter: Document,
        /// Operator document.
        update: Document,
    },
    /// A remove with its filter.
    Remove(Document),
    /// A single-record query.
    FindOne(Document),
    /// A multi-record query.
    Find(Document),
}

/// Wraps a driver and logs every call before forwarding it.
pub struct RecordingStore {
    inner: Arc<dyn StoreDriver>,
    calls: Mutex<Vec<StoreCall>>,
}

impl RecordingStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn StoreDriver>) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Returns every call so far, oldest first.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    /// Returns the operator documents of every update so far.
    pub fn updates(&self) -> Vec<Document> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                StoreCall::Update { update, .. } => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forgets the logged calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().push(call);
    }
}

impl StoreDriver for RecordingStore {
    fn batch_insert(&self, records: Vec<Document>) -> StoreResult<Vec<Value>> {
        self.record(StoreCall::BatchInsert(records.len()));
        self.inner.batch_insert(records)
    }

    fn update(&self, filter: &Document, update: &Document) -> StoreResult<u64> {
        self.record(StoreCall::Update {
            filter: filter.clone(),
            update: update.clone(),
        });
        self.inner.update(filter, update)
    }

    fn remove(&self, filter: &Document) -> StoreResult<u64> {
        self.record(StoreCall::Remove(filter.clone()));
        self.inner.remove(filter)
    }

    fn find_one(&self, filter: &Document, projection: &[&str]) -> StoreResult<Option<Document>> {
        self.record(StoreCall::FindOne(filter.clone()));
        self.inner.find_one(filter, projection)
    }

    fn find(&self, filter: &Document, projection: &[&str]) -> StoreResult<Box<dyn StoreCursor>> {
        self.record(StoreCall::Find(filter.clone()));
        self.inner.find(filter, projection)
    }
}

/// A driver whose every call fails with [`StoreError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStore;

impl UnavailableStore {
    fn error() -> StoreError {
        StoreError::Unavailable {
            message: "store is offline".to_string(),
        }
    }
}

impl StoreDriver for UnavailableStore {
    fn batch_insert(&self, _records: Vec<Document>) -> StoreResult<Vec<Value>> {
        Err(Self::error())
    }

    fn update(&self, _filter: &Document, _update: &Document) -> StoreResult<u64> {
        Err(Self::error())
    }

    fn remove(&self, _filter: &Document) -> StoreResult<u64> {
        Err(Self::error())
    }

    fn find_one(&self, _filter: &Document, _projection: &[&str]) -> StoreResult<Option<Document>> {
        Err(Self::error())
    }

    fn find(&self, _filter: &Document, _projection: &[&str]) -> StoreResult<Box<dyn StoreCursor>> {
        Err(Self::error())
    }
}
