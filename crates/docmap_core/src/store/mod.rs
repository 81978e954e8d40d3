//! Store driver interface and the in-memory store.

mod driver;
mod error;
mod memory;

pub use driver::{StoreCursor, StoreDriver, ID_KEY};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCollection, MemoryCursor, MemoryStore};
