//! Transient document handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque token naming one managed document within a unit of work.
///
/// Handles are issued by the unit of work when a document enters it and
/// are only meaningful within that scope. They stand in for object
/// identity: two handles are equal exactly when they name the same
/// managed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    /// Creates a handle from its raw token.
    #[must_use]
    pub const fn new(token: u64) -> Self {
        Self(token)
    }

    /// Returns the raw token.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Issues monotonically increasing handles.
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU64,
}

impl HandleAllocator {
    /// Creates an allocator whose first handle is `doc#1`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Issues the next handle.
    pub fn allocate(&self) -> DocumentHandle {
        DocumentHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}
