//! Error types for store drivers.

use docmap_codec::CodecError;
use thiserror::Error;

/// Result type for store driver calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a store driver.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A record with the same `_id` already exists.
    #[error("duplicate key {id} in collection {collection}")]
    DuplicateKey {
        /// Collection the insert targeted.
        collection: String,
        /// The conflicting identifier.
        id: String,
    },

    /// The update document was rejected.
    #[error("invalid update: {message}")]
    InvalidUpdate {
        /// Why the update was rejected.
        message: String,
    },

    /// The cursor cannot be rewound.
    #[error("cursor is not restartable")]
    NotRestartable,

    /// The store cannot be reached.
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The store answered with something the caller did not expect.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the mismatch.
        message: String,
    },
}

impl StoreError {
    /// Creates an invalid update error.
    pub fn invalid_update(message: impl Into<String>) -> Self {
        Self::InvalidUpdate {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}
