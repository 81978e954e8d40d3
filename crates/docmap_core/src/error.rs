//! Error types for docmap core.

use crate::handle::DocumentHandle;
use crate::store::StoreError;
use docmap_codec::CodecError;
use thiserror::Error;

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// Errors that can occur while preparing or executing persistence
/// operations.
///
/// Store failures are wrapped unmodified in [`PersistError::Store`]; the
/// persister never retries them.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The store driver reported a failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A refresh found the stored record gone.
    #[error("stale reference: document {id} no longer exists in {collection}")]
    StaleReference {
        /// Collection that was searched.
        collection: String,
        /// Identifier that was not found.
        id: String,
    },

    /// A value has a shape its mapping cannot encode.
    #[error("mapping inconsistency: {message}")]
    MappingInconsistency {
        /// Description of the inconsistency.
        message: String,
    },

    /// No metadata is registered for a document type.
    #[error("unknown document type: {type_name}")]
    UnknownDocumentType {
        /// The type that was looked up.
        type_name: String,
    },

    /// No converter is registered for a scalar type.
    #[error("unknown field type: {type_name}")]
    UnknownType {
        /// The scalar type name that was looked up.
        type_name: String,
    },

    /// A scalar converter rejected the value it was given.
    #[error("cannot convert {found} to {type_name}")]
    ConversionFailed {
        /// The target scalar type.
        type_name: String,
        /// The kind of value that was given.
        found: &'static str,
    },

    /// The change tracker does not know a handle.
    #[error("unknown document handle {handle}")]
    UnknownDocument {
        /// The handle that was looked up.
        handle: DocumentHandle,
    },

    /// An update or delete was requested for a document without identifier.
    #[error("document of type {type_name} has no identifier")]
    MissingIdentifier {
        /// Type of the document.
        type_name: String,
    },

    /// An embedded document graph refers back to a document being embedded.
    #[error("embedded document cycle through {type_name}")]
    EmbeddedCycle {
        /// Type of the document that closed the cycle.
        type_name: String,
    },

    /// Embedded documents nest deeper than configured.
    #[error("embedded documents nest deeper than {depth} levels")]
    EmbeddingTooDeep {
        /// The configured maximum depth.
        depth: usize,
    },

    /// An integer increment does not fit in 64 bits.
    #[error("increment of field {field} overflows")]
    IncrementOverflow {
        /// The increment field.
        field: String,
    },

    /// Metadata could not be parsed.
    #[error("invalid metadata: {message}")]
    InvalidMetadata {
        /// Description of the parse failure.
        message: String,
    },
}

impl PersistError {
    /// Creates a mapping inconsistency error.
    pub fn mapping_inconsistency(message: impl Into<String>) -> Self {
        Self::MappingInconsistency {
            message: message.into(),
        }
    }

    /// Creates an unknown document type error.
    pub fn unknown_document_type(type_name: impl Into<String>) -> Self {
        Self::UnknownDocumentType {
            type_name: type_name.into(),
        }
    }

    /// Creates an unknown field type error.
    pub fn unknown_type(type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            type_name: type_name.into(),
        }
    }

    /// Creates a conversion failure error.
    pub fn conversion_failed(type_name: impl Into<String>, found: &'static str) -> Self {
        Self::ConversionFailed {
            type_name: type_name.into(),
            found,
        }
    }

    /// Creates a missing identifier error.
    pub fn missing_identifier(type_name: impl Into<String>) -> Self {
        Self::MissingIdentifier {
            type_name: type_name.into(),
        }
    }

    /// Creates a stale reference error.
    pub fn stale_reference(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::StaleReference {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates an invalid metadata error.
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_metadata(err.to_string())
    }
}
