//! # docmap Codec
//!
//! Document value model and canonical CBOR encoding for docmap.
//!
//! This crate provides:
//! - [`Value`], the storage representation every mapped field is
//!   converted to, and [`Document`], its ordered string-keyed map
//! - [`ObjectId`], the identifier a store assigns to inserted documents
//! - Deterministic CBOR encoding so identical documents produce identical
//!   bytes regardless of field insertion order
//!
//! ## Canonical CBOR Rules
//!
//! - Map keys are text and sorted (length-first, then bytewise)
//! - Integers use shortest encoding
//! - Floats are always double precision, never NaN
//! - Object IDs are 16-byte strings under tag 37
//! - No indefinite-length items
//!
//! ## Usage
//!
//! ```
//! use docmap_codec::{from_cbor, to_canonical_cbor, Document, Value};
//!
//! let doc: Document = [("name", Value::from("Alice"))].into_iter().collect();
//! let bytes = to_canonical_cbor(&Value::Map(doc.clone())).unwrap();
//! let decoded = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded, Value::Map(doc));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod document;
mod encoder;
mod error;
mod object_id;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use document::Document;
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use object_id::ObjectId;
pub use value::Value;

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

impl Encode for Document {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(&Value::Map(self.clone()))
    }
}

impl Decode for Document {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        match from_cbor(bytes)? {
            Value::Map(doc) => Ok(doc),
            other => Err(CodecError::decoding_failed(format!(
                "expected document, found {}",
                other.type_name()
            ))),
        }
    }
}
