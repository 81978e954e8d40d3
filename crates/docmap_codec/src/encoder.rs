//! Canonical CBOR encoder.

use crate::document::Document;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::cmp::Ordering;

/// CBOR tag wrapping the 16 bytes of an object ID.
pub(crate) const OBJECT_ID_TAG: u64 = 37;

const NULL: u8 = 0xf6;
const FALSE: u8 = 0xf4;
const TRUE: u8 = 0xf5;
const DOUBLE: u8 = 0xfb;

/// CBOR major types written by the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Major {
    Unsigned = 0,
    Negative = 1,
    Bytes = 2,
    Text = 3,
    Array = 4,
    Map = 5,
    Tag = 6,
}

/// Encode a value to canonical CBOR bytes.
///
/// Map keys are written in length-first, then bytewise order, integers in
/// their shortest form, floats always as doubles. The output of equal
/// values is byte-identical, which the memory store relies on when it
/// compares identifiers.
///
/// # Errors
///
/// Returns [`CodecError::NaNForbidden`] if a float anywhere in the value is
/// NaN.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Appends canonical CBOR to an owned buffer.
#[derive(Debug, Default)]
pub struct CanonicalEncoder {
    out: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an encoder whose buffer holds `capacity` bytes up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
        }
    }

    /// Append one value.
    ///
    /// On error the buffer may hold a partial encoding.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.out.push(NULL),
            Value::Bool(flag) => self.out.push(if *flag { TRUE } else { FALSE }),
            Value::Integer(n) => self.write_integer(*n),
            Value::Float(f) => {
                if f.is_nan() {
                    return Err(CodecError::NaNForbidden);
                }
                self.out.push(DOUBLE);
                self.out.extend_from_slice(&f.to_be_bytes());
            }
            Value::Bytes(bytes) => self.write_string(Major::Bytes, bytes),
            Value::Text(text) => self.write_string(Major::Text, text.as_bytes()),
            Value::ObjectId(id) => {
                self.write_head(Major::Tag, OBJECT_ID_TAG);
                self.write_string(Major::Bytes, id.as_bytes());
            }
            Value::Array(items) => {
                self.write_len(Major::Array, items.len());
                for item in items {
                    self.encode(item)?;
                }
            }
            Value::Map(doc) => self.write_document(doc)?,
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.out
    }

    fn write_integer(&mut self, n: i64) {
        match u64::try_from(n) {
            Ok(unsigned) => self.write_head(Major::Unsigned, unsigned),
            // -1 - n never overflows for negative n and is non-negative
            Err(_) => self.write_head(Major::Negative, (-1 - n).unsigned_abs()),
        }
    }

    fn write_string(&mut self, major: Major, bytes: &[u8]) {
        self.write_len(major, bytes.len());
        self.out.extend_from_slice(bytes);
    }

    fn write_len(&mut self, major: Major, len: usize) {
        // usize is at most 64 bits on every supported target
        self.write_head(major, len as u64);
    }

    fn write_head(&mut self, major: Major, argument: u64) {
        let high = (major as u8) << 5;
        if let Ok(small) = u8::try_from(argument) {
            if small < 24 {
                self.out.push(high | small);
            } else {
                self.out.extend_from_slice(&[high | 24, small]);
            }
        } else if let Ok(short) = u16::try_from(argument) {
            self.out.push(high | 25);
            self.out.extend_from_slice(&short.to_be_bytes());
        } else if let Ok(word) = u32::try_from(argument) {
            self.out.push(high | 26);
            self.out.extend_from_slice(&word.to_be_bytes());
        } else {
            self.out.push(high | 27);
            self.out.extend_from_slice(&argument.to_be_bytes());
        }
    }

    fn write_document(&mut self, doc: &Document) -> CodecResult<()> {
        let mut entries: Vec<(&str, &Value)> = doc.iter().collect();
        entries.sort_by(|(a, _), (b, _)| canonical_key_order(a, b));

        self.write_len(Major::Map, entries.len());
        for (key, value) in entries {
            self.write_string(Major::Text, key.as_bytes());
            self.encode(value)?;
        }
        Ok(())
    }
}

/// Order of text keys in a canonical map: shorter keys first, then
/// bytewise.
pub(crate) fn canonical_key_order(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.as_bytes().cmp(b.as_bytes()))
}
