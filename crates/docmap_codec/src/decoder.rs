//! CBOR decoder for bytes written by the encoder.

use crate::document::Document;
use crate::encoder::OBJECT_ID_TAG;
use crate::error::{CodecError, CodecResult};
use crate::object_id::ObjectId;
use crate::value::Value;

/// Decode a value from CBOR bytes.
///
/// Reads what [`crate::to_canonical_cbor`] writes. Key order and head
/// widths are not checked; constructs the encoder never emits are
/// rejected.
///
/// # Errors
///
/// Returns an error if the input is truncated, has trailing bytes, holds
/// invalid UTF-8 or a non-text map key, or uses an unsupported construct.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::decoding_failed("trailing bytes after value"));
    }
    Ok(value)
}

/// Reads values one at a time from a byte slice.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::decoding_failed("integer exceeds i64 range"))
            }
            1 => {
                let n = self.decode_unsigned(additional_info)?;
                // -(n+1)
                i64::try_from(n)
                    .map(|n| Value::Integer(-n - 1))
                    .map_err(|_| CodecError::decoding_failed("integer exceeds i64 range"))
            }
            2 => self.decode_bytes(additional_info).map(Value::Bytes),
            3 => self.decode_text(additional_info).map(Value::Text),
            4 => self.decode_array(additional_info),
            5 => self.decode_map(additional_info),
            6 => self.decode_tagged(additional_info),
            _ => self.decode_simple(additional_info),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => self.read_byte().map(u64::from),
            25 => Ok(u64::from(u16::from_be_bytes(self.read_array()?))),
            26 => Ok(u64::from(u32::from_be_bytes(self.read_array()?))),
            27 => Ok(u64::from_be_bytes(self.read_array()?)),
            _ => Err(CodecError::unsupported_type("indefinite or reserved length")),
        }
    }

    fn decode_length(&mut self, additional_info: u8) -> CodecResult<usize> {
        let claimed = self.decode_unsigned(additional_info)?;
        usize::try_from(claimed).map_err(|_| CodecError::UnexpectedEof)
    }

    fn decode_bytes(&mut self, additional_info: u8) -> CodecResult<Vec<u8>> {
        let len = self.decode_length(additional_info)?;
        Ok(self.read_bytes(len)?.to_vec())
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<String> {
        let len = self.decode_length(additional_info)?;
        let bytes = self.read_bytes(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(text.to_string())
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info)?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_map(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info)?;
        let mut doc = Document::with_capacity(len.min(1024));
        for _ in 0..len {
            let initial_byte = self.read_byte()?;
            if initial_byte >> 5 != 3 {
                return Err(CodecError::invalid_structure("document keys must be text"));
            }
            let key = self.decode_text(initial_byte & 0x1f)?;
            let value = self.decode()?;
            doc.insert(key, value);
        }
        Ok(Value::Map(doc))
    }

    fn decode_tagged(&mut self, additional_info: u8) -> CodecResult<Value> {
        let tag = self.decode_unsigned(additional_info)?;
        if tag != OBJECT_ID_TAG {
            return Err(CodecError::unsupported_type(format!("tag {tag}")));
        }
        match self.decode()? {
            Value::Bytes(bytes) => ObjectId::from_slice(&bytes)
                .map(Value::ObjectId)
                .ok_or_else(|| CodecError::invalid_structure("object id must be 16 bytes")),
            other => Err(CodecError::invalid_structure(format!(
                "object id tag wraps {}",
                other.type_name()
            ))),
        }
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            27 => Ok(Value::Float(f64::from_be_bytes(self.read_array()?))),
            other => Err(CodecError::unsupported_type(format!("simple value {other}"))),
        }
    }
}
