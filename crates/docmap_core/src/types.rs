//! Scalar type converters.
//!
//! Every scalar field names a type. Before a value is written it is passed
//! through that type's converter, which normalizes it to the form the
//! store expects (for example hex identifiers become [`ObjectId`]s).

use crate::error::{PersistError, PersistResult};
use docmap_codec::{Document, ObjectId, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Converts an in-memory scalar to its stored form.
pub type Converter = Arc<dyn Fn(&Value) -> PersistResult<Value> + Send + Sync>;

/// Scalar converters by type name.
///
/// [`TypeRegistry::default`] knows the built-in types:
///
/// | Name | Stored as |
/// |---|---|
/// | `string` | text |
/// | `int` | integer |
/// | `float` | float |
/// | `boolean` | bool |
/// | `date` | integer milliseconds since the epoch |
/// | `bin`, `file` | bytes |
/// | `id` | object ID |
/// | `custom_id` | unchanged |
/// | `hash` | document |
/// | `collection` | array |
#[derive(Clone)]
pub struct TypeRegistry {
    converters: HashMap<String, Converter>,
}

impl TypeRegistry {
    /// Creates a registry with the built-in types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry without any types.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Registers a converter, replacing any existing one of the same name.
    pub fn register<F>(&mut self, type_name: impl Into<String>, converter: F)
    where
        F: Fn(&Value) -> PersistResult<Value> + Send + Sync + 'static,
    {
        self.converters.insert(type_name.into(), Arc::new(converter));
    }

    /// Returns true if a converter is registered for `type_name`.
    pub fn contains(&self, type_name: &str) -> bool {
        self.converters.contains_key(type_name)
    }

    /// Converts a value with the converter of `type_name`.
    ///
    /// Null converts to null for every type.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::UnknownType`] if no converter is registered,
    /// or the converter's error if it rejects the value.
    pub fn convert(&self, type_name: &str, value: &Value) -> PersistResult<Value> {
        let converter = self
            .converters
            .get(type_name)
            .ok_or_else(|| PersistError::unknown_type(type_name))?;
        if value.is_null() {
            return Ok(Value::Null);
        }
        converter(value)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("string", convert_string);
        registry.register("int", convert_int);
        registry.register("float", convert_float);
        registry.register("boolean", convert_boolean);
        registry.register("date", convert_date);
        registry.register("bin", convert_bytes);
        registry.register("file", convert_bytes);
        registry.register("id", convert_id);
        registry.register("custom_id", |v: &Value| Ok(v.clone()));
        registry.register("hash", convert_hash);
        registry.register("collection", convert_collection);
        registry
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.converters.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

fn convert_string(value: &Value) -> PersistResult<Value> {
    let text = match value {
        Value::Text(s) => s.clone(),
        Value::Integer(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::ObjectId(id) => id.to_hex(),
        other => return Err(PersistError::conversion_failed("string", other.type_name())),
    };
    Ok(Value::Text(text))
}

/// 2^63, the first float past `i64::MAX`.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Truncates toward zero, or `None` if the result is not an i64.
fn truncate_float(f: f64) -> Option<i64> {
    let whole = f.trunc();
    if !(-I64_LIMIT..I64_LIMIT).contains(&whole) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let n = whole as i64;
    Some(n)
}

fn convert_int(value: &Value) -> PersistResult<Value> {
    match value {
        Value::Integer(n) => Ok(Value::Integer(*n)),
        Value::Float(f) => truncate_float(*f)
            .map(Value::Integer)
            .ok_or_else(|| PersistError::conversion_failed("int", "float")),
        Value::Bool(b) => Ok(Value::Integer(i64::from(*b))),
        Value::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| PersistError::conversion_failed("int", "text")),
        other => Err(PersistError::conversion_failed("int", other.type_name())),
    }
}

fn convert_float(value: &Value) -> PersistResult<Value> {
    match value {
        Value::Float(_) | Value::Integer(_) => Ok(Value::Float(value.as_float().unwrap_or_default())),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| PersistError::conversion_failed("float", "text")),
        other => Err(PersistError::conversion_failed("float", other.type_name())),
    }
}

fn convert_boolean(value: &Value) -> PersistResult<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Integer(n) => Ok(Value::Bool(*n != 0)),
        other => Err(PersistError::conversion_failed("boolean", other.type_name())),
    }
}

fn convert_date(value: &Value) -> PersistResult<Value> {
    match value {
        Value::Integer(ms) => Ok(Value::Integer(*ms)),
        Value::Float(f) => truncate_float(*f)
            .map(Value::Integer)
            .ok_or_else(|| PersistError::conversion_failed("date", "float")),
        other => Err(PersistError::conversion_failed("date", other.type_name())),
    }
}

fn convert_bytes(value: &Value) -> PersistResult<Value> {
    match value {
        Value::Bytes(b) => Ok(Value::Bytes(b.clone())),
        Value::Text(s) => Ok(Value::Bytes(s.as_bytes().to_vec())),
        other => Err(PersistError::conversion_failed("bin", other.type_name())),
    }
}

fn convert_id(value: &Value) -> PersistResult<Value> {
    match value {
        Value::ObjectId(id) => Ok(Value::ObjectId(*id)),
        Value::Text(s) => ObjectId::parse_hex(s)
            .map(Value::ObjectId)
            .ok_or_else(|| PersistError::conversion_failed("id", "text")),
        other => Err(PersistError::conversion_failed("id", other.type_name())),
    }
}

fn convert_hash(value: &Value) -> PersistResult<Value> {
    match value {
        Value::Map(doc) => Ok(Value::Map(doc.clone())),
        Value::Array(items) => Ok(Value::Map(
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect::<Document>(),
        )),
        other => Err(PersistError::conversion_failed("hash", other.type_name())),
    }
}

fn convert_collection(value: &Value) -> PersistResult<Value> {
    match value {
        Value::Array(items) => Ok(Value::Array(items.clone())),
        Value::Map(doc) => Ok(Value::Array(doc.iter().map(|(_, v)| v.clone()).collect())),
        other => Ok(Value::Array(vec![other.clone()])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_types_are_registered() {
        let types = TypeRegistry::default();
        for name in ["string", "int", "float", "boolean", "date", "bin", "id", "hash", "collection"] {
            assert!(types.contains(name), "{name} missing");
        }
    }

    #[test]
    fn unknown_type_is_an_error() {
        let types = TypeRegistry::default();
        assert!(matches!(
            types.convert("money", &Value::Integer(1)),
            Err(PersistError::UnknownType { .. })
        ));
    }

    #[test]
    fn null_converts_to_null() {
        let types = TypeRegistry::default();
        assert_eq!(types.convert("int", &Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn scalar_conversions() {
        let types = TypeRegistry::default();
        assert_eq!(
            types.convert("string", &Value::Integer(5)).unwrap(),
            Value::from("5")
        );
        assert_eq!(
            types.convert("int", &Value::from(" 42 ")).unwrap(),
            Value::Integer(42)
        );
        assert_eq!(
            types.convert("int", &Value::Float(3.9)).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            types.convert("float", &Value::Integer(2)).unwrap(),
            Value::Float(2.0)
        );
        assert_eq!(
            types.convert("boolean", &Value::Integer(0)).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn floats_outside_i64_are_rejected() {
        let types = TypeRegistry::default();
        for name in ["int", "date"] {
            for f in [1e20, -1e20, 9_223_372_036_854_775_808.0, f64::INFINITY, f64::NAN] {
                assert!(
                    matches!(
                        types.convert(name, &Value::Float(f)),
                        Err(PersistError::ConversionFailed { .. })
                    ),
                    "{name} accepted {f}"
                );
            }
        }
        assert_eq!(
            types.convert("date", &Value::Float(-9_223_372_036_854_775_808.0)).unwrap(),
            Value::Integer(i64::MIN)
        );
        assert_eq!(
            types.convert("int", &Value::Float(-2.7)).unwrap(),
            Value::Integer(-2)
        );
    }

    #[test]
    fn id_conversion() {
        let types = TypeRegistry::default();
        let oid = ObjectId::new();
        assert_eq!(
            types.convert("id", &Value::Text(oid.to_hex())).unwrap(),
            Value::ObjectId(oid)
        );
        assert!(matches!(
            types.convert("id", &Value::from("nope")),
            Err(PersistError::ConversionFailed { .. })
        ));
    }

    #[test]
    fn collection_and_hash() {
        let types = TypeRegistry::default();
        let arr = Value::Array(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(types.convert("collection", &arr).unwrap(), arr);

        let hash = types.convert("hash", &arr).unwrap();
        assert_eq!(hash.get("1"), Some(&Value::Integer(2)));
    }

    #[test]
    fn custom_converter() {
        let mut types = TypeRegistry::empty();
        types.register("upper", |v: &Value| {
            Ok(Value::Text(v.as_text().unwrap_or_default().to_uppercase()))
        });
        assert_eq!(
            types.convert("upper", &Value::from("abc")).unwrap(),
            Value::from("ABC")
        );
    }
}
