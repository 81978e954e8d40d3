//! In-memory field values of managed documents.

use crate::handle::DocumentHandle;
use docmap_codec::Value;

/// The value a managed document holds for one field.
///
/// Associations point at other managed documents through their handle.
/// Everything else is a raw [`Value`] that still has to go through the
/// field's scalar converter before it is stored.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropertyValue {
    /// No value.
    #[default]
    Null,
    /// A raw value.
    Scalar(Value),
    /// Another managed document.
    Object(DocumentHandle),
    /// An ordered collection of values.
    List(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Returns true for `Null` and for a scalar null.
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null | PropertyValue::Scalar(Value::Null))
    }

    /// Returns the handle if this is a managed document.
    pub fn as_handle(&self) -> Option<DocumentHandle> {
        match self {
            PropertyValue::Object(handle) => Some(*handle),
            _ => None,
        }
    }

    /// Converts to a raw value.
    ///
    /// Lists become arrays. Returns `None` if a managed document appears
    /// anywhere in the value.
    pub fn to_raw(&self) -> Option<Value> {
        match self {
            PropertyValue::Null => Some(Value::Null),
            PropertyValue::Scalar(value) => Some(value.clone()),
            PropertyValue::Object(_) => None,
            PropertyValue::List(items) => items
                .iter()
                .map(PropertyValue::to_raw)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
        }
    }
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => PropertyValue::Null,
            other => PropertyValue::Scalar(other),
        }
    }
}

impl From<DocumentHandle> for PropertyValue {
    fn from(handle: DocumentHandle) -> Self {
        PropertyValue::Object(handle)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(items: Vec<PropertyValue>) -> Self {
        PropertyValue::List(items)
    }
}

impl From<Vec<DocumentHandle>> for PropertyValue {
    fn from(handles: Vec<DocumentHandle>) -> Self {
        PropertyValue::List(handles.into_iter().map(PropertyValue::Object).collect())
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Scalar(Value::from(s))
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Scalar(Value::Integer(n))
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Scalar(Value::Float(f))
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Scalar(Value::Bool(b))
    }
}
