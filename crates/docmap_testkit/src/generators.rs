//! Property-based test generators using proptest.
//!
//! Provides strategies for values that the codec and the memory store
//! accept: finite floats, text map keys, no operator-like field names.

use docmap_codec::{Document, ObjectId, Value};
use proptest::prelude::*;

/// Strategy for generating object IDs.
pub fn object_id_strategy() -> impl Strategy<Value = ObjectId> {
    prop::array::uniform16(any::<u8>()).prop_map(ObjectId::from_bytes)
}

/// Strategy for generating field names.
///
/// Never starts with `$` and never contains `.`, so names are valid both
/// as keys and as update paths.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating scalar values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e12f64..1.0e12).prop_map(Value::Float),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
        ".{0,24}".prop_map(Value::Text),
        object_id_strategy().prop_map(Value::ObjectId),
    ]
}

/// Strategy for generating values with nested arrays and documents.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((field_name_strategy(), inner), 0..4)
                .prop_map(|pairs| Value::Map(pairs.into_iter().collect())),
        ]
    })
}

/// Strategy for generating documents.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::vec((field_name_strategy(), value_strategy()), 0..6)
        .prop_map(|pairs| pairs.into_iter().collect())
}

/// Strategy for generating integer arrays with small, often repeated
/// elements, the shape array diffs are most interesting on.
pub fn int_array_strategy(max_len: usize) -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec((0i64..8).prop_map(Value::Integer), 0..max_len)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_codec::{from_cbor, to_canonical_cbor};
    use docmap_core::{array_diff, FieldMapping, MemoryStore, StoreDriver, ID_KEY};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn field_names_are_plain(name in field_name_strategy()) {
            prop_assert!(!name.starts_with('$'));
            prop_assert!(!name.contains('.'));
        }

        #[test]
        fn generated_documents_are_encodable(doc in document_strategy()) {
            let bytes = to_canonical_cbor(&Value::Map(doc.clone())).unwrap();
            prop_assert_eq!(from_cbor(&bytes).unwrap(), Value::Map(doc));
        }

        #[test]
        fn stored_arrays_follow_diff_operators(
            old in int_array_strategy(6),
            new in int_array_strategy(6),
        ) {
            let store = MemoryStore::new();
            let collection = store.collection("items");
            let ids = collection
                .batch_insert(vec![[("tags", Value::Array(old.clone()))].into_iter().collect()])
                .unwrap();
            let filter: Document = [(ID_KEY, ids[0].clone())].into_iter().collect();

            let mapping = FieldMapping::collection("tags");
            let mut update = docmap_core::translate_array_update(&mapping, &new, &old);
            if let Some(pulls) = update.split_conflicts() {
                collection.update(&filter, &pulls.to_document()).unwrap();
            }
            if !update.is_empty() {
                collection.update(&filter, &update.to_document()).unwrap();
            }

            let stored = collection.find_one(&filter, &[]).unwrap().unwrap();
            let tags = stored.get("tags").and_then(Value::as_array).unwrap_or_default();
            prop_assert!(array_diff(&new, tags).is_empty());
            prop_assert!(array_diff(tags, &new).is_empty());
        }
    }
}
