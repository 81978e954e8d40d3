//! In-memory store for testing.

use crate::mapping::ClassMetadata;
use crate::operator::Operator;
use crate::store::driver::{StoreCursor, StoreDriver, ID_KEY};
use crate::store::error::{StoreError, StoreResult};
use docmap_codec::{Decode, Document, Encode, ObjectId, Value};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

const FILE_KEY: &str = "file";
const LENGTH_KEY: &str = "length";
const SHA256_KEY: &str = "sha256";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectionKind {
    Documents,
    Files,
}

/// An in-memory database holding named collections.
///
/// Suitable for unit and integration tests. Collections are created on
/// first use and shared: asking twice for the same name returns the same
/// collection.
///
/// # Example
///
/// ```rust
/// use docmap_core::{MemoryStore, StoreDriver};
/// use docmap_codec::Document;
///
/// let store = MemoryStore::new();
/// let users = store.collection("users");
/// let ids = users.batch_insert(vec![Document::new()]).unwrap();
/// assert_eq!(ids.len(), 1);
/// assert_eq!(users.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Arc<MemoryCollection>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the document collection `name`, creating it if needed.
    pub fn collection(&self, name: &str) -> Arc<MemoryCollection> {
        self.open(name, CollectionKind::Documents)
    }

    /// Returns the file bucket `name`, creating it if needed.
    ///
    /// File buckets describe the `file` field of every inserted record
    /// with its `length` and hex `sha256`.
    pub fn file_bucket(&self, name: &str) -> Arc<MemoryCollection> {
        self.open(&format!("{name}.files"), CollectionKind::Files)
    }

    /// Returns the collection or file bucket that stores documents of
    /// `metadata`'s type.
    pub fn driver_for(&self, metadata: &ClassMetadata) -> Arc<MemoryCollection> {
        if metadata.file {
            self.file_bucket(&metadata.collection)
        } else {
            self.collection(&metadata.collection)
        }
    }

    /// Returns the names of all collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn open(&self, name: &str, kind: CollectionKind) -> Arc<MemoryCollection> {
        if let Some(collection) = self.collections.read().get(name) {
            return Arc::clone(collection);
        }
        let mut collections = self.collections.write();
        Arc::clone(
            collections
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(MemoryCollection::new(name, kind))),
        )
    }
}

#[derive(Debug, Clone)]
struct StoredRecord {
    id: Value,
    bytes: Vec<u8>,
}

/// One in-memory collection.
///
/// Records are kept as canonical CBOR in insertion order and decoded on
/// every read, so what comes back is exactly what a real store would have
/// round-tripped.
#[derive(Debug)]
pub struct MemoryCollection {
    name: String,
    kind: CollectionKind,
    records: RwLock<Vec<StoredRecord>>,
}

impl MemoryCollection {
    fn new(name: &str, kind: CollectionKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            records: RwLock::new(Vec::new()),
        }
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this is a file bucket.
    pub fn is_file_bucket(&self) -> bool {
        self.kind == CollectionKind::Files
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Decodes and returns every record in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored record fails to decode.
    pub fn records(&self) -> StoreResult<Vec<Document>> {
        self.records
            .read()
            .iter()
            .map(|slot| Document::decode(&slot.bytes).map_err(StoreError::from))
            .collect()
    }
}

impl StoreDriver for MemoryCollection {
    fn batch_insert(&self, records: Vec<Document>) -> StoreResult<Vec<Value>> {
        let mut prepared = Vec::with_capacity(records.len());
        for mut record in records {
            let id = match record.get(ID_KEY) {
                Some(id) if !id.is_null() => id.clone(),
                _ => {
                    let id = Value::ObjectId(ObjectId::new());
                    record.insert(ID_KEY, id.clone());
                    id
                }
            };
            if self.is_file_bucket() {
                describe_file(&mut record);
            }
            let bytes = record.encode()?;
            prepared.push(StoredRecord { id, bytes });
        }

        let mut stored = self.records.write();
        for (i, candidate) in prepared.iter().enumerate() {
            let taken = stored.iter().any(|slot| slot.id == candidate.id)
                || prepared[..i].iter().any(|slot| slot.id == candidate.id);
            if taken {
                return Err(StoreError::DuplicateKey {
                    collection: self.name.clone(),
                    id: describe_id(&candidate.id),
                });
            }
        }

        let ids = prepared.iter().map(|slot| slot.id.clone()).collect();
        stored.extend(prepared);
        Ok(ids)
    }

    fn update(&self, filter: &Document, update: &Document) -> StoreResult<u64> {
        let operations = parse_update(update)?;
        let mut stored = self.records.write();
        for slot in stored.iter_mut() {
            let mut record = Document::decode(&slot.bytes)?;
            if !matches_filter(&record, filter) {
                continue;
            }
            apply_operations(&mut record, &operations)?;
            slot.bytes = record.encode()?;
            return Ok(1);
        }
        Ok(0)
    }

    fn remove(&self, filter: &Document) -> StoreResult<u64> {
        let mut stored = self.records.write();
        let matched = stored
            .iter()
            .map(|slot| Document::decode(&slot.bytes).map(|record| matches_filter(&record, filter)))
            .collect::<Result<Vec<bool>, _>>()?;

        let removed = matched.iter().filter(|hit| **hit).count() as u64;
        let mut flags = matched.into_iter();
        stored.retain(|_| !flags.next().unwrap_or(false));
        Ok(removed)
    }

    fn find_one(&self, filter: &Document, projection: &[&str]) -> StoreResult<Option<Document>> {
        for slot in self.records.read().iter() {
            let record = Document::decode(&slot.bytes)?;
            if matches_filter(&record, filter) {
                return Ok(Some(project(record, projection)));
            }
        }
        Ok(None)
    }

    fn find(&self, filter: &Document, projection: &[&str]) -> StoreResult<Box<dyn StoreCursor>> {
        let snapshot = self
            .records
            .read()
            .iter()
            .map(|slot| slot.bytes.clone())
            .collect();
        Ok(Box::new(MemoryCursor {
            records: snapshot,
            filter: filter.clone(),
            projection: projection.iter().map(|field| (*field).to_string()).collect(),
            position: 0,
        }))
    }
}

/// Cursor over a snapshot of a [`MemoryCollection`].
///
/// Records are decoded and filtered as the cursor advances. The cursor can
/// be rewound any number of times.
#[derive(Debug)]
pub struct MemoryCursor {
    records: Vec<Vec<u8>>,
    filter: Document,
    projection: Vec<String>,
    position: usize,
}

impl StoreCursor for MemoryCursor {
    fn next_record(&mut self) -> Option<StoreResult<Document>> {
        while let Some(bytes) = self.records.get(self.position) {
            self.position += 1;
            let record = match Document::decode(bytes) {
                Ok(record) => record,
                Err(err) => return Some(Err(err.into())),
            };
            if matches_filter(&record, &self.filter) {
                let projection: Vec<&str> = self.projection.iter().map(String::as_str).collect();
                return Some(Ok(project(record, &projection)));
            }
        }
        None
    }

    fn rewind(&mut self) -> StoreResult<()> {
        self.position = 0;
        Ok(())
    }
}

fn describe_id(id: &Value) -> String {
    match id {
        Value::ObjectId(oid) => oid.to_hex(),
        Value::Text(text) => text.clone(),
        Value::Integer(n) => n.to_string(),
        other => format!("{other:?}"),
    }
}

fn describe_file(record: &mut Document) {
    let Some(Value::Bytes(data)) = record.get(FILE_KEY) else {
        return;
    };
    let length = i64::try_from(data.len()).unwrap_or(i64::MAX);
    let digest: String = Sha256::digest(data)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect();
    record.insert(LENGTH_KEY, length);
    record.insert(SHA256_KEY, digest);
}

fn parse_update(update: &Document) -> StoreResult<Vec<(Operator, &Document)>> {
    let mut operations = Vec::with_capacity(update.len());
    for (name, fields) in update.iter() {
        let op = Operator::parse(name)
            .ok_or_else(|| StoreError::invalid_update(format!("unknown operator {name}")))?;
        let fields = fields
            .as_document()
            .ok_or_else(|| StoreError::invalid_update(format!("{name} expects a document")))?;
        if fields.contains_key(ID_KEY) {
            return Err(StoreError::invalid_update(format!(
                "{name} cannot modify {ID_KEY}"
            )));
        }
        operations.push((op, fields));
    }
    if operations.is_empty() {
        return Err(StoreError::invalid_update("empty update document"));
    }

    let fields_of = |wanted: Operator| {
        operations
            .iter()
            .find(|(op, _)| *op == wanted)
            .map(|(_, fields)| *fields)
    };
    if let (Some(pushed), Some(pulled)) = (fields_of(Operator::PushAll), fields_of(Operator::PullAll)) {
        if let Some(field) = pulled.keys().find(|field| pushed.contains_key(field)) {
            return Err(StoreError::invalid_update(format!(
                "field {field} is both pushed and pulled"
            )));
        }
    }
    Ok(operations)
}

fn apply_operations(record: &mut Document, operations: &[(Operator, &Document)]) -> StoreResult<()> {
    for (op, fields) in operations {
        for (field, value) in fields.iter() {
            match op {
                Operator::Set => set_path(record, field, value.clone())?,
                Operator::Unset => remove_path(record, field),
                Operator::Inc => {
                    let current = lookup_path(record, field).cloned().unwrap_or(Value::Null);
                    let sum = add_numbers(field, &current, value)?;
                    set_path(record, field, sum)?;
                }
                Operator::PushAll => {
                    let items = array_argument(*op, field, value)?;
                    let mut array = match lookup_path(record, field) {
                        None | Some(Value::Null) => Vec::new(),
                        Some(Value::Array(existing)) => existing.clone(),
                        Some(_) => return Err(not_an_array(*op, field)),
                    };
                    array.extend(items.iter().cloned());
                    set_path(record, field, Value::Array(array))?;
                }
                Operator::PullAll => {
                    let items = array_argument(*op, field, value)?;
                    let kept = match lookup_path(record, field) {
                        None | Some(Value::Null) => None,
                        Some(Value::Array(existing)) => Some(
                            existing
                                .iter()
                                .filter(|element| !items.contains(element))
                                .cloned()
                                .collect::<Vec<_>>(),
                        ),
                        Some(_) => return Err(not_an_array(*op, field)),
                    };
                    if let Some(kept) = kept {
                        set_path(record, field, Value::Array(kept))?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn array_argument<'a>(op: Operator, field: &str, value: &'a Value) -> StoreResult<&'a [Value]> {
    value
        .as_array()
        .ok_or_else(|| StoreError::invalid_update(format!("{op} of {field} expects an array")))
}

fn not_an_array(op: Operator, field: &str) -> StoreError {
    StoreError::invalid_update(format!("{op}: field {field} is not an array"))
}

fn add_numbers(field: &str, current: &Value, delta: &Value) -> StoreResult<Value> {
    if let (Value::Null | Value::Integer(_), Value::Integer(delta)) = (current, delta) {
        return current
            .as_integer()
            .unwrap_or(0)
            .checked_add(*delta)
            .map(Value::Integer)
            .ok_or_else(|| StoreError::invalid_update(format!("increment of {field} overflows")));
    }
    let base = match current {
        Value::Null => Some(0.0),
        other => other.as_float(),
    };
    match (base, delta.as_float()) {
        (Some(base), Some(delta)) => Ok(Value::Float(base + delta)),
        _ => Err(StoreError::invalid_update(format!(
            "cannot increment non-numeric field {field}"
        ))),
    }
}

fn lookup_path<'a>(record: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Map(doc) => doc.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn set_path(record: &mut Document, path: &str, value: Value) -> StoreResult<()> {
    let Some((head, rest)) = path.split_once('.') else {
        record.insert(path, value);
        return Ok(());
    };
    match record.get(head) {
        Some(Value::Map(_)) => {}
        None | Some(Value::Null) => {
            record.insert(head, Document::new());
        }
        Some(other) => {
            return Err(StoreError::invalid_update(format!(
                "cannot create field {rest} inside {}",
                other.type_name()
            )))
        }
    }
    match record.get_mut(head) {
        Some(Value::Map(child)) => set_path(child, rest, value),
        _ => Ok(()),
    }
}

fn remove_path(record: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            record.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Map(child)) = record.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

/// Equality match on every filter entry. Dotted keys descend into nested
/// documents; an array matches if it contains the expected value.
fn matches_filter(record: &Document, filter: &Document) -> bool {
    filter.iter().all(|(path, expected)| match lookup_path(record, path) {
        Some(actual) => {
            actual == expected
                || matches!(actual, Value::Array(items) if items.contains(expected))
        }
        None => expected.is_null(),
    })
}

fn project(record: Document, projection: &[&str]) -> Document {
    if projection.is_empty() {
        return record;
    }
    record
        .into_iter()
        .filter(|(key, _)| key == ID_KEY || projection.contains(&key.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(fields: &[(&str, Value)]) -> Document {
        fields.iter().cloned().collect()
    }

    fn only(collection: &MemoryCollection) -> Document {
        collection.records().unwrap().remove(0)
    }

    #[test]
    fn insert_assigns_identifiers() {
        let store = MemoryStore::new();
        let users = store.collection("users");
        let ids = users
            .batch_insert(vec![doc(&[("name", "a".into())]), doc(&[("name", "b".into())])])
            .unwrap();

        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| id.as_object_id().is_some()));
        assert_ne!(ids[0], ids[1]);
        assert_eq!(users.records().unwrap()[1].get(ID_KEY), Some(&ids[1]));
    }

    #[test]
    fn insert_keeps_given_identifier() {
        let users = MemoryStore::new().collection("users");
        let ids = users
            .batch_insert(vec![doc(&[(ID_KEY, "alice".into())])])
            .unwrap();
        assert_eq!(ids, vec![Value::from("alice")]);
    }

    #[test]
    fn duplicate_identifier_rejects_whole_batch() {
        let users = MemoryStore::new().collection("users");
        users.batch_insert(vec![doc(&[(ID_KEY, "a".into())])]).unwrap();

        let err = users
            .batch_insert(vec![doc(&[(ID_KEY, "b".into())]), doc(&[(ID_KEY, "a".into())])])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref id, .. } if id == "a"));
        assert_eq!(users.len(), 1);
    }

    #[test]
    fn unencodable_record_rejects_whole_batch() {
        let users = MemoryStore::new().collection("users");
        let err = users
            .batch_insert(vec![
                doc(&[("score", Value::Float(1.5))]),
                doc(&[("score", Value::Float(f64::NAN))]),
            ])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Codec(docmap_codec::CodecError::NaNForbidden)
        ));
        assert_eq!(users.len(), 0);
    }

    #[test]
    fn collections_are_shared_by_name() {
        let store = MemoryStore::new();
        store.collection("users").batch_insert(vec![Document::new()]).unwrap();
        assert_eq!(store.collection("users").len(), 1);
        assert_eq!(store.collection_names(), vec!["users".to_string()]);
    }

    #[test]
    fn update_applies_operators() {
        let users = MemoryStore::new().collection("users");
        users
            .batch_insert(vec![doc(&[
                (ID_KEY, "u1".into()),
                ("name", "a".into()),
                ("email", "a@x".into()),
                ("count", 3i64.into()),
                ("tags", Value::Array(vec![1i64.into(), 2i64.into()])),
            ])])
            .unwrap();

        let mut update = crate::operator::UpdateDocument::new();
        update
            .set("name", "b".into())
            .unset("email")
            .inc("count", Value::Integer(-2))
            .push_all("tags", vec![3i64.into()]);
        let modified = users
            .update(&doc(&[(ID_KEY, "u1".into())]), &update.to_document())
            .unwrap();
        assert_eq!(modified, 1);

        let mut pull = crate::operator::UpdateDocument::new();
        pull.pull_all("tags", vec![1i64.into()]);
        users
            .update(&doc(&[(ID_KEY, "u1".into())]), &pull.to_document())
            .unwrap();

        let record = only(&users);
        assert_eq!(record.get("name"), Some(&Value::from("b")));
        assert!(!record.contains_key("email"));
        assert_eq!(record.get("count"), Some(&Value::Integer(1)));
        assert_eq!(
            record.get("tags"),
            Some(&Value::Array(vec![2i64.into(), 3i64.into()]))
        );
    }

    #[test]
    fn update_without_match_modifies_nothing() {
        let users = MemoryStore::new().collection("users");
        let mut update = crate::operator::UpdateDocument::new();
        update.set("name", "x".into());
        assert_eq!(
            users
                .update(&doc(&[(ID_KEY, "nobody".into())]), &update.to_document())
                .unwrap(),
            0
        );
    }

    #[test]
    fn push_and_pull_of_one_field_is_rejected() {
        let users = MemoryStore::new().collection("users");
        users.batch_insert(vec![doc(&[(ID_KEY, "u1".into())])]).unwrap();

        let mut update = crate::operator::UpdateDocument::new();
        update
            .push_all("tags", vec![1i64.into()])
            .pull_all("tags", vec![2i64.into()]);
        let err = users
            .update(&doc(&[(ID_KEY, "u1".into())]), &update.to_document())
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidUpdate { .. }));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let users = MemoryStore::new().collection("users");
        let update = doc(&[("$rename", Value::Map(doc(&[("a", "b".into())])))]);
        assert!(matches!(
            users.update(&Document::new(), &update),
            Err(StoreError::InvalidUpdate { .. })
        ));
    }

    #[test]
    fn dotted_paths() {
        let users = MemoryStore::new().collection("users");
        users
            .batch_insert(vec![doc(&[
                (ID_KEY, "u1".into()),
                ("address", Value::Map(doc(&[("city", "Oslo".into())]))),
            ])])
            .unwrap();

        let found = users
            .find_one(&doc(&[("address.city", "Oslo".into())]), &[])
            .unwrap();
        assert!(found.is_some());

        let mut update = crate::operator::UpdateDocument::new();
        update.set("address.zip", "0150".into());
        users.update(&Document::new(), &update.to_document()).unwrap();
        assert_eq!(
            only(&users).get("address").and_then(|a| a.get("zip")),
            Some(&Value::from("0150"))
        );
    }

    #[test]
    fn filter_matches_array_elements() {
        let users = MemoryStore::new().collection("users");
        users
            .batch_insert(vec![doc(&[("tags", Value::Array(vec!["a".into(), "b".into()]))])])
            .unwrap();
        assert!(users
            .find_one(&doc(&[("tags", "b".into())]), &[])
            .unwrap()
            .is_some());
    }

    #[test]
    fn projection_keeps_identifier() {
        let users = MemoryStore::new().collection("users");
        users
            .batch_insert(vec![doc(&[("name", "a".into()), ("email", "e".into())])])
            .unwrap();
        let record = users.find_one(&Document::new(), &["name"]).unwrap().unwrap();
        assert_eq!(record.len(), 2);
        assert!(record.contains_key(ID_KEY));
        assert!(record.contains_key("name"));
    }

    #[test]
    fn cursor_filters_and_rewinds() {
        let users = MemoryStore::new().collection("users");
        users
            .batch_insert(vec![
                doc(&[("kind", "a".into())]),
                doc(&[("kind", "b".into())]),
                doc(&[("kind", "a".into())]),
            ])
            .unwrap();

        let mut cursor = users.find(&doc(&[("kind", "a".into())]), &[]).unwrap();
        let mut seen = 0;
        while let Some(record) = cursor.next_record() {
            assert_eq!(record.unwrap().get("kind"), Some(&Value::from("a")));
            seen += 1;
        }
        assert_eq!(seen, 2);

        cursor.rewind().unwrap();
        assert!(cursor.next_record().is_some());
    }

    #[test]
    fn remove_matching_records() {
        let users = MemoryStore::new().collection("users");
        users
            .batch_insert(vec![doc(&[(ID_KEY, "a".into())]), doc(&[(ID_KEY, "b".into())])])
            .unwrap();
        assert_eq!(users.remove(&doc(&[(ID_KEY, "a".into())])).unwrap(), 1);
        assert_eq!(users.len(), 1);
        assert_eq!(users.remove(&doc(&[(ID_KEY, "a".into())])).unwrap(), 0);
    }

    #[test]
    fn file_bucket_describes_contents() {
        let store = MemoryStore::new();
        let images = store.file_bucket("images");
        assert!(images.is_file_bucket());
        assert_eq!(images.name(), "images.files");

        images
            .batch_insert(vec![doc(&[("file", Value::Bytes(b"abc".to_vec()))])])
            .unwrap();
        let record = only(&images);
        assert_eq!(record.get(LENGTH_KEY), Some(&Value::Integer(3)));
        assert_eq!(
            record.get(SHA256_KEY).and_then(Value::as_text),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn increment_mixes_integers_and_floats() {
        assert_eq!(
            add_numbers("n", &Value::Null, &Value::Integer(2)).unwrap(),
            Value::Integer(2)
        );
        assert_eq!(
            add_numbers("n", &Value::Integer(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
        assert!(add_numbers("n", &Value::from("x"), &Value::Integer(1)).is_err());
        assert!(add_numbers("n", &Value::Integer(i64::MAX), &Value::Integer(1)).is_err());
    }
}
