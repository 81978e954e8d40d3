//! Field-level change records produced by the change tracker.

use crate::property::PropertyValue;
use std::collections::HashMap;

static NULL_PROPERTY: PropertyValue = PropertyValue::Null;

/// Elements added to and removed from a collection field since the last
/// flush, as computed by the change tracker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionDiff {
    /// Elements present now but not at the last flush.
    pub inserted: Vec<PropertyValue>,
    /// Elements present at the last flush but not now.
    pub deleted: Vec<PropertyValue>,
}

impl CollectionDiff {
    /// Creates a diff from its two halves.
    #[must_use]
    pub fn new(inserted: Vec<PropertyValue>, deleted: Vec<PropertyValue>) -> Self {
        Self { inserted, deleted }
    }

    /// Returns true if nothing was added or removed.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty()
    }
}

/// The change of one field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldChange {
    /// Value at the last flush.
    pub old: PropertyValue,
    /// Current value.
    pub new: PropertyValue,
    /// Precomputed diff for collection fields.
    pub collection_diff: Option<CollectionDiff>,
}

impl FieldChange {
    /// Creates a change from an old/new pair.
    #[must_use]
    pub fn new(old: impl Into<PropertyValue>, new: impl Into<PropertyValue>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            collection_diff: None,
        }
    }

    /// Attaches a precomputed collection diff.
    #[must_use]
    pub fn with_diff(mut self, diff: CollectionDiff) -> Self {
        self.collection_diff = Some(diff);
        self
    }
}

/// Changes of one document keyed by field name.
///
/// The persister only reads change sets; it never modifies them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChangeSet {
    changes: HashMap<String, FieldChange>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the change of a field, replacing any previous record.
    pub fn insert(&mut self, field: impl Into<String>, change: FieldChange) {
        self.changes.insert(field.into(), change);
    }

    /// Builder form of [`ChangeSet::insert`].
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, change: FieldChange) -> Self {
        self.insert(field, change);
        self
    }

    /// Returns the change recorded for a field.
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    /// Returns the new value of a field, or null when it did not change.
    pub fn new_value(&self, field: &str) -> &PropertyValue {
        self.changes.get(field).map_or(&NULL_PROPERTY, |c| &c.new)
    }

    /// Returns the number of changed fields.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Returns true if no field changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterates over changed fields in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.changes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_value_defaults_to_null() {
        let changes = ChangeSet::new().with("name", FieldChange::new(PropertyValue::Null, "bob"));
        assert_eq!(changes.new_value("name"), &PropertyValue::from("bob"));
        assert!(changes.new_value("missing").is_null());
    }

    #[test]
    fn insert_replaces() {
        let mut changes = ChangeSet::new();
        changes.insert("n", FieldChange::new(1i64, 2i64));
        changes.insert("n", FieldChange::new(2i64, 3i64));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("n").unwrap().new, PropertyValue::from(3i64));
    }

    #[test]
    fn collection_diff_emptiness() {
        assert!(CollectionDiff::default().is_empty());
        assert!(!CollectionDiff::new(vec![PropertyValue::from(1i64)], vec![]).is_empty());
    }
}
