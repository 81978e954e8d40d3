//! Atomic update operator documents.

use docmap_codec::{Document, Value};
use std::collections::BTreeMap;
use std::fmt;

/// A store-native atomic update operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operator {
    /// Replace a field value.
    Set,
    /// Remove a field.
    Unset,
    /// Add a signed delta to a numeric field.
    Inc,
    /// Append every listed element to an array.
    PushAll,
    /// Remove every occurrence of the listed elements from an array.
    PullAll,
}

impl Operator {
    /// All operators in the order they are written.
    pub const ALL: [Operator; 5] = [
        Operator::Set,
        Operator::Unset,
        Operator::Inc,
        Operator::PushAll,
        Operator::PullAll,
    ];

    /// Returns the wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Operator::Set => "$set",
            Operator::Unset => "$unset",
            Operator::Inc => "$inc",
            Operator::PushAll => "$pushAll",
            Operator::PullAll => "$pullAll",
        }
    }

    /// Parses a wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operators of one update, each with its field assignments.
///
/// Operators without assignments are never written to the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateDocument {
    ops: BTreeMap<Operator, Document>,
}

impl UpdateDocument {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, op: Operator) -> &mut Document {
        self.ops.entry(op).or_default()
    }

    /// Adds a `$set` of `field`.
    pub fn set(&mut self, field: impl Into<String>, value: Value) -> &mut Self {
        self.entry(Operator::Set).insert(field, value);
        self
    }

    /// Adds an `$unset` of `field`.
    pub fn unset(&mut self, field: impl Into<String>) -> &mut Self {
        self.entry(Operator::Unset).insert(field, true);
        self
    }

    /// Adds an `$inc` of `field` by `delta`.
    pub fn inc(&mut self, field: impl Into<String>, delta: Value) -> &mut Self {
        self.entry(Operator::Inc).insert(field, delta);
        self
    }

    /// Adds a `$pushAll` of `values` to `field`.
    pub fn push_all(&mut self, field: impl Into<String>, values: Vec<Value>) -> &mut Self {
        self.entry(Operator::PushAll)
            .insert(field, Value::Array(values));
        self
    }

    /// Adds a `$pullAll` of `values` from `field`.
    pub fn pull_all(&mut self, field: impl Into<String>, values: Vec<Value>) -> &mut Self {
        self.entry(Operator::PullAll)
            .insert(field, Value::Array(values));
        self
    }

    /// Returns the assignments of one operator.
    pub fn get(&self, op: Operator) -> Option<&Document> {
        self.ops.get(&op).filter(|doc| !doc.is_empty())
    }

    /// Returns the value assigned to `field` by `op`.
    pub fn field(&self, op: Operator, field: &str) -> Option<&Value> {
        self.get(op).and_then(|doc| doc.get(field))
    }

    /// Returns true if no operator has an assignment.
    pub fn is_empty(&self) -> bool {
        self.ops.values().all(Document::is_empty)
    }

    /// Iterates over the operators that have assignments.
    pub fn operators(&self) -> impl Iterator<Item = (Operator, &Document)> {
        self.ops
            .iter()
            .filter(|(_, doc)| !doc.is_empty())
            .map(|(op, doc)| (*op, doc))
    }

    /// Folds `other` into this update. Assignments in `other` win.
    pub fn merge(&mut self, other: UpdateDocument) {
        for (op, doc) in other.ops {
            self.entry(op).extend(doc);
        }
    }

    /// Separates `$pullAll` assignments that collide with `$pushAll`.
    ///
    /// The store rejects a push and a pull of the same field in one
    /// statement. When that would happen, the colliding `$pullAll`
    /// assignments move into the returned update, which must be sent
    /// first; `self` keeps the rest and loses its `$pullAll` entirely if
    /// nothing remains in it.
    pub fn split_conflicts(&mut self) -> Option<UpdateDocument> {
        let pushed = self.get(Operator::PushAll)?;
        let pulled = self.get(Operator::PullAll)?;
        let shared: Vec<String> = pulled
            .keys()
            .filter(|field| pushed.contains_key(field))
            .map(str::to_string)
            .collect();
        if shared.is_empty() {
            return None;
        }

        let pull = self.ops.get_mut(&Operator::PullAll)?;
        let mut first = UpdateDocument::new();
        for field in shared {
            if let Some(value) = pull.remove(&field) {
                first.entry(Operator::PullAll).insert(field, value);
            }
        }
        if pull.is_empty() {
            self.ops.remove(&Operator::PullAll);
        }
        Some(first)
    }

    /// Renders the wire document.
    pub fn to_document(&self) -> Document {
        self.operators()
            .map(|(op, doc)| (op.as_str(), Value::Map(doc.clone())))
            .collect()
    }
}
