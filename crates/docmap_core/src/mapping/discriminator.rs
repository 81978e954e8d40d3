//! Bidirectional discriminator tables.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Maps stored discriminator tags to document type names and back.
///
/// Built once from configuration. Looking up a type that has no tag
/// falls back to the type name itself, so unmapped subtypes are still
/// stored with a usable tag.
///
/// When several tags name the same type, the lexicographically smallest
/// tag is used for writing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct DiscriminatorMap {
    by_tag: BTreeMap<String, String>,
    by_type: HashMap<String, String>,
}

impl DiscriminatorMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag for a type.
    #[must_use]
    pub fn with(mut self, tag: impl Into<String>, type_name: impl Into<String>) -> Self {
        let tag = tag.into();
        let type_name = type_name.into();
        self.by_tag.insert(tag, type_name);
        self.rebuild_reverse();
        self
    }

    /// Returns the tag stored for `type_name`, or `type_name` itself when
    /// no tag maps to it.
    pub fn tag_for<'a>(&'a self, type_name: &'a str) -> &'a str {
        self.by_type.get(type_name).map_or(type_name, String::as_str)
    }

    /// Returns the type a stored tag names.
    pub fn type_for(&self, tag: &str) -> Option<&str> {
        self.by_tag.get(tag).map(String::as_str)
    }

    /// Returns the number of tags.
    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    /// Returns true if the map has no tags.
    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    fn rebuild_reverse(&mut self) {
        self.by_type.clear();
        for (tag, type_name) in &self.by_tag {
            self.by_type
                .entry(type_name.clone())
                .or_insert_with(|| tag.clone());
        }
    }
}

impl From<BTreeMap<String, String>> for DiscriminatorMap {
    fn from(by_tag: BTreeMap<String, String>) -> Self {
        let mut map = Self {
            by_tag,
            by_type: HashMap::new(),
        };
        map.rebuild_reverse();
        map
    }
}

impl From<DiscriminatorMap> for BTreeMap<String, String> {
    fn from(map: DiscriminatorMap) -> Self {
        map.by_tag
    }
}

impl<T: Into<String>, N: Into<String>> FromIterator<(T, N)> for DiscriminatorMap {
    fn from_iter<I: IntoIterator<Item = (T, N)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(t, n)| (t.into(), n.into()))
            .collect::<BTreeMap<_, _>>()
            .into()
    }
}
