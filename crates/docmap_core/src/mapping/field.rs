//! Field mappings.

use crate::mapping::discriminator::DiscriminatorMap;
use serde::{Deserialize, Serialize};

/// Structural role of a mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Plain value converted by its scalar type.
    #[default]
    Scalar,
    /// Numeric counter updated with `$inc`.
    Increment,
    /// Array of raw values diffed element by element.
    Collection,
    /// One embedded document.
    EmbedOne,
    /// Many embedded documents.
    EmbedMany,
    /// Reference to one document.
    ReferenceOne,
    /// References to many documents.
    ReferenceMany,
}

impl FieldRole {
    /// Returns true for the "many" association roles.
    pub const fn is_many(self) -> bool {
        matches!(self, FieldRole::EmbedMany | FieldRole::ReferenceMany)
    }

    /// Returns true for embedded roles.
    pub const fn is_embedded(self) -> bool {
        matches!(self, FieldRole::EmbedOne | FieldRole::EmbedMany)
    }

    /// Returns true for reference roles.
    pub const fn is_reference(self) -> bool {
        matches!(self, FieldRole::ReferenceOne | FieldRole::ReferenceMany)
    }

    /// Returns true for embedded and reference roles.
    pub const fn is_association(self) -> bool {
        self.is_embedded() || self.is_reference()
    }
}

fn default_type() -> String {
    "string".to_string()
}

/// Describes how one field of a document type is stored.
///
/// `type_name` names the scalar converter in the
/// [`TypeRegistry`](crate::types::TypeRegistry). Associations ignore it.
/// An association without `target_document` is polymorphic and stores a
/// discriminator next to each value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Field name in the document and in storage.
    pub name: String,
    /// Scalar type name.
    #[serde(rename = "type", default = "default_type")]
    pub type_name: String,
    /// Structural role.
    #[serde(default)]
    pub role: FieldRole,
    /// Whether null is written instead of omitting the field.
    #[serde(default)]
    pub nullable: bool,
    /// Fields excluded from every insert and update.
    #[serde(default)]
    pub not_saved: bool,
    /// Whether this is the document identifier.
    #[serde(default)]
    pub identifier: bool,
    /// Single concrete type of the associated documents.
    #[serde(default)]
    pub target_document: Option<String>,
    /// Discriminator field for polymorphic associations.
    #[serde(default)]
    pub discriminator_field: Option<String>,
    /// Discriminator tags for polymorphic associations.
    #[serde(default)]
    pub discriminator_map: Option<DiscriminatorMap>,
}

impl FieldMapping {
    fn with_role(name: impl Into<String>, type_name: impl Into<String>, role: FieldRole) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            role,
            nullable: false,
            not_saved: false,
            identifier: false,
            target_document: None,
            discriminator_field: None,
            discriminator_map: None,
        }
    }

    /// A scalar field of the given type.
    #[must_use]
    pub fn scalar(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::with_role(name, type_name, FieldRole::Scalar)
    }

    /// The identifier field.
    #[must_use]
    pub fn id(name: impl Into<String>) -> Self {
        let mut mapping = Self::with_role(name, "id", FieldRole::Scalar);
        mapping.identifier = true;
        mapping
    }

    /// A numeric counter of the given type (`int` or `float`).
    #[must_use]
    pub fn increment(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::with_role(name, type_name, FieldRole::Increment)
    }

    /// An array of raw values.
    #[must_use]
    pub fn collection(name: impl Into<String>) -> Self {
        Self::with_role(name, "collection", FieldRole::Collection)
    }

    /// One embedded document.
    #[must_use]
    pub fn embed_one(name: impl Into<String>) -> Self {
        Self::with_role(name, "one", FieldRole::EmbedOne)
    }

    /// Many embedded documents.
    #[must_use]
    pub fn embed_many(name: impl Into<String>) -> Self {
        Self::with_role(name, "many", FieldRole::EmbedMany)
    }

    /// A reference to one document.
    #[must_use]
    pub fn reference_one(name: impl Into<String>) -> Self {
        Self::with_role(name, "one", FieldRole::ReferenceOne)
    }

    /// References to many documents.
    #[must_use]
    pub fn reference_many(name: impl Into<String>) -> Self {
        Self::with_role(name, "many", FieldRole::ReferenceMany)
    }

    /// Restricts an association to one concrete type.
    #[must_use]
    pub fn target(mut self, type_name: impl Into<String>) -> Self {
        self.target_document = Some(type_name.into());
        self
    }

    /// Sets whether null is written.
    #[must_use]
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Sets whether the field is excluded from persistence.
    #[must_use]
    pub fn not_saved(mut self, value: bool) -> Self {
        self.not_saved = value;
        self
    }

    /// Sets the discriminator field of a polymorphic association.
    #[must_use]
    pub fn discriminator_field(mut self, field: impl Into<String>) -> Self {
        self.discriminator_field = Some(field.into());
        self
    }

    /// Sets the discriminator tags of a polymorphic association.
    #[must_use]
    pub fn discriminator_map(mut self, map: DiscriminatorMap) -> Self {
        self.discriminator_map = Some(map);
        self
    }

    /// Returns true if values of this field carry a discriminator.
    pub fn is_polymorphic(&self) -> bool {
        self.role.is_association() && self.target_document.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_predicates() {
        assert!(FieldRole::EmbedMany.is_many());
        assert!(FieldRole::ReferenceMany.is_many());
        assert!(!FieldRole::Collection.is_many());
        assert!(FieldRole::ReferenceOne.is_reference());
        assert!(FieldRole::EmbedOne.is_embedded());
        assert!(!FieldRole::Increment.is_association());
    }

    #[test]
    fn polymorphism_needs_missing_target() {
        assert!(FieldMapping::reference_one("owner").is_polymorphic());
        assert!(!FieldMapping::reference_one("owner").target("User").is_polymorphic());
        assert!(!FieldMapping::scalar("name", "string").is_polymorphic());
    }

    #[test]
    fn deserialize_defaults() {
        let mapping: FieldMapping = serde_json::from_str(r#"{"name": "title"}"#).unwrap();
        assert_eq!(mapping.type_name, "string");
        assert_eq!(mapping.role, FieldRole::Scalar);
        assert!(!mapping.nullable);
        assert!(!mapping.not_saved);
    }

    #[test]
    fn deserialize_association() {
        let mapping: FieldMapping = serde_json::from_str(
            r#"{
                "name": "favorite",
                "role": "reference_one",
                "discriminator_field": "kind",
                "discriminator_map": {"p": "Project"}
            }"#,
        )
        .unwrap();
        assert_eq!(mapping.role, FieldRole::ReferenceOne);
        assert!(mapping.is_polymorphic());
        assert_eq!(
            mapping.discriminator_map.unwrap().tag_for("Project"),
            "p"
        );
    }
}
