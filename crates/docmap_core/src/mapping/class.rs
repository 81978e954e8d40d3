//! Per-type document metadata.

use crate::mapping::field::FieldMapping;
use docmap_codec::{ObjectId, Value};
use serde::{Deserialize, Serialize};

fn default_database() -> String {
    "docmap".to_string()
}

/// How identifiers are converted between documents and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierStrategy {
    /// Store-generated object IDs. Documents see the hex form.
    #[default]
    Auto,
    /// Identifiers are stored exactly as the document holds them.
    Custom,
}

/// Class-level discriminator written into every stored document of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDiscriminator {
    /// Field name.
    pub field: String,
    /// Tag of this type.
    pub value: String,
}

/// Everything the persister needs to know about one document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMetadata {
    /// Type name.
    pub name: String,
    /// Collection documents of this type are stored in.
    #[serde(default)]
    pub collection: String,
    /// Database the collection lives in.
    #[serde(default = "default_database")]
    pub database: String,
    /// Identifier conversion.
    #[serde(default)]
    pub identifier_strategy: IdentifierStrategy,
    /// Discriminator written for this type.
    #[serde(default)]
    pub discriminator: Option<ClassDiscriminator>,
    /// Whether the type only ever appears embedded in other documents.
    #[serde(default)]
    pub embedded: bool,
    /// Whether the type is stored in a file bucket.
    #[serde(default)]
    pub file: bool,
    /// Field mappings in declaration order.
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
}

impl ClassMetadata {
    /// Creates metadata for a type stored in `collection`.
    #[must_use]
    pub fn new(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: collection.into(),
            database: default_database(),
            identifier_strategy: IdentifierStrategy::Auto,
            discriminator: None,
            embedded: false,
            file: false,
            fields: Vec::new(),
        }
    }

    /// Creates metadata for an embedded-only type.
    #[must_use]
    pub fn embedded_document(name: impl Into<String>) -> Self {
        let mut meta = Self::new(name, "");
        meta.embedded = true;
        meta
    }

    /// Sets the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Appends a field mapping.
    #[must_use]
    pub fn field(mut self, mapping: FieldMapping) -> Self {
        self.fields.push(mapping);
        self
    }

    /// Sets the identifier strategy.
    #[must_use]
    pub fn identifier_strategy(mut self, strategy: IdentifierStrategy) -> Self {
        self.identifier_strategy = strategy;
        self
    }

    /// Sets the class-level discriminator.
    #[must_use]
    pub fn discriminator(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.discriminator = Some(ClassDiscriminator {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Marks the type as stored in a file bucket.
    #[must_use]
    pub fn file(mut self, value: bool) -> Self {
        self.file = value;
        self
    }

    /// Returns the field mappings in declaration order.
    pub fn fields(&self) -> &[FieldMapping] {
        &self.fields
    }

    /// Looks up a field mapping by name.
    pub fn field_mapping(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the identifier field mapping.
    pub fn identifier_field(&self) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.identifier)
    }

    /// Converts an identifier as the document holds it to its stored form.
    pub fn identifier_to_store(&self, id: &Value) -> Value {
        match (self.identifier_strategy, id) {
            (IdentifierStrategy::Auto, Value::Text(text)) => ObjectId::parse_hex(text)
                .map_or_else(|| id.clone(), Value::ObjectId),
            _ => id.clone(),
        }
    }

    /// Converts a stored identifier to the form documents hold.
    pub fn identifier_from_store(&self, id: &Value) -> Value {
        match (self.identifier_strategy, id) {
            (IdentifierStrategy::Auto, Value::ObjectId(oid)) => Value::Text(oid.to_hex()),
            _ => id.clone(),
        }
    }
}
