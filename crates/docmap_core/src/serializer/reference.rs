//! Reference descriptors.

use super::{raw_value, Serializer};
use crate::error::{PersistError, PersistResult};
use crate::mapping::FieldMapping;
use crate::property::PropertyValue;
use docmap_codec::{Document, Value};

/// Descriptor key naming the referenced collection.
pub const REF_KEY: &str = "$ref";

/// Descriptor key holding the referenced identifier.
pub const REF_ID_KEY: &str = "$id";

/// Descriptor key naming the referenced database.
pub const REF_DB_KEY: &str = "$db";

impl Serializer<'_> {
    /// Builds the reference descriptor for `target`.
    ///
    /// A target that is not a managed document is returned as is. The
    /// descriptor's `$id` is null while the target has not been inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the target handle or its type is unknown.
    pub fn resolve_reference(
        &self,
        mapping: &FieldMapping,
        target: &PropertyValue,
    ) -> PersistResult<Value> {
        let Some(handle) = target.as_handle() else {
            return raw_value(mapping, target);
        };
        let type_name = self
            .tracker
            .document_type(handle)
            .ok_or(PersistError::UnknownDocument { handle })?;
        let metadata = self.registry.require(&type_name)?;
        let id = self
            .tracker
            .document_identifier(handle)
            .filter(|id| !id.is_null())
            .map_or(Value::Null, |id| metadata.identifier_to_store(&id));

        let mut descriptor = Document::with_capacity(4);
        descriptor.insert(REF_KEY, metadata.collection.as_str());
        descriptor.insert(REF_ID_KEY, id);
        descriptor.insert(REF_DB_KEY, metadata.database.as_str());
        self.attach_discriminator(mapping, &type_name, &mut descriptor);
        Ok(Value::Map(descriptor))
    }
}

/// Returns true if an encoded reference, or any element of an encoded
/// reference list, points at a document that has no identifier yet.
pub fn has_unresolved_reference(encoded: &Value) -> bool {
    match encoded {
        Value::Map(descriptor) => {
            descriptor.contains_key(REF_KEY)
                && descriptor.get(REF_ID_KEY).map_or(true, Value::is_null)
        }
        Value::Array(items) => items.iter().any(has_unresolved_reference),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersisterConfig;
    use crate::mapping::DiscriminatorMap;
    use crate::test_support::{fixture_registry, StubTracker};
    use crate::types::TypeRegistry;
    use docmap_codec::ObjectId;

    fn resolve(tracker: &StubTracker, mapping: &FieldMapping, target: &PropertyValue) -> Value {
        let registry = fixture_registry();
        let types = TypeRegistry::default();
        let config = PersisterConfig::default();
        Serializer::new(&registry, &types, tracker, &config)
            .resolve_reference(mapping, target)
            .unwrap()
    }

    #[test]
    fn single_target_descriptor() {
        let tracker = StubTracker::new();
        let oid = ObjectId::new();
        let profile = tracker.add("Profile", &[]);
        tracker.set_identifier(profile, Value::Text(oid.to_hex()));

        let mapping = FieldMapping::reference_one("profile").target("Profile");
        let descriptor = resolve(&tracker, &mapping, &PropertyValue::Object(profile));
        let descriptor = descriptor.as_document().unwrap();

        assert_eq!(descriptor.len(), 3);
        assert_eq!(descriptor.get(REF_KEY), Some(&Value::from("profiles")));
        assert_eq!(descriptor.get(REF_ID_KEY), Some(&Value::ObjectId(oid)));
        assert_eq!(descriptor.get(REF_DB_KEY), Some(&Value::from("docmap")));
    }

    #[test]
    fn unsaved_target_has_null_identifier() {
        let tracker = StubTracker::new();
        let profile = tracker.add("Profile", &[]);
        let mapping = FieldMapping::reference_one("profile").target("Profile");

        let descriptor = resolve(&tracker, &mapping, &PropertyValue::Object(profile));
        assert_eq!(descriptor.get(REF_ID_KEY), Some(&Value::Null));
        assert!(has_unresolved_reference(&descriptor));
    }

    #[test]
    fn polymorphic_reference_uses_discriminator_map() {
        let tracker = StubTracker::new();
        let project = tracker.add("Project", &[]);
        tracker.set_identifier(project, Value::from("p1"));
        let mapping = FieldMapping::reference_one("favorite")
            .discriminator_field("kind")
            .discriminator_map(DiscriminatorMap::new().with("project", "Project"));

        let descriptor = resolve(&tracker, &mapping, &PropertyValue::Object(project));
        assert_eq!(descriptor.get("kind"), Some(&Value::from("project")));
    }

    #[test]
    fn polymorphic_reference_falls_back_to_type_name() {
        let tracker = StubTracker::new();
        let issue = tracker.add("Issue", &[]);
        let mapping = FieldMapping::reference_one("favorite");

        let descriptor = resolve(&tracker, &mapping, &PropertyValue::Object(issue));
        assert_eq!(descriptor.get("_class"), Some(&Value::from("Issue")));
    }

    #[test]
    fn raw_target_passes_through() {
        let tracker = StubTracker::new();
        let mapping = FieldMapping::reference_one("profile").target("Profile");
        assert_eq!(
            resolve(&tracker, &mapping, &PropertyValue::from("legacy")),
            Value::from("legacy")
        );
    }

    #[test]
    fn unresolved_detection_in_lists() {
        let resolved: Document = [(REF_KEY, Value::from("g")), (REF_ID_KEY, Value::from("1"))]
            .into_iter()
            .collect();
        let pending: Document = [(REF_KEY, Value::from("g")), (REF_ID_KEY, Value::Null)]
            .into_iter()
            .collect();

        assert!(!has_unresolved_reference(&Value::Array(vec![Value::Map(resolved.clone())])));
        assert!(has_unresolved_reference(&Value::Array(vec![
            Value::Map(resolved),
            Value::Map(pending)
        ])));
        assert!(!has_unresolved_reference(&Value::from("plain")));
    }
}
