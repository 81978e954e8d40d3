//! Translation of field changes into atomic operators.
//!
//! All functions here work on values that already went through the value
//! codec; they never look at managed documents.

use crate::error::{PersistError, PersistResult};
use crate::mapping::{FieldMapping, FieldRole};
use crate::operator::UpdateDocument;
use docmap_codec::Value;

/// Builds the operator for one changed single-valued field.
///
/// Increment fields get `$inc` with `new - old`. Other fields get `$set`
/// unless the new value is null on a non-nullable field, which is removed
/// with `$unset` instead.
///
/// # Errors
///
/// Returns an error if an increment field holds a non-numeric value or the
/// integer delta overflows.
pub fn translate_update(
    mapping: &FieldMapping,
    old: &Value,
    new: &Value,
) -> PersistResult<UpdateDocument> {
    let mut update = UpdateDocument::new();
    if mapping.role == FieldRole::Increment {
        update.inc(&mapping.name, increment_delta(&mapping.name, old, new)?);
    } else if !new.is_null() || mapping.nullable {
        update.set(&mapping.name, new.clone());
    } else {
        update.unset(&mapping.name);
    }
    Ok(update)
}

/// Builds `$pullAll`/`$pushAll` for an array field from its full old and
/// new contents.
pub fn translate_array_update(mapping: &FieldMapping, new: &[Value], old: &[Value]) -> UpdateDocument {
    let deleted = array_diff(old, new);
    let inserted = array_diff(new, old);
    array_operators(mapping, inserted, deleted)
}

/// Builds `$pullAll`/`$pushAll` from already computed diffs. Empty diffs
/// produce no operator.
pub fn array_operators(
    mapping: &FieldMapping,
    inserted: Vec<Value>,
    deleted: Vec<Value>,
) -> UpdateDocument {
    let mut update = UpdateDocument::new();
    if !deleted.is_empty() {
        update.pull_all(&mapping.name, deleted);
    }
    if !inserted.is_empty() {
        update.push_all(&mapping.name, inserted);
    }
    update
}

/// Returns the elements of `from` that do not occur in `against`, in the
/// order of `from`. Elements compare by deep value equality.
pub fn array_diff(from: &[Value], against: &[Value]) -> Vec<Value> {
    from.iter()
        .filter(|value| !against.contains(value))
        .cloned()
        .collect()
}

/// Computes `new - old` for an increment field. Null counts as zero.
fn increment_delta(field: &str, old: &Value, new: &Value) -> PersistResult<Value> {
    match (old, new) {
        (Value::Null | Value::Integer(_), Value::Null | Value::Integer(_)) => {
            let old = old.as_integer().unwrap_or(0);
            let new = new.as_integer().unwrap_or(0);
            new.checked_sub(old)
                .map(Value::Integer)
                .ok_or_else(|| PersistError::IncrementOverflow {
                    field: field.to_string(),
                })
        }
        _ => Ok(Value::Float(as_number(field, new)? - as_number(field, old)?)),
    }
}

fn as_number(field: &str, value: &Value) -> PersistResult<f64> {
    match value {
        Value::Null => Ok(0.0),
        other => other.as_float().ok_or_else(|| {
            PersistError::mapping_inconsistency(format!(
                "increment field {field} holds {}",
                other.type_name()
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Operator;
    use proptest::prelude::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Integer).collect()
    }

    #[test]
    fn increment_in_both_directions() {
        let mapping = FieldMapping::increment("count", "int");

        let up = translate_update(&mapping, &Value::Integer(3), &Value::Integer(5)).unwrap();
        assert_eq!(up.field(Operator::Inc, "count"), Some(&Value::Integer(2)));

        let down = translate_update(&mapping, &Value::Integer(5), &Value::Integer(3)).unwrap();
        assert_eq!(down.field(Operator::Inc, "count"), Some(&Value::Integer(-2)));
    }

    #[test]
    fn increment_from_null() {
        let mapping = FieldMapping::increment("count", "int");
        let update = translate_update(&mapping, &Value::Null, &Value::Integer(4)).unwrap();
        assert_eq!(update.field(Operator::Inc, "count"), Some(&Value::Integer(4)));
    }

    #[test]
    fn float_increment() {
        let mapping = FieldMapping::increment("score", "float");
        let update = translate_update(&mapping, &Value::Float(1.5), &Value::Integer(1)).unwrap();
        assert_eq!(update.field(Operator::Inc, "score"), Some(&Value::Float(-0.5)));
    }

    #[test]
    fn increment_overflow() {
        let mapping = FieldMapping::increment("count", "int");
        assert!(matches!(
            translate_update(&mapping, &Value::Integer(i64::MIN), &Value::Integer(1)),
            Err(PersistError::IncrementOverflow { .. })
        ));
    }

    #[test]
    fn increment_rejects_text() {
        let mapping = FieldMapping::increment("count", "int");
        assert!(matches!(
            translate_update(&mapping, &Value::from("a"), &Value::Integer(1)),
            Err(PersistError::MappingInconsistency { .. })
        ));
    }

    #[test]
    fn set_non_null() {
        let mapping = FieldMapping::scalar("name", "string");
        let update = translate_update(&mapping, &Value::Null, &Value::from("bob")).unwrap();
        assert_eq!(update.field(Operator::Set, "name"), Some(&Value::from("bob")));
    }

    #[test]
    fn null_on_nullable_field_is_set() {
        let mapping = FieldMapping::scalar("email", "string").nullable(true);
        let update = translate_update(&mapping, &Value::from("a@b"), &Value::Null).unwrap();
        assert_eq!(update.field(Operator::Set, "email"), Some(&Value::Null));
        assert!(update.get(Operator::Unset).is_none());
    }

    #[test]
    fn null_on_required_field_is_unset() {
        let mapping = FieldMapping::scalar("email", "string");
        let update = translate_update(&mapping, &Value::from("a@b"), &Value::Null).unwrap();
        assert_eq!(update.field(Operator::Unset, "email"), Some(&Value::Bool(true)));
        assert!(update.get(Operator::Set).is_none());
    }

    #[test]
    fn array_diff_keeps_order() {
        let mapping = FieldMapping::collection("tags");
        let update = translate_array_update(&mapping, &ints(&[2, 3, 4]), &ints(&[1, 2, 3]));
        assert_eq!(
            update.field(Operator::PullAll, "tags"),
            Some(&Value::Array(ints(&[1])))
        );
        assert_eq!(
            update.field(Operator::PushAll, "tags"),
            Some(&Value::Array(ints(&[4])))
        );
    }

    #[test]
    fn unchanged_array_produces_nothing() {
        let mapping = FieldMapping::collection("tags");
        assert!(translate_array_update(&mapping, &ints(&[1, 2]), &ints(&[2, 1])).is_empty());
    }

    #[test]
    fn array_diff_uses_deep_equality() {
        let doc = |n: i64| Value::Map([("n", Value::Integer(n))].into_iter().collect());
        let diff = array_diff(&[doc(1), doc(2)], &[doc(2)]);
        assert_eq!(diff, vec![doc(1)]);
    }

    proptest! {
        #[test]
        fn increment_emits_difference(old in -1_000_000i64..1_000_000, new in -1_000_000i64..1_000_000) {
            let mapping = FieldMapping::increment("n", "int");
            let update = translate_update(&mapping, &Value::Integer(old), &Value::Integer(new)).unwrap();
            prop_assert_eq!(update.field(Operator::Inc, "n"), Some(&Value::Integer(new - old)));
        }

        #[test]
        fn array_operators_describe_the_difference(
            old in prop::collection::vec(0i64..10, 0..8),
            new in prop::collection::vec(0i64..10, 0..8),
        ) {
            let mapping = FieldMapping::collection("xs");
            let (old, new) = (ints(&old), ints(&new));
            let update = translate_array_update(&mapping, &new, &old);

            if let Some(Value::Array(pushed)) = update.field(Operator::PushAll, "xs") {
                prop_assert!(pushed.iter().all(|v| new.contains(v) && !old.contains(v)));
            }
            if let Some(Value::Array(pulled)) = update.field(Operator::PullAll, "xs") {
                prop_assert!(pulled.iter().all(|v| old.contains(v) && !new.contains(v)));
            }
            let same = old.iter().all(|v| new.contains(v)) && new.iter().all(|v| old.contains(v));
            prop_assert_eq!(update.is_empty(), same);
        }
    }
}
