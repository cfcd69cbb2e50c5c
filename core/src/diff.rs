//! Field-level delta between two JSON representations of a model, sent as
//! the body of a PATCH.

use serde::Serialize;
use serde_json::{Map, Value};

/// Fields that changed from `old` to `new`.
///
/// Removed fields map to `null`, changed and added fields map to their new
/// value, unchanged fields are omitted. Nested values are compared
/// structurally.
pub fn partial_update(new: &Map<String, Value>, old: &Map<String, Value>) -> Map<String, Value> {
    let mut delta = Map::new();
    for (key, old_value) in old {
        match new.get(key) {
            None => {
                delta.insert(key.clone(), Value::Null);
            }
            Some(new_value) if new_value != old_value => {
                delta.insert(key.clone(), new_value.clone());
            }
            Some(_) => {}
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) {
            delta.insert(key.clone(), new_value.clone());
        }
    }
    delta
}

/// PATCH body for moving `old` to `new`. Falls back to the full
/// representation of `new` when either side does not serialize to an object.
pub fn patch_body<T: Serialize>(new: &T, old: &T) -> Result<Value, serde_json::Error> {
    let new_json = serde_json::to_value(new)?;
    let old_json = serde_json::to_value(old).ok();
    match (&new_json, &old_json) {
        (Value::Object(new_map), Some(Value::Object(old_map))) => {
            Ok(Value::Object(partial_update(new_map, old_map)))
        }
        _ => Ok(new_json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn identical_objects_produce_empty_delta() {
        let x = object(json!({"id": 1, "name": "Ann", "tags": ["a"], "meta": {"k": 1}}));
        assert!(partial_update(&x, &x).is_empty());
    }

    #[test]
    fn changed_removed_and_added_fields() {
        let old = object(json!({"id": 1, "name": "Ann", "email": "ann@example.com", "age": 30}));
        let new = object(json!({"id": 1, "name": "Anne", "age": 30, "city": "Oslo"}));
        assert_eq!(
            Value::Object(partial_update(&new, &old)),
            json!({"name": "Anne", "email": null, "city": "Oslo"})
        );
    }

    #[test]
    fn nested_values_compare_structurally() {
        let old = object(json!({"tags": ["a", "b"], "meta": {"k": 1}}));
        let new = object(json!({"tags": ["a", "b"], "meta": {"k": 2}}));
        assert_eq!(Value::Object(partial_update(&new, &old)), json!({"meta": {"k": 2}}));

        let reordered = object(json!({"tags": ["b", "a"], "meta": {"k": 1}}));
        assert_eq!(
            Value::Object(partial_update(&reordered, &old)),
            json!({"tags": ["b", "a"]})
        );
    }

    #[test]
    fn explicit_null_is_a_change() {
        let old = object(json!({"nick": "A"}));
        let new = object(json!({"nick": null}));
        assert_eq!(Value::Object(partial_update(&new, &old)), json!({"nick": null}));
    }

    #[test]
    fn patch_body_falls_back_to_full_representation() {
        assert_eq!(patch_body(&json!([1, 2]), &json!([1])).unwrap(), json!([1, 2]));
        assert_eq!(
            patch_body(&json!({"a": 1, "b": 2}), &json!({"a": 1})).unwrap(),
            json!({"b": 2})
        );
    }
}
