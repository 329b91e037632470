//! Helpers for structural surgery on documents: key ordering, `$ref`
//! objects, JSON-pointer paths and reference relocation.

use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// A JSON/YAML mapping node.
pub type Object = Map<String, Value>;

/// Reorder `object` so that `keys` come first, in the given order, followed
/// by every other key in its original position.
pub fn sort_object_keys(mut object: Object, keys: &[&str]) -> Object {
    let mut sorted = Object::with_capacity(object.len());
    for key in keys {
        if let Some(value) = object.shift_remove(*key) {
            sorted.insert((*key).to_string(), value);
        }
    }
    sorted.extend(object);
    sorted
}

/// Whether `value` is a reference object (`{ $ref: "<string>" }`).
pub fn is_ref_object(value: &Value) -> bool {
    matches!(value.get("$ref"), Some(Value::String(_)))
}

/// Escape a single path segment for use inside a JSON pointer.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Reverse of [`escape_segment`].
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Build a local reference path (`#/a/b`) from unescaped segments.
pub fn create_ref_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::from("#");
    for segment in segments {
        path.push('/');
        path.push_str(&escape_segment(segment.as_ref()));
    }
    path
}

/// Build a reference object pointing at the given segments.
pub fn create_ref_object<S: AsRef<str>>(segments: &[S]) -> Value {
    let mut object = Object::new();
    object.insert("$ref".to_string(), Value::String(create_ref_path(segments)));
    Value::Object(object)
}

/// Look up a nested value. Array elements are addressed by their index.
pub fn get_value_by_path<'a, S: AsRef<str>>(value: &'a Value, path: &[S]) -> Option<&'a Value> {
    let mut current = value;
    for segment in path {
        let segment = segment.as_ref();
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a local reference (`#/a/b`) against `document`. Remote references
/// are never followed.
pub fn get_value_by_ref<'a>(document: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    let pointer = pointer.strip_prefix('/').unwrap_or(pointer);
    if pointer.is_empty() {
        return Some(document);
    }
    let segments: Vec<String> = pointer.split('/').map(unescape_segment).collect();
    get_value_by_path(document, &segments)
}

/// Follow `value` through one level of `$ref` if it is a reference object.
pub fn dereference<'a>(document: &'a Value, value: &'a Value) -> Option<&'a Value> {
    match value.get("$ref") {
        Some(Value::String(reference)) => get_value_by_ref(document, reference),
        _ => Some(value),
    }
}

/// Drop entries whose value is `null`, an empty mapping or an empty sequence.
pub fn remove_empty_values(object: &mut Object) {
    object.retain(|_, value| match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    });
}

/// Old-path to new-path mapping for relocated document nodes.
///
/// Lookups pick the longest recorded prefix of a reference, aligned on path
/// segments, and carry the unmatched tail over to the new location.
#[derive(Debug, Clone, Default)]
pub struct RefMap {
    entries: HashMap<String, String>,
}

impl RefMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the node at `old` now lives at `new` (unescaped segments).
    pub fn record<S: AsRef<str>, T: AsRef<str>>(&mut self, old: &[S], new: &[T]) {
        let old = create_ref_path(old);
        let new = create_ref_path(new);
        debug!(from = %old, to = %new, "recorded relocation");
        self.entries.insert(old, new);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The new location of `reference`, if any recorded prefix applies.
    pub fn resolve(&self, reference: &str) -> Option<String> {
        let mut candidate = reference;
        loop {
            if let Some(target) = self.entries.get(candidate) {
                return Some(format!("{}{}", target, &reference[candidate.len()..]));
            }
            let cut = candidate.rfind('/')?;
            candidate = &candidate[..cut];
            if candidate.len() <= 1 {
                return None;
            }
        }
    }

    /// Rewrite every `$ref` string in `value` in place.
    pub fn rewrite(&self, value: &mut Value) {
        if self.entries.is_empty() {
            return;
        }
        match value {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    if key == "$ref" {
                        if let Value::String(reference) = child {
                            if let Some(relocated) = self.resolve(reference) {
                                *reference = relocated;
                            }
                            continue;
                        }
                    }
                    self.rewrite(child);
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.rewrite(item);
                }
            }
            Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_object_keys() {
        let object = json!({"c": 3, "z": 0, "a": 1, "b": 2});
        let sorted = sort_object_keys(object.as_object().unwrap().clone(), &["a", "b", "missing"]);
        let keys: Vec<&str> = sorted.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "z"]);
    }

    #[test]
    fn test_create_ref_path_escapes_segments() {
        assert_eq!(
            create_ref_path(&["channels", "user/signed~up"]),
            "#/channels/user~1signed~0up"
        );
        assert_eq!(
            create_ref_object(&["servers", "production"]),
            json!({"$ref": "#/servers/production"})
        );
    }

    #[test]
    fn test_get_value_by_ref() {
        let document = json!({
            "channels": {
                "user/signedup": {
                    "publish": {"message": {"oneOf": [{"name": "first"}, {"name": "second"}]}}
                }
            }
        });

        let value = get_value_by_ref(
            &document,
            "#/channels/user~1signedup/publish/message/oneOf/1",
        );
        assert_eq!(value, Some(&json!({"name": "second"})));
        assert!(get_value_by_ref(&document, "#/channels/missing").is_none());
        assert!(get_value_by_ref(&document, "other.yaml#/channels").is_none());
        assert_eq!(get_value_by_ref(&document, "#"), Some(&document));
    }

    #[test]
    fn test_is_ref_object() {
        assert!(is_ref_object(&json!({"$ref": "#/components/messages/a"})));
        assert!(!is_ref_object(&json!({"$ref": 1})));
        assert!(!is_ref_object(&json!({"name": "a"})));
        assert!(!is_ref_object(&json!("#/a")));
    }

    #[test]
    fn test_remove_empty_values() {
        let mut object = json!({"a": null, "b": {}, "c": [], "d": 0, "e": "", "f": {"g": 1}})
            .as_object()
            .unwrap()
            .clone();
        remove_empty_values(&mut object);
        assert_eq!(Value::Object(object), json!({"d": 0, "e": "", "f": {"g": 1}}));
    }

    #[test]
    fn test_ref_map_prefers_longest_prefix() {
        let mut refs = RefMap::new();
        refs.record(&["channels", "a"], &["channels", "A"]);
        refs.record(&["channels", "a", "publish"], &["operations", "op"]);
        refs.record(
            &["channels", "a", "publish", "message"],
            &["channels", "A", "messages", "msg"],
        );

        assert_eq!(refs.resolve("#/channels/a").as_deref(), Some("#/channels/A"));
        assert_eq!(
            refs.resolve("#/channels/a/bindings/kafka").as_deref(),
            Some("#/channels/A/bindings/kafka")
        );
        assert_eq!(
            refs.resolve("#/channels/a/publish/bindings").as_deref(),
            Some("#/operations/op/bindings")
        );
        assert_eq!(
            refs.resolve("#/channels/a/publish/message/payload").as_deref(),
            Some("#/channels/A/messages/msg/payload")
        );
    }

    #[test]
    fn test_ref_map_matches_whole_segments_only() {
        let mut refs = RefMap::new();
        refs.record(&["channels", "foo"], &["channels", "bar"]);
        assert!(refs.resolve("#/channels/foobar").is_none());
        assert!(refs.resolve("#/components/schemas/foo").is_none());
    }

    #[test]
    fn test_ref_map_rewrite() {
        let mut refs = RefMap::new();
        refs.record(&["tags"], &["info", "tags"]);
        let mut document = json!({
            "a": {"$ref": "#/tags/0"},
            "b": [{"$ref": "#/tags"}, {"$ref": "#/components/schemas/x"}],
            "c": {"nested": {"$ref": "#/tags/1/name"}}
        });
        refs.rewrite(&mut document);
        assert_eq!(
            document,
            json!({
                "a": {"$ref": "#/info/tags/0"},
                "b": [{"$ref": "#/info/tags"}, {"$ref": "#/components/schemas/x"}],
                "c": {"nested": {"$ref": "#/info/tags/1/name"}}
            })
        );
    }
}
