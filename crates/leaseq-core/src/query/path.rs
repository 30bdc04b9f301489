//! Dotted-path access into JSON documents (`"message.user.id"`).

use serde_json::{Map, Value};

use super::Document;
use crate::domain::StoreError;

/// Look up a dotted path. Missing intermediate objects yield `None`.
pub fn get<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set a dotted path, creating (or replacing non-object) intermediates.
pub fn set(doc: &mut Document, path: &str, value: Value) {
    let (parent, leaf) = parent_mut(doc, path);
    parent.insert(leaf.to_string(), value);
}

/// Remove a dotted path. Returns whether something was removed.
pub fn unset(doc: &mut Document, path: &str) -> bool {
    let Some((head, leaf)) = path.rsplit_once('.') else {
        return doc.remove(path).is_some();
    };
    let mut current = doc;
    for segment in head.split('.') {
        match current.get_mut(segment).and_then(Value::as_object_mut) {
            Some(next) => current = next,
            None => return false,
        }
    }
    current.remove(leaf).is_some()
}

/// Append to the array at a dotted path, creating it when missing.
pub fn push(doc: &mut Document, path: &str, value: Value) -> Result<(), StoreError> {
    let (parent, leaf) = parent_mut(doc, path);
    let slot = parent.entry(leaf.to_string()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => {
            items.push(value);
            Ok(())
        }
        other => Err(StoreError::Corrupt(format!(
            "cannot push onto non-array field {path} ({other})"
        ))),
    }
}

/// Flatten a JSON object into `(prefix.key.sub, leaf)` pairs.
///
/// Nested non-empty objects are descended into; arrays, scalars and empty
/// objects are leaves.
pub fn flatten(prefix: &str, object: &Map<String, Value>) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    flatten_into(prefix, object, &mut out);
    out
}

fn flatten_into(prefix: &str, object: &Map<String, Value>, out: &mut Vec<(String, Value)>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(&path, inner, out),
            leaf => out.push((path, leaf.clone())),
        }
    }
}

fn parent_mut<'a, 'p>(doc: &'a mut Document, path: &'p str) -> (&'a mut Document, &'p str) {
    let Some((head, leaf)) = path.rsplit_once('.') else {
        return (doc, path);
    };
    let mut current = doc;
    for segment in head.split('.') {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just made an object"),
        };
    }
    (current, leaf)
}
