//! Dotted-path lookup into JSON documents
//!
//! Payloads often arrive wrapped in an envelope such as
//! `{"data": {"users": [...]}}`. These helpers pick the part to persist:
//! `resolve_array(doc, "data.users")`.

use serde_json::Value;
use crate::{Error, Result};
use crate::schema::field::json_kind;

/// Resolve the object at `path`. An empty path resolves to the root.
pub fn resolve_object<'a>(root: &'a Value, path: &str) -> Result<&'a Value> {
    if !root.is_object() {
        return Err(Error::JsonPath(format!("root is {} and not an object", json_kind(root))));
    }
    if path.is_empty() {
        return Ok(root);
    }

    let found = walk(root, path)?;
    match found {
        Value::Object(_) => Ok(found),
        Value::Array(_) => Err(Error::JsonPath(format!(
            "last element on path '{}' is an array and not an object",
            path
        ))),
        other => Err(unsupported(path, other)),
    }
}

/// Resolve the array at `path`. The root can never be an array.
pub fn resolve_array<'a>(root: &'a Value, path: &str) -> Result<&'a Value> {
    if !root.is_object() {
        return Err(Error::JsonPath(format!("root is {} and not an object", json_kind(root))));
    }
    if path.is_empty() {
        return Err(Error::JsonPath("root of a document can never be an array".to_string()));
    }

    let found = walk(root, path)?;
    match found {
        Value::Array(_) => Ok(found),
        Value::Object(_) => Err(Error::JsonPath(format!(
            "last element on path '{}' is an object and not an array",
            path
        ))),
        other => Err(unsupported(path, other)),
    }
}

/// Follow every key of `path` through nested objects
fn walk<'a>(root: &'a Value, path: &str) -> Result<&'a Value> {
    let keys: Vec<&str> = path.trim_end_matches('.').split('.').collect();
    let mut current = root;

    for (index, key) in keys.iter().enumerate() {
        let child = current
            .get(*key)
            .ok_or_else(|| Error::JsonPath(format!("failed to fetch element '{}' on path '{}'", key, path)))?;

        let is_last = index + 1 == keys.len();
        match child {
            Value::Object(_) => current = child,
            _ if is_last => return Ok(child),
            Value::Array(_) => {
                return Err(Error::JsonPath(format!(
                    "array element '{}' is not the last element on path '{}'",
                    key, path
                )));
            }
            other => return Err(unsupported(path, other)),
        }
    }
    Ok(current)
}

fn unsupported(path: &str, value: &Value) -> Error {
    Error::JsonPath(format!("cannot follow path '{}' through {}", path, json_kind(value)))
}
