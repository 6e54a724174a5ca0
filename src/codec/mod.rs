//! Parse/serialize/merge/prune across the on-disk config formats the mutation
//! engine writes: JSON, JSON-with-comments, TOML, YAML.
//!
//! All four codecs agree on one document tree (`Document`) so that the
//! mutation engine can merge and prune without knowing which format produced
//! the value in hand.

pub mod json;
pub mod jsonc;
pub mod toml;
pub mod yaml;

use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;

/// The shared config-document tree. A thin alias over `serde_json::Value`:
/// every codec parses into this shape, so `configMerge`/`configPrune` are
/// written once against `Value` rather than once per format.
pub type Document = Value;

#[derive(Debug)]
pub enum CodecError {
    Parse { format: &'static str, message: String },
    TopLevelNotObject { format: &'static str },
    Io(std::io::Error),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Parse { format, message } => {
                write!(f, "failed to parse {} document: {}", format, message)
            }
            CodecError::TopLevelNotObject { format } => {
                write!(f, "{} document must have an object at the top level", format)
            }
            CodecError::Io(source) => write!(f, "codec io error: {}", source),
        }
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CodecError::Io(source) => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CodecError {
    fn from(source: std::io::Error) -> Self {
        CodecError::Io(source)
    }
}

/// `{changed, result}` pair shared by `prune` across codecs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneOutcome {
    pub changed: bool,
    pub result: Document,
}

/// Deep merge shared by every codec: for each key in `patch`, if both sides
/// are objects recurse, else `patch` wins. Arrays replace wholesale (they are
/// never `Value::Object`, so the "else" branch always takes them). Does not
/// mutate either input.
pub fn deep_merge(base: &Document, patch: &Document) -> Document {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            let mut merged = base_map.clone();
            for (key, patch_value) in patch_map {
                let next = match merged.get(key) {
                    Some(base_value) => deep_merge(base_value, patch_value),
                    None => patch_value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, patch_value) => patch_value.clone(),
    }
}

/// `shape` is a tree whose leaves mean "delete this key regardless of
/// value": an empty object at a leaf position deletes, a non-empty object
/// recurses. After recursion, if the recursive result becomes empty the
/// parent key is deleted too.
pub fn prune(doc: &Document, shape: &Document) -> PruneOutcome {
    let Value::Object(shape_map) = shape else {
        return PruneOutcome { changed: false, result: doc.clone() };
    };
    let Value::Object(doc_map) = doc else {
        return PruneOutcome { changed: false, result: doc.clone() };
    };

    let mut result = doc_map.clone();
    let mut changed = false;

    for (key, shape_value) in shape_map {
        let Some(current) = result.get(key) else {
            continue;
        };
        let is_leaf = matches!(shape_value, Value::Object(m) if m.is_empty());
        if is_leaf {
            result.remove(key);
            changed = true;
            continue;
        }
        let sub = prune(current, shape_value);
        if sub.changed {
            changed = true;
            let became_empty = matches!(&sub.result, Value::Object(m) if m.is_empty());
            if became_empty {
                result.remove(key);
            } else {
                result.insert(key.clone(), sub.result);
            }
        }
    }

    PruneOutcome { changed, result: Value::Object(result) }
}

/// Policy for `configMerge.pruneByPrefix`: for each `(topKey -> prefix)`
/// entry, drop every nested key of `topKey`'s value whose name begins with
/// `prefix`, one level deep only (a deliberate bounded blast radius, not a
/// recursive prune -- see the open-question note in DESIGN.md).
pub fn prune_by_prefix(doc: &Document, policy: &[(String, String)]) -> Document {
    let Value::Object(doc_map) = doc else {
        return doc.clone();
    };
    let mut result = doc_map.clone();
    for (top_key, prefix) in policy {
        let Some(Value::Object(nested)) = result.get(top_key) else {
            continue;
        };
        let mut nested = nested.clone();
        nested.retain(|key, _| !key.starts_with(prefix.as_str()));
        result.insert(top_key.clone(), Value::Object(nested));
    }
    Value::Object(result)
}

/// Every format codec exposes the same four operations against the shared
/// `Document` tree. `merge`/`prune` have one true implementation (above);
/// each codec only needs to supply `parse`/`serialize`.
pub trait Codec {
    fn parse(&self, text: &str) -> Result<Document, CodecError>;
    fn serialize(&self, doc: &Document) -> Result<String, CodecError>;

    fn merge(&self, base: &Document, patch: &Document) -> Document {
        deep_merge(base, patch)
    }

    fn prune(&self, doc: &Document, shape: &Document) -> PruneOutcome {
        prune(doc, shape)
    }
}

/// Empty-input contract shared by JSON-family codecs: empty text or an
/// explicit `null` parses to an empty object rather than failing.
pub(crate) fn empty_object() -> Document {
    Value::Object(Map::new())
}

pub(crate) fn require_object(value: Document, format: &'static str) -> Result<Document, CodecError> {
    if value.is_null() {
        return Ok(empty_object());
    }
    if !value.is_object() {
        return Err(CodecError::TopLevelNotObject { format });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_recurses_into_nested_objects_and_keeps_siblings() {
        let base = json!({"mcpServers": {"other": {"command": "t"}}, "otherKey": "value"});
        let patch = json!({"mcpServers": {"poe-code": {"command": "npx"}}});
        let merged = deep_merge(&base, &patch);
        assert_eq!(
            merged,
            json!({
                "mcpServers": {"other": {"command": "t"}, "poe-code": {"command": "npx"}},
                "otherKey": "value"
            })
        );
    }

    #[test]
    fn deep_merge_replaces_arrays_wholesale() {
        let base = json!({"list": [1, 2, 3]});
        let patch = json!({"list": [9]});
        assert_eq!(deep_merge(&base, &patch), json!({"list": [9]}));
    }

    #[test]
    fn deep_merge_does_not_mutate_inputs() {
        let base = json!({"a": 1});
        let patch = json!({"b": 2});
        let _ = deep_merge(&base, &patch);
        assert_eq!(base, json!({"a": 1}));
        assert_eq!(patch, json!({"b": 2}));
    }

    #[test]
    fn prune_deletes_leaf_and_collapses_empty_parent() {
        let doc = json!({"remove": true});
        let shape = json!({"remove": {}});
        let outcome = prune(&doc, &shape);
        assert!(outcome.changed);
        assert_eq!(outcome.result, json!({}));
    }

    #[test]
    fn prune_preserves_unmatched_keys() {
        let doc = json!({"remove": true, "keep": "value"});
        let shape = json!({"remove": {}});
        let outcome = prune(&doc, &shape);
        assert!(outcome.changed);
        assert_eq!(outcome.result, json!({"keep": "value"}));
    }

    #[test]
    fn prune_is_noop_when_shape_does_not_match() {
        let doc = json!({"keep": "value"});
        let shape = json!({"remove": {}});
        let outcome = prune(&doc, &shape);
        assert!(!outcome.changed);
        assert_eq!(outcome.result, doc);
    }

    #[test]
    fn prune_by_prefix_is_bounded_to_one_level() {
        let doc = json!({"mcpServers": {"poe/a": 1, "poe/b": 2, "other": 3}});
        let policy = vec![("mcpServers".to_string(), "poe/".to_string())];
        let result = prune_by_prefix(&doc, &policy);
        assert_eq!(result, json!({"mcpServers": {"other": 3}}));
    }
}
