//! TOML codec. Parses into the same config-document tree as the JSON
//! codecs (tables become objects) so `deep_merge`/`prune` work unchanged.

use super::{Codec, CodecError, Document, require_object};
use serde_json::{Map, Value};
use toml::Value as TomlValue;

pub struct TomlCodec;

impl Codec for TomlCodec {
    fn parse(&self, text: &str) -> Result<Document, CodecError> {
        if text.trim().is_empty() {
            return Ok(super::empty_object());
        }
        let parsed: TomlValue = toml::from_str(text).map_err(|err| CodecError::Parse {
            format: "toml",
            message: err.to_string(),
        })?;
        require_object(toml_to_document(&parsed), "toml")
    }

    fn serialize(&self, doc: &Document) -> Result<String, CodecError> {
        let toml_value = document_to_toml(doc);
        toml::to_string_pretty(&toml_value).map_err(|err| CodecError::Parse {
            format: "toml",
            message: err.to_string(),
        })
    }
}

fn toml_to_document(value: &TomlValue) -> Document {
    match value {
        TomlValue::String(s) => Value::String(s.clone()),
        TomlValue::Integer(i) => Value::Number((*i).into()),
        TomlValue::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        TomlValue::Boolean(b) => Value::Bool(*b),
        TomlValue::Datetime(dt) => Value::String(dt.to_string()),
        TomlValue::Array(items) => Value::Array(items.iter().map(toml_to_document).collect()),
        TomlValue::Table(table) => {
            let mut map = Map::new();
            for (key, value) in table {
                map.insert(key.clone(), toml_to_document(value));
            }
            Value::Object(map)
        }
    }
}

fn document_to_toml(doc: &Document) -> TomlValue {
    match doc {
        Value::Null => TomlValue::String(String::new()),
        Value::Bool(b) => TomlValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                TomlValue::Integer(i)
            } else {
                TomlValue::Float(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => TomlValue::String(s.clone()),
        Value::Array(items) => TomlValue::Array(items.iter().map(document_to_toml).collect()),
        Value::Object(map) => {
            let mut table = toml::map::Map::new();
            for (key, value) in map {
                table.insert(key.clone(), document_to_toml(value));
            }
            TomlValue::Table(table)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tables_into_nested_objects() {
        let text = "[server]\nhost = \"localhost\"\nport = 8080\n";
        let doc = TomlCodec.parse(text).unwrap();
        assert_eq!(doc, json!({"server": {"host": "localhost", "port": 8080}}));
    }

    #[test]
    fn empty_input_parses_to_empty_object() {
        assert_eq!(TomlCodec.parse("").unwrap(), json!({}));
    }

    #[test]
    fn round_trips_through_parse_and_serialize() {
        let original = json!({"a": 1, "b": {"c": "value", "d": true}});
        let text = TomlCodec.serialize(&original).unwrap();
        let parsed = TomlCodec.parse(&text).unwrap();
        assert_eq!(parsed, original);
    }
}
