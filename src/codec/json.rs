//! Strict JSON codec. Two-space indentation and a trailing newline on
//! serialization, matching what every `configMerge`/`configPrune` target
//! written by this tool looks like on disk.

use super::{Codec, CodecError, Document, require_object};

pub struct JsonCodec;

impl Codec for JsonCodec {
    fn parse(&self, text: &str) -> Result<Document, CodecError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(super::empty_object());
        }
        let value: Document = serde_json::from_str(trimmed).map_err(|err| CodecError::Parse {
            format: "json",
            message: err.to_string(),
        })?;
        require_object(value, "json")
    }

    fn serialize(&self, doc: &Document) -> Result<String, CodecError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        serde::Serialize::serialize(doc, &mut ser).map_err(|err| CodecError::Parse {
            format: "json",
            message: err.to_string(),
        })?;
        let mut text = String::from_utf8(out).expect("serde_json emits valid utf8");
        text.push('\n');
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_input_parses_to_empty_object() {
        assert_eq!(JsonCodec.parse("").unwrap(), json!({}));
        assert_eq!(JsonCodec.parse("null").unwrap(), json!({}));
    }

    #[test]
    fn top_level_non_object_fails() {
        let err = JsonCodec.parse("[1,2,3]").unwrap_err();
        assert!(matches!(err, CodecError::TopLevelNotObject { format: "json" }));
    }

    #[test]
    fn serialize_uses_two_space_indent_and_trailing_newline() {
        let doc = json!({"mcpServers": {"s": {"command": "npx"}}});
        let text = JsonCodec.serialize(&doc).unwrap();
        assert_eq!(text, "{\n  \"mcpServers\": {\n    \"s\": {\n      \"command\": \"npx\"\n    }\n  }\n}\n");
    }

    #[test]
    fn round_trips_through_parse_and_serialize() {
        let original = json!({"a": 1, "b": [1, 2, 3], "c": {"d": null}});
        let text = JsonCodec.serialize(&original).unwrap();
        let parsed = JsonCodec.parse(&text).unwrap();
        assert_eq!(parsed, original);
    }
}
