//! YAML codec. Used by the plan-file external collaborator (the Ralph build
//! loop, out of scope here) and by this tool's own layered settings file
//! (`settings.rs`); provides parse/serialize only, no merge/prune callers.

use super::{Codec, CodecError, Document, require_object};

pub struct YamlCodec;

impl Codec for YamlCodec {
    fn parse(&self, text: &str) -> Result<Document, CodecError> {
        if text.trim().is_empty() {
            return Ok(super::empty_object());
        }
        let value: Document = serde_yaml::from_str(text).map_err(|err| CodecError::Parse {
            format: "yaml",
            message: err.to_string(),
        })?;
        require_object(value, "yaml")
    }

    fn serialize(&self, doc: &Document) -> Result<String, CodecError> {
        serde_yaml::to_string(doc).map_err(|err| CodecError::Parse {
            format: "yaml",
            message: err.to_string(),
        })
    }
}
