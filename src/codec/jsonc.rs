//! JSON-with-comments codec: permits line/block comments and trailing
//! commas on parse, and exposes *surgical edit* primitives that rewrite
//! only the byte range of a targeted key path so comments and surrounding
//! whitespace in the rest of the document survive untouched.
//!
//! Full parse/serialize go through [`jsonc_parser`]; surgical edits walk its
//! position-tracking AST directly rather than the serde-value shortcut.

use super::{Codec, CodecError, Document, require_object};
use jsonc_parser::ast::{ObjectProp, Value as JsoncValue};
use jsonc_parser::common::Ranged;
use jsonc_parser::{CollectOptions, ParseOptions, parse_to_ast};

pub struct JsoncCodec;

impl Codec for JsoncCodec {
    fn parse(&self, text: &str) -> Result<Document, CodecError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(super::empty_object());
        }
        let value = jsonc_parser::parse_to_serde_value(trimmed, &ParseOptions::default())
            .map_err(|err| CodecError::Parse { format: "jsonc", message: err.to_string() })?
            .unwrap_or(Document::Null);
        require_object(value, "jsonc")
    }

    fn serialize(&self, doc: &Document) -> Result<String, CodecError> {
        // No prior text to preserve comments against: fall back to the
        // plain-JSON rendering (the deliberate regression noted in
        // DESIGN.md for documents with no positional history).
        super::json::JsonCodec.serialize(doc)
    }
}

/// Indentation style detected from the first indented line of a document,
/// or the codec's own default (two spaces) for a document with none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indent {
    Tab,
    Spaces(usize),
}

impl Indent {
    pub fn unit(self) -> String {
        match self {
            Indent::Tab => "\t".to_string(),
            Indent::Spaces(n) => " ".repeat(n),
        }
    }
}

impl Default for Indent {
    fn default() -> Self {
        Indent::Spaces(2)
    }
}

/// Scan `text` line by line; the first line whose content starts with
/// whitespace (and isn't blank) determines the style. Falls back to the
/// default of two spaces.
pub fn detect_indent(text: &str) -> Indent {
    for line in text.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('\t') {
            let _ = rest;
            return Indent::Tab;
        }
        if let Some(rest) = line.strip_prefix(' ') {
            let count = 1 + rest.chars().take_while(|c| *c == ' ').count();
            return Indent::Spaces(count);
        }
        break;
    }
    Indent::default()
}

/// Surgically set the value at `path` (a sequence of object keys) inside
/// `original`, preserving every byte outside the targeted range. `fallback`
/// is the fully-merged document to fall back to (losing comments, a
/// deliberate documented regression) when the AST walk cannot locate an
/// insertion point unambiguously -- e.g. `path` walks through a value that
/// isn't an object, or `original` fails to parse at all.
pub fn set_path(
    original: &str,
    path: &[&str],
    new_value: &Document,
    fallback: &Document,
) -> Result<String, CodecError> {
    if path.is_empty() {
        return replace_whole_document(fallback);
    }
    let Ok(parsed) = parse_to_ast(original, &CollectOptions::default(), &ParseOptions::default())
    else {
        return replace_whole_document(fallback);
    };

    let Some(root) = parsed.value else {
        return replace_whole_document(fallback);
    };
    let JsoncValue::Object(root_obj) = root else {
        return replace_whole_document(fallback);
    };

    let indent = detect_indent(original);
    match locate(&root_obj, path, new_value, &indent, 1) {
        Some(edit) => Ok(splice(original, edit.start, edit.end, &edit.replacement)),
        None => replace_whole_document(fallback),
    }
}

struct Edit {
    start: usize,
    end: usize,
    replacement: String,
}

fn locate(
    obj: &jsonc_parser::ast::Object,
    path: &[&str],
    new_value: &Document,
    indent: &Indent,
    depth: usize,
) -> Option<Edit> {
    let (head, rest) = path.split_first()?;
    let existing = obj.properties.iter().find(|p| prop_name(p) == *head);

    if rest.is_empty() {
        return match existing {
            Some(prop) => {
                let range = prop.value.range();
                Some(Edit {
                    start: range.start,
                    end: range.end,
                    replacement: render_inline(new_value, indent, depth),
                })
            }
            None => Some(insert_new_property(obj, head, new_value, indent, depth)),
        };
    }

    match existing {
        Some(prop) => {
            if let JsoncValue::Object(nested) = &prop.value {
                locate(nested, rest, new_value, indent, depth + 1)
            } else {
                None
            }
        }
        None => None,
    }
}

fn insert_new_property(
    obj: &jsonc_parser::ast::Object,
    key: &str,
    value: &Document,
    indent: &Indent,
    depth: usize,
) -> Edit {
    let range = obj.range;
    let insert_at = range.end - 1; // just before the closing brace
    let needs_comma = !obj.properties.is_empty();
    let unit = indent.unit().repeat(depth);
    let mut replacement = String::new();
    if needs_comma {
        replacement.push(',');
    }
    replacement.push('\n');
    replacement.push_str(&unit);
    replacement.push_str(&format!("{:?}", key));
    replacement.push_str(": ");
    replacement.push_str(&render_inline(value, indent, depth));
    replacement.push('\n');
    replacement.push_str(&indent.unit().repeat(depth.saturating_sub(1)));
    Edit { start: insert_at, end: insert_at, replacement }
}

fn render_inline(value: &Document, indent: &Indent, depth: usize) -> String {
    let unit = indent.unit();
    match value {
        Document::Object(map) if !map.is_empty() => {
            let mut out = String::from("{\n");
            let entries: Vec<_> = map.iter().collect();
            for (i, (k, v)) in entries.iter().enumerate() {
                out.push_str(&unit.repeat(depth + 1));
                out.push_str(&format!("{:?}", k));
                out.push_str(": ");
                out.push_str(&render_inline(v, indent, depth + 1));
                if i + 1 != entries.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&unit.repeat(depth));
            out.push('}');
            out
        }
        _ => serde_json::to_string(value).unwrap_or_else(|_| "null".to_string()),
    }
}

fn prop_name<'a>(prop: &'a ObjectProp<'a>) -> &'a str {
    prop.name.as_str()
}

fn splice(original: &str, start: usize, end: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(original.len() + replacement.len());
    out.push_str(&original[..start]);
    out.push_str(replacement);
    out.push_str(&original[end..]);
    out
}

/// The documented fallback when a surgical edit cannot be performed:
/// reformat the whole document, losing comments. Used for documents that
/// have no prior text (first write) or whose AST can't be walked.
pub fn replace_whole_document(doc: &Document) -> Result<String, CodecError> {
    super::json::JsonCodec.serialize(doc)
}
