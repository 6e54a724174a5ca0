//! Mustache-style template renderer. A named registry of bundled templates,
//! rendered with HTML escaping disabled (these are TOML/JSON/text config
//! fragments, not HTML). Uses `handlebars` for the Mustache-compatible
//! `{{variable}}` expansion syntax, the templating crate this pack's sibling
//! repos reach for (no bare-Mustache crate appears in the retrieval pack).

use handlebars::Handlebars;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub enum TemplateError {
    NotFound(String),
    Traversal(String),
    Render { id: String, message: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::NotFound(id) => write!(f, "unknown template: {}", id),
            TemplateError::Traversal(id) => write!(f, "template id is not a safe path: {}", id),
            TemplateError::Render { id, message } => write!(f, "failed to render template {}: {}", id, message),
        }
    }
}

impl Error for TemplateError {}

/// Registry of bundled (string -> text) templates, with an optional
/// on-disk override directory consulted first -- the same
/// override-then-embedded-fallback order this pack's templating code uses
/// for user-customizable prompts.
pub struct TemplateRenderer {
    bundled: BTreeMap<String, String>,
    override_dir: Option<std::path::PathBuf>,
    engine: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new(bundled: BTreeMap<String, String>) -> Self {
        let mut engine = Handlebars::new();
        engine.register_escape_fn(handlebars::no_escape);
        engine.set_strict_mode(false);
        Self { bundled, override_dir: None, engine }
    }

    pub fn with_override_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.override_dir = Some(dir.into());
        self
    }

    fn source_for(&self, id: &str) -> Result<String, TemplateError> {
        if id.contains("..") || Path::new(id).is_absolute() {
            return Err(TemplateError::Traversal(id.to_string()));
        }
        if let Some(dir) = &self.override_dir {
            let candidate = dir.join(id);
            if let Ok(text) = std::fs::read_to_string(&candidate) {
                return Ok(text);
            }
        }
        self.bundled.get(id).cloned().ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    pub fn render<T: Serialize>(&self, id: &str, context: &T) -> Result<String, TemplateError> {
        let source = self.source_for(id)?;
        self.engine
            .render_template(&source, context)
            .map_err(|err| TemplateError::Render { id: id.to_string(), message: err.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn renderer() -> TemplateRenderer {
        let mut bundled = BTreeMap::new();
        bundled.insert("greeting".to_string(), "hello {{name}}".to_string());
        bundled.insert("raw_html".to_string(), "<{{tag}}>".to_string());
        TemplateRenderer::new(bundled)
    }

    #[test]
    fn renders_a_bundled_template() {
        let rendered = renderer().render("greeting", &json!({"name": "poe"})).unwrap();
        assert_eq!(rendered, "hello poe");
    }

    #[test]
    fn html_escaping_is_disabled() {
        let rendered = renderer().render("raw_html", &json!({"tag": "b & i"})).unwrap();
        assert_eq!(rendered, "<b & i>");
    }

    #[test]
    fn unknown_template_id_fails() {
        let err = renderer().render("missing", &json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(id) if id == "missing"));
    }

    #[test]
    fn path_traversal_ids_are_rejected() {
        let err = renderer().render("../../etc/passwd", &json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::Traversal(_)));
    }

    #[test]
    fn absolute_template_ids_are_rejected() {
        let err = renderer().render("/etc/passwd", &json!({})).unwrap_err();
        assert!(matches!(err, TemplateError::Traversal(_)));
    }
}
