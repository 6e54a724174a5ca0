//! The mutation engine: executes an ordered list of typed declarative
//! mutations against the VFS, format codecs, path mapper and template
//! renderer, emitting a per-mutation outcome and honoring dry-run and an
//! observer hook.

pub mod builders;
pub mod lock;

use crate::codec::{Codec, CodecError, Document, json::JsonCodec, jsonc::JsoncCodec, toml::TomlCodec};
use crate::path_mapper::{PathMapper, is_under_home};
use crate::templates::{TemplateError, TemplateRenderer};
use crate::vfs::{Vfs, VfsError};
use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque caller-provided key -> value map, threaded unchanged into every
/// resolver and template context. A provider-defined struct would be
/// preferable per the spec's design notes; this tool has no single
/// provider-defined options shape, so a JSON object is the practical
/// common denominator.
#[derive(Debug, Clone, Default)]
pub struct Options(pub Map<String, Value>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// `Value = Literal(T) | Dynamic(fn(Options) -> T)`, per the spec's design
/// note on function-valued resolvers: mutation builders store either a
/// literal or a closure over the caller's options map.
#[derive(Clone)]
pub enum Resolved<T> {
    Literal(T),
    Dynamic(Arc<dyn Fn(&Options) -> T + Send + Sync>),
}

impl<T: Clone> Resolved<T> {
    pub fn resolve(&self, options: &Options) -> T {
        match self {
            Resolved::Literal(value) => value.clone(),
            Resolved::Dynamic(f) => f(options),
        }
    }
}

impl<T> From<T> for Resolved<T> {
    fn from(value: T) -> Self {
        Resolved::Literal(value)
    }
}

pub type PathResolver = Resolved<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Jsonc,
    Toml,
}

impl ConfigFormat {
    fn codec(self) -> Box<dyn Codec> {
        match self {
            ConfigFormat::Json => Box::new(JsonCodec),
            ConfigFormat::Jsonc => Box::new(JsoncCodec),
            ConfigFormat::Toml => Box::new(TomlCodec),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Jsonc => "jsonc",
            ConfigFormat::Toml => "toml",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoveFileGuards {
    pub when_empty: bool,
    pub when_content_matches: Option<Arc<Regex>>,
}

impl Default for RemoveFileGuards {
    fn default() -> Self {
        Self { when_empty: false, when_content_matches: None }
    }
}

pub struct TransformOutcome {
    pub changed: bool,
    pub content: Option<Document>,
}

pub type TransformFn = Arc<dyn Fn(&Document, &Options) -> TransformOutcome + Send + Sync>;
pub type PredicateFn = Arc<dyn Fn(&Document, &Options) -> bool + Send + Sync>;

pub enum MutationKind {
    EnsureDirectory { path: PathResolver },
    RemoveDirectory { path: PathResolver, force: bool },
    RemoveFile { target: PathResolver, guards: RemoveFileGuards },
    Chmod { target: PathResolver, mode: u32 },
    Backup { target: PathResolver },
    ConfigMerge {
        target: PathResolver,
        format: ConfigFormat,
        value: Resolved<Document>,
        prune_by_prefix: Option<Vec<(String, String)>>,
    },
    ConfigPrune {
        target: PathResolver,
        format: ConfigFormat,
        shape: Document,
        only_if: Option<PredicateFn>,
    },
    ConfigTransform {
        target: PathResolver,
        format: ConfigFormat,
        transform: TransformFn,
    },
    TemplateWrite {
        target: PathResolver,
        template_id: String,
        context: Option<Resolved<Value>>,
    },
    TemplateMergeToml {
        target: PathResolver,
        template_id: String,
        context: Option<Resolved<Value>>,
    },
    TemplateMergeJson {
        target: PathResolver,
        template_id: String,
        context: Option<Resolved<Value>>,
    },
}

impl MutationKind {
    fn label(&self) -> &'static str {
        match self {
            MutationKind::EnsureDirectory { .. } => "ensureDirectory",
            MutationKind::RemoveDirectory { .. } => "removeDirectory",
            MutationKind::RemoveFile { .. } => "removeFile",
            MutationKind::Chmod { .. } => "chmod",
            MutationKind::Backup { .. } => "backup",
            MutationKind::ConfigMerge { .. } => "configMerge",
            MutationKind::ConfigPrune { .. } => "configPrune",
            MutationKind::ConfigTransform { .. } => "configTransform",
            MutationKind::TemplateWrite { .. } => "templateWrite",
            MutationKind::TemplateMergeToml { .. } => "templateMergeToml",
            MutationKind::TemplateMergeJson { .. } => "templateMergeJson",
        }
    }

    fn path_resolver(&self) -> &PathResolver {
        match self {
            MutationKind::EnsureDirectory { path } => path,
            MutationKind::RemoveDirectory { path, .. } => path,
            MutationKind::RemoveFile { target, .. } => target,
            MutationKind::Chmod { target, .. } => target,
            MutationKind::Backup { target } => target,
            MutationKind::ConfigMerge { target, .. } => target,
            MutationKind::ConfigPrune { target, .. } => target,
            MutationKind::ConfigTransform { target, .. } => target,
            MutationKind::TemplateWrite { target, .. } => target,
            MutationKind::TemplateMergeToml { target, .. } => target,
            MutationKind::TemplateMergeJson { target, .. } => target,
        }
    }
}

pub struct Mutation {
    pub kind: MutationKind,
    pub label: Option<String>,
}

impl Mutation {
    pub fn new(kind: MutationKind) -> Self {
        Self { kind, label: None }
    }

    pub fn labeled(kind: MutationKind, label: impl Into<String>) -> Self {
        Self { kind, label: Some(label.into()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Mkdir,
    Delete,
    Chmod,
    Copy,
    Write,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detail {
    Create,
    Update,
    Delete,
    Backup,
    Noop,
}

#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub changed: bool,
    pub effect: Effect,
    pub detail: Detail,
}

impl MutationOutcome {
    fn noop() -> Self {
        Self { changed: false, effect: Effect::None, detail: Detail::Noop }
    }
}

#[derive(Debug, Clone)]
pub struct MutationDetails {
    pub kind: &'static str,
    pub label: Option<String>,
    pub target_path: Option<PathBuf>,
}

#[derive(Debug)]
pub enum MutationError {
    Validation(String),
    Parse(CodecError),
    Template(TemplateError),
    MissingTemplatesLoader,
    Vfs(VfsError),
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationError::Validation(message) => write!(f, "validation error: {}", message),
            MutationError::Parse(source) => write!(f, "{}", source),
            MutationError::Template(source) => write!(f, "{}", source),
            MutationError::MissingTemplatesLoader => {
                write!(f, "mutation requires a templates loader but none was configured")
            }
            MutationError::Vfs(source) => write!(f, "{}", source),
        }
    }
}

impl Error for MutationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MutationError::Parse(source) => Some(source),
            MutationError::Template(source) => Some(source),
            MutationError::Vfs(source) => Some(source),
            _ => None,
        }
    }
}

impl From<CodecError> for MutationError {
    fn from(source: CodecError) -> Self {
        MutationError::Parse(source)
    }
}

impl From<TemplateError> for MutationError {
    fn from(source: TemplateError) -> Self {
        MutationError::Template(source)
    }
}

impl From<VfsError> for MutationError {
    fn from(source: VfsError) -> Self {
        MutationError::Vfs(source)
    }
}

/// `{onStart, onComplete, onError}`, all optional, invoked synchronously
/// from the engine's task. Observers may return an error to abort the run
/// (Rust has no exceptions to throw; the engine treats an observer error
/// exactly like a mutation error).
pub trait Observer: Send + Sync {
    fn on_start(&self, _details: &MutationDetails) -> Result<(), MutationError> {
        Ok(())
    }
    fn on_complete(&self, _details: &MutationDetails, _outcome: &MutationOutcome) -> Result<(), MutationError> {
        Ok(())
    }
    fn on_error(&self, _details: &MutationDetails, _err: &MutationError) {}
}

pub struct MutationContext {
    pub fs: Arc<dyn Vfs>,
    pub home_dir: PathBuf,
    pub dry_run: bool,
    pub path_mapper: Option<Arc<PathMapper>>,
    pub templates: Option<Arc<TemplateRenderer>>,
    pub observer: Option<Arc<dyn Observer>>,
}

impl MutationContext {
    pub fn new(fs: Arc<dyn Vfs>, home_dir: impl Into<PathBuf>) -> Self {
        Self { fs, home_dir: home_dir.into(), dry_run: false, path_mapper: None, templates: None, observer: None }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_path_mapper(mut self, mapper: Arc<PathMapper>) -> Self {
        self.path_mapper = Some(mapper);
        self
    }

    pub fn with_templates(mut self, templates: Arc<TemplateRenderer>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub changed: bool,
    pub effects: Vec<MutationOutcome>,
}

/// `runMutations(list, ctx, options) -> {changed, effects}`. Mutations
/// execute sequentially; `list[i]` fully completes (writes flushed,
/// observers invoked) before `list[i+1]` begins.
pub async fn run_mutations(
    list: &[Mutation],
    ctx: &MutationContext,
    options: &Options,
) -> Result<RunOutcome, MutationError> {
    let mut effects = Vec::with_capacity(list.len());
    let mut changed = false;

    for mutation in list {
        let target_path = resolve_and_validate_path(mutation.kind.path_resolver(), ctx, options)?;
        let details = MutationDetails {
            kind: mutation.kind.label(),
            label: mutation.label.clone(),
            target_path: target_path.clone(),
        };

        if let Some(observer) = &ctx.observer {
            observer.on_start(&details)?;
        }

        let result = dispatch(&mutation.kind, target_path.as_deref(), ctx, options).await;

        match result {
            Ok(outcome) => {
                if outcome.changed {
                    changed = true;
                }
                if let Some(observer) = &ctx.observer {
                    observer.on_complete(&details, &outcome)?;
                }
                effects.push(outcome);
            }
            Err(err) => {
                if let Some(observer) = &ctx.observer {
                    observer.on_error(&details, &err);
                }
                return Err(err);
            }
        }
    }

    Ok(RunOutcome { changed, effects })
}

/// Resolve `~`, then apply the path mapper. A `~`-origin path must remain
/// under `$HOME` after mapping; a literal absolute path with no `~` skips
/// the check (it is not subject to isolation).
fn resolve_and_validate_path(
    resolver: &PathResolver,
    ctx: &MutationContext,
    options: &Options,
) -> Result<Option<PathBuf>, MutationError> {
    let raw = resolver.resolve(options);
    let had_tilde = raw.starts_with('~');
    let expanded = expand_tilde(&raw, &ctx.home_dir);

    let mapped = match &ctx.path_mapper {
        Some(mapper) => mapper.map(&expanded),
        None => Some(expanded.clone()),
    };

    let Some(mapped) = mapped else {
        return Err(MutationError::Validation(format!(
            "isolated config targets must live under the user's home directory: {}",
            expanded.display()
        )));
    };

    if had_tilde && !is_under_home(&mapped, &ctx.home_dir) {
        return Err(MutationError::Validation(format!(
            "isolated config targets must live under the user's home directory: {}",
            mapped.display()
        )));
    }

    Ok(Some(mapped))
}

fn expand_tilde(raw: &str, home_dir: &Path) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        home_dir.join(rest)
    } else if raw == "~" {
        home_dir.to_path_buf()
    } else {
        PathBuf::from(raw)
    }
}

fn backup_timestamp() -> String {
    Utc::now().to_rfc3339().replace([':', '.'], "-")
}

async fn dispatch(
    kind: &MutationKind,
    target: Option<&Path>,
    ctx: &MutationContext,
    options: &Options,
) -> Result<MutationOutcome, MutationError> {
    let target = target.expect("path resolution always yields a path or an error");
    match kind {
        MutationKind::EnsureDirectory { .. } => ensure_directory(target, ctx).await,
        MutationKind::RemoveDirectory { force, .. } => remove_directory(target, *force, ctx).await,
        MutationKind::RemoveFile { guards, .. } => remove_file(target, guards, ctx).await,
        MutationKind::Chmod { mode, .. } => chmod(target, *mode, ctx).await,
        MutationKind::Backup { .. } => backup(target, ctx).await,
        MutationKind::ConfigMerge { format, value, prune_by_prefix, .. } => {
            config_merge(target, *format, &value.resolve(options), prune_by_prefix.as_deref(), ctx).await
        }
        MutationKind::ConfigPrune { format, shape, only_if, .. } => {
            config_prune(target, *format, shape, only_if.as_ref(), ctx, options).await
        }
        MutationKind::ConfigTransform { format, transform, .. } => {
            config_transform(target, *format, transform, ctx, options).await
        }
        MutationKind::TemplateWrite { template_id, context, .. } => {
            let rendered_context = resolve_template_context(context, options);
            template_write(target, template_id, &rendered_context, ctx).await
        }
        MutationKind::TemplateMergeToml { template_id, context, .. } => {
            let rendered_context = resolve_template_context(context, options);
            template_merge(target, template_id, &rendered_context, ConfigFormat::Toml, ctx).await
        }
        MutationKind::TemplateMergeJson { template_id, context, .. } => {
            let rendered_context = resolve_template_context(context, options);
            template_merge(target, template_id, &rendered_context, ConfigFormat::Json, ctx).await
        }
    }
}

fn resolve_template_context(context: &Option<Resolved<Value>>, options: &Options) -> Value {
    match context {
        Some(resolved) => resolved.resolve(options),
        None => Value::Object(options.0.clone()),
    }
}

async fn ensure_directory(target: &Path, ctx: &MutationContext) -> Result<MutationOutcome, MutationError> {
    if ctx.fs.exists(target).await? {
        return Ok(MutationOutcome { changed: false, effect: Effect::Mkdir, detail: Detail::Noop });
    }
    if !ctx.dry_run {
        ctx.fs.mkdir(target, true).await?;
    }
    Ok(MutationOutcome { changed: true, effect: Effect::Mkdir, detail: Detail::Create })
}

async fn remove_directory(target: &Path, force: bool, ctx: &MutationContext) -> Result<MutationOutcome, MutationError> {
    let Ok(stat) = ctx.fs.stat(target).await else {
        return Ok(MutationOutcome::noop());
    };
    if !stat.is_dir {
        return Ok(MutationOutcome::noop());
    }
    if !force {
        let entries = ctx.fs.readdir(target).await.unwrap_or_default();
        if !entries.is_empty() {
            return Ok(MutationOutcome::noop());
        }
    }
    if !ctx.dry_run {
        ctx.fs.rm(target, force).await?;
    }
    Ok(MutationOutcome { changed: true, effect: Effect::Delete, detail: Detail::Delete })
}

async fn remove_file(target: &Path, guards: &RemoveFileGuards, ctx: &MutationContext) -> Result<MutationOutcome, MutationError> {
    let Some(content) = ctx.fs.try_read_file(target).await? else {
        return Ok(MutationOutcome::noop());
    };
    let trimmed = content.trim();
    if guards.when_empty && !trimmed.is_empty() {
        return Ok(MutationOutcome::noop());
    }
    if let Some(pattern) = &guards.when_content_matches {
        if !pattern.is_match(trimmed) {
            return Ok(MutationOutcome::noop());
        }
    }
    if !ctx.dry_run {
        ctx.fs.unlink(target).await?;
    }
    Ok(MutationOutcome { changed: true, effect: Effect::Delete, detail: Detail::Delete })
}

async fn chmod(target: &Path, mode: u32, ctx: &MutationContext) -> Result<MutationOutcome, MutationError> {
    let Ok(stat) = ctx.fs.stat(target).await else {
        return Ok(MutationOutcome::noop());
    };
    if stat.mode == Some(mode) {
        return Ok(MutationOutcome::noop());
    }
    if !ctx.dry_run {
        ctx.fs.chmod(target, mode).await?;
    }
    Ok(MutationOutcome { changed: true, effect: Effect::Chmod, detail: Detail::Update })
}

async fn backup(target: &Path, ctx: &MutationContext) -> Result<MutationOutcome, MutationError> {
    let Some(content) = ctx.fs.try_read_file(target).await? else {
        return Ok(MutationOutcome::noop());
    };
    let backup_path = PathBuf::from(format!("{}.backup-{}", target.display(), backup_timestamp()));
    if !ctx.dry_run {
        ctx.fs.write_file(&backup_path, &content).await?;
    }
    Ok(MutationOutcome { changed: true, effect: Effect::Copy, detail: Detail::Backup })
}

fn quarantine_path(target: &Path, format: ConfigFormat) -> PathBuf {
    PathBuf::from(format!("{}.invalid-{}.{}", target.display(), backup_timestamp(), format.extension()))
}

/// Read+parse with the quarantine-on-failure policy shared by
/// `configMerge`/`configTransform`/template-merge: a parse failure on
/// existing content writes a sideways quarantine copy and proceeds as if
/// the document were empty.
async fn read_with_quarantine(
    target: &Path,
    format: ConfigFormat,
    ctx: &MutationContext,
) -> Result<(Option<String>, Document), MutationError> {
    let codec = format.codec();
    match ctx.fs.try_read_file(target).await? {
        None => Ok((None, crate::codec::empty_object())),
        Some(content) => match codec.parse(&content) {
            Ok(doc) => Ok((Some(content), doc)),
            Err(_) => {
                if !ctx.dry_run {
                    let quarantine = quarantine_path(target, format);
                    ctx.fs.write_file(&quarantine, &content).await?;
                }
                Ok((Some(content), crate::codec::empty_object()))
            }
        },
    }
}

/// Apply the merge patch's top-level keys to `original_text` one at a time
/// via [`crate::codec::jsonc::set_path`] instead of re-rendering the whole
/// document, so comments and untouched keys survive. Falls back to a plain
/// re-render (losing comments) per `set_path`'s own documented fallback when
/// a key's insertion point can't be located surgically.
fn jsonc_surgical_merge(original_text: &str, patch: &Document, merged: &Document) -> Result<String, MutationError> {
    let (Document::Object(patch_map), Document::Object(merged_map)) = (patch, merged) else {
        return Ok(crate::codec::jsonc::replace_whole_document(merged)?);
    };
    let mut text = original_text.to_string();
    for key in patch_map.keys() {
        let Some(new_value) = merged_map.get(key) else { continue };
        text = crate::codec::jsonc::set_path(&text, &[key.as_str()], new_value, merged)?;
    }
    Ok(text)
}

async fn config_merge(
    target: &Path,
    format: ConfigFormat,
    value: &Document,
    prune_by_prefix: Option<&[(String, String)]>,
    ctx: &MutationContext,
) -> Result<MutationOutcome, MutationError> {
    let codec = format.codec();
    let (original_content, current_doc) = read_with_quarantine(target, format, ctx).await?;

    let base = match prune_by_prefix {
        Some(policy) => crate::codec::prune_by_prefix(&current_doc, policy),
        None => current_doc,
    };
    let merged = codec.merge(&base, value);
    let serialized = match (format, &original_content) {
        (ConfigFormat::Jsonc, Some(original_text)) => {
            jsonc_surgical_merge(original_text, value, &merged)?
        }
        _ => codec.serialize(&merged)?,
    };

    if original_content.as_deref() == Some(serialized.as_str()) {
        return Ok(MutationOutcome::noop());
    }

    if !ctx.dry_run {
        ctx.fs.write_file(target, &serialized).await?;
    }
    let detail = if original_content.is_none() { Detail::Create } else { Detail::Update };
    Ok(MutationOutcome { changed: true, effect: Effect::Write, detail })
}

async fn config_prune(
    target: &Path,
    format: ConfigFormat,
    shape: &Document,
    only_if: Option<&PredicateFn>,
    ctx: &MutationContext,
    options: &Options,
) -> Result<MutationOutcome, MutationError> {
    let codec = format.codec();
    let Some(content) = ctx.fs.try_read_file(target).await? else {
        return Ok(MutationOutcome::noop());
    };
    let Ok(doc) = codec.parse(&content) else {
        return Ok(MutationOutcome::noop());
    };
    if let Some(predicate) = only_if {
        if !(predicate.as_ref())(&doc, options) {
            return Ok(MutationOutcome::noop());
        }
    }

    let outcome = codec.prune(&doc, shape);
    if !outcome.changed {
        return Ok(MutationOutcome::noop());
    }

    let is_empty = matches!(&outcome.result, Value::Object(map) if map.is_empty());
    if is_empty {
        if !ctx.dry_run {
            ctx.fs.unlink(target).await?;
        }
        return Ok(MutationOutcome { changed: true, effect: Effect::Delete, detail: Detail::Delete });
    }

    let serialized = codec.serialize(&outcome.result)?;
    if !ctx.dry_run {
        ctx.fs.write_file(target, &serialized).await?;
    }
    Ok(MutationOutcome { changed: true, effect: Effect::Write, detail: Detail::Update })
}

async fn config_transform(
    target: &Path,
    format: ConfigFormat,
    transform: &TransformFn,
    ctx: &MutationContext,
    options: &Options,
) -> Result<MutationOutcome, MutationError> {
    let codec = format.codec();
    let (original_content, doc) = read_with_quarantine(target, format, ctx).await?;
    let result = (transform.as_ref())(&doc, options);

    if !result.changed {
        return Ok(MutationOutcome::noop());
    }

    match result.content {
        None => {
            if original_content.is_some() {
                if !ctx.dry_run {
                    ctx.fs.unlink(target).await?;
                }
                Ok(MutationOutcome { changed: true, effect: Effect::Delete, detail: Detail::Delete })
            } else {
                Ok(MutationOutcome::noop())
            }
        }
        Some(content_doc) => {
            let serialized = codec.serialize(&content_doc)?;
            if !ctx.dry_run {
                ctx.fs.write_file(target, &serialized).await?;
            }
            let detail = if original_content.is_none() { Detail::Create } else { Detail::Update };
            Ok(MutationOutcome { changed: true, effect: Effect::Write, detail })
        }
    }
}

async fn template_write(
    target: &Path,
    template_id: &str,
    context: &Value,
    ctx: &MutationContext,
) -> Result<MutationOutcome, MutationError> {
    let Some(templates) = &ctx.templates else {
        return Err(MutationError::MissingTemplatesLoader);
    };
    let rendered = templates.render(template_id, context)?;
    let existed = ctx.fs.exists(target).await?;
    if !ctx.dry_run {
        ctx.fs.write_file(target, &rendered).await?;
    }
    let detail = if existed { Detail::Update } else { Detail::Create };
    Ok(MutationOutcome { changed: true, effect: Effect::Write, detail })
}

async fn template_merge(
    target: &Path,
    template_id: &str,
    context: &Value,
    format: ConfigFormat,
    ctx: &MutationContext,
) -> Result<MutationOutcome, MutationError> {
    let Some(templates) = &ctx.templates else {
        return Err(MutationError::MissingTemplatesLoader);
    };
    let rendered = templates.render(template_id, context)?;
    let codec = format.codec();
    // A template parse failure is a bug in the template itself, not the
    // user's file: it raises rather than quarantining.
    let rendered_doc = codec.parse(&rendered)?;

    let (original_content, current_doc) = read_with_quarantine(target, format, ctx).await?;
    let merged = codec.merge(&current_doc, &rendered_doc);
    let serialized = codec.serialize(&merged)?;

    if original_content.as_deref() == Some(serialized.as_str()) {
        return Ok(MutationOutcome::noop());
    }
    if !ctx.dry_run {
        ctx.fs.write_file(target, &serialized).await?;
    }
    let detail = if original_content.is_none() { Detail::Create } else { Detail::Update };
    Ok(MutationOutcome { changed: true, effect: Effect::Write, detail })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemFs;
    use serde_json::json;

    fn ctx(fs: MemFs) -> MutationContext {
        MutationContext::new(Arc::new(fs), "/h")
    }

    #[tokio::test]
    async fn merge_creates_file_with_create_detail() {
        let context = ctx(MemFs::new().with_dir("/h"));
        let mutation = Mutation::new(MutationKind::ConfigMerge {
            target: Resolved::Literal("~/.claude.json".to_string()),
            format: ConfigFormat::Json,
            value: Resolved::Literal(json!({"mcpServers": {"s": {"command": "npx"}}})),
            prune_by_prefix: None,
        });
        let outcome = run_mutations(&[mutation], &context, &Options::new()).await.unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.effects[0].detail, Detail::Create);
        let written = context.fs.read_file(Path::new("/h/.claude.json")).await.unwrap();
        assert_eq!(written, "{\n  \"mcpServers\": {\n    \"s\": {\n      \"command\": \"npx\"\n    }\n  }\n}\n");
    }

    #[tokio::test]
    async fn merge_preserves_sibling_keys() {
        let initial = json!({"mcpServers": {"other": {"command": "t"}}, "otherKey": "value"});
        let initial_text = JsonCodec.serialize(&initial).unwrap();
        let context = ctx(MemFs::new().with_dir("/h").with_file("/h/.claude.json", initial_text));
        let mutation = Mutation::new(MutationKind::ConfigMerge {
            target: Resolved::Literal("~/.claude.json".to_string()),
            format: ConfigFormat::Json,
            value: Resolved::Literal(json!({"mcpServers": {"poe-code": {"command": "npx"}}})),
            prune_by_prefix: None,
        });
        run_mutations(&[mutation], &context, &Options::new()).await.unwrap();
        let written = context.fs.read_file(Path::new("/h/.claude.json")).await.unwrap();
        let doc = JsonCodec.parse(&written).unwrap();
        assert_eq!(
            doc,
            json!({"mcpServers": {"other": {"command": "t"}, "poe-code": {"command": "npx"}}, "otherKey": "value"})
        );
    }

    #[tokio::test]
    async fn merge_against_jsonc_preserves_comments_via_surgical_edit() {
        let initial_text = "{\n  // keep this comment\n  \"otherKey\": \"value\"\n}";
        let context = ctx(MemFs::new().with_dir("/h").with_file("/h/.c.jsonc", initial_text));
        let mutation = Mutation::new(MutationKind::ConfigMerge {
            target: Resolved::Literal("~/.c.jsonc".to_string()),
            format: ConfigFormat::Jsonc,
            value: Resolved::Literal(json!({"mcpServers": {"poe-code": {"command": "npx"}}})),
            prune_by_prefix: None,
        });
        run_mutations(&[mutation], &context, &Options::new()).await.unwrap();
        let written = context.fs.read_file(Path::new("/h/.c.jsonc")).await.unwrap();
        assert!(written.contains("// keep this comment"));
        assert!(written.contains("\"otherKey\": \"value\""));
        let doc = crate::codec::jsonc::JsoncCodec.parse(&written).unwrap();
        assert_eq!(
            doc,
            json!({"otherKey": "value", "mcpServers": {"poe-code": {"command": "npx"}}})
        );
    }

    #[tokio::test]
    async fn prune_deletes_file_when_result_is_empty() {
        let context = ctx(MemFs::new().with_dir("/h").with_file("/h/.c.json", "{\"remove\":true}\n"));
        let mutation = Mutation::new(MutationKind::ConfigPrune {
            target: Resolved::Literal("~/.c.json".to_string()),
            format: ConfigFormat::Json,
            shape: json!({"remove": {}}),
            only_if: None,
        });
        let outcome = run_mutations(&[mutation], &context, &Options::new()).await.unwrap();
        assert_eq!(outcome.effects[0].effect, Effect::Delete);
        assert!(!context.fs.exists(Path::new("/h/.c.json")).await.unwrap());
    }

    #[tokio::test]
    async fn dry_run_reports_changes_without_writing() {
        let mut context = ctx(MemFs::new().with_dir("/h"));
        context.dry_run = true;
        let mutation = Mutation::new(MutationKind::ConfigMerge {
            target: Resolved::Literal("~/.claude.json".to_string()),
            format: ConfigFormat::Json,
            value: Resolved::Literal(json!({"a": 1})),
            prune_by_prefix: None,
        });
        let outcome = run_mutations(&[mutation], &context, &Options::new()).await.unwrap();
        assert!(outcome.changed);
        assert!(!context.fs.exists(Path::new("/h/.claude.json")).await.unwrap());
    }

    #[tokio::test]
    async fn dry_run_outcomes_match_normal_run_outcomes() {
        let mutation_factory = || {
            Mutation::new(MutationKind::ConfigMerge {
                target: Resolved::Literal("~/.claude.json".to_string()),
                format: ConfigFormat::Json,
                value: Resolved::Literal(json!({"a": 1})),
                prune_by_prefix: None,
            })
        };

        let dry_ctx = {
            let mut c = ctx(MemFs::new().with_dir("/h"));
            c.dry_run = true;
            c
        };
        let dry_outcome = run_mutations(&[mutation_factory()], &dry_ctx, &Options::new()).await.unwrap();

        let real_ctx = ctx(MemFs::new().with_dir("/h"));
        let real_outcome = run_mutations(&[mutation_factory()], &real_ctx, &Options::new()).await.unwrap();

        assert_eq!(dry_outcome.changed, real_outcome.changed);
        assert_eq!(dry_outcome.effects.len(), real_outcome.effects.len());
        for (a, b) in dry_outcome.effects.iter().zip(real_outcome.effects.iter()) {
            assert_eq!(a.effect, b.effect);
            assert_eq!(a.detail, b.detail);
            assert_eq!(a.changed, b.changed);
        }
    }

    #[tokio::test]
    async fn path_outside_home_fails_validation() {
        let context = ctx(MemFs::new().with_dir("/h"));
        let mutation = Mutation::new(MutationKind::EnsureDirectory {
            path: Resolved::Literal("~/../outside".to_string()),
        });
        let err = run_mutations(&[mutation], &context, &Options::new()).await.unwrap_err();
        assert!(matches!(err, MutationError::Validation(_)));
    }

    #[tokio::test]
    async fn template_write_without_templates_loader_fails_distinctly() {
        let context = ctx(MemFs::new().with_dir("/h"));
        let mutation = Mutation::new(MutationKind::TemplateWrite {
            target: Resolved::Literal("~/.out".to_string()),
            template_id: "foo".to_string(),
            context: None,
        });
        let err = run_mutations(&[mutation], &context, &Options::new()).await.unwrap_err();
        assert!(matches!(err, MutationError::MissingTemplatesLoader));
    }

    #[tokio::test]
    async fn remove_file_guards_require_empty_content() {
        let context = ctx(MemFs::new().with_dir("/h").with_file("/h/.lock", "busy"));
        let mutation = Mutation::new(MutationKind::RemoveFile {
            target: Resolved::Literal("~/.lock".to_string()),
            guards: RemoveFileGuards { when_empty: true, when_content_matches: None },
        });
        let outcome = run_mutations(&[mutation], &context, &Options::new()).await.unwrap();
        assert_eq!(outcome.effects[0].detail, Detail::Noop);
        assert!(context.fs.exists(Path::new("/h/.lock")).await.unwrap());
    }
}
