//! The tool's own bootstrap settings -- default cache TTLs and the
//! isolated-config root -- distinct from the provider config documents the
//! mutation engine edits. Layered default < global, the same deep merge
//! `configMerge` applies to provider documents, here applied to the tool's
//! own YAML.

use serde_yaml::{Mapping, Value};
use std::env;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug)]
pub enum SettingsError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_yaml::Error },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io { path, source } => {
                write!(f, "failed to read settings at {}: {}", path.display(), source)
            }
            SettingsError::Parse { path, source } => {
                write!(f, "failed to parse settings at {}: {}", path.display(), source)
            }
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SettingsError::Io { source, .. } => Some(source),
            SettingsError::Parse { source, .. } => Some(source),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    merged: Value,
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        let mut merged = Value::Mapping(Mapping::new());
        for path in settings_paths() {
            let value = read_yaml(&path)?;
            merged = merge_values(merged, value);
        }
        Ok(Self { merged })
    }

    pub fn stale_ttl(&self) -> Duration {
        Duration::from_secs(self.get_u64("cache.stale_ttl_secs").unwrap_or(7 * 24 * 3600))
    }

    pub fn fresh_ttl(&self) -> Duration {
        Duration::from_secs(self.get_u64("cache.fresh_ttl_secs").unwrap_or(3600))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64("cache.fetch_timeout_secs").unwrap_or(3))
    }

    pub fn isolated_base_root(&self) -> String {
        self.get_str("isolated.base_root").unwrap_or_else(|| ".poe-code".to_string())
    }

    fn get_str(&self, key: &str) -> Option<String> {
        lookup_value(&self.merged, key).and_then(value_to_string)
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_str(key).and_then(|text| text.parse().ok())
    }
}

fn settings_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let default_path = default_settings_path();
    if default_path.exists() {
        paths.push(default_path);
    }
    let global_path = global_settings_path();
    if global_path.exists() {
        paths.push(global_path);
    }
    paths
}

fn default_settings_path() -> PathBuf {
    if let Ok(path) = env::var("POE_CODE_DEFAULT_SETTINGS") {
        return PathBuf::from(path);
    }
    let manifest_default = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config").join("default.yaml");
    if manifest_default.exists() {
        return manifest_default;
    }
    PathBuf::from("config/default.yaml")
}

fn global_settings_path() -> PathBuf {
    if let Ok(path) = env::var("POE_CODE_GLOBAL_SETTINGS") {
        return PathBuf::from(path);
    }
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config").join("poe-code").join("settings.yaml")
}

fn read_yaml(path: &Path) -> Result<Value, SettingsError> {
    let contents = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_values(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => merge_values(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay_value) => overlay_value,
    }
}

fn lookup_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in key.split('.') {
        let Value::Mapping(map) = current else {
            return None;
        };
        current = map.get(Value::String(part.to_string()))?;
    }
    Some(current)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
