//! Config file discovery and the per-field precedence rules.

use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_BASENAMES: &[&str] = &["zendesk.config.json", "zendesk.json"];

/// Walk up from `start` looking for `file_name`.
fn find_upwards(start: &Path, file_name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(file_name))
        .find(|candidate| candidate.is_file())
}

/// Explicit path (relative to `cwd`), else the nearest known config file above `cwd`.
pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(crate::paths::normalize_lexically(&cwd.join(path)));
    }
    CONFIG_BASENAMES
        .iter()
        .find_map(|name| find_upwards(cwd, name))
}

/// Nearest ancestor holding a `.git` entry, else `start` itself.
pub fn find_repo_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .unwrap_or(start)
        .to_path_buf()
}

/// Read the config file as a JSON object. A non-object document reads as empty.
pub fn read(path: &Path) -> Result<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    let parsed: Value = serde_json::from_str(&raw).map_err(|e| {
        Error::Config(format!("{} is not valid JSON: {}", path.display(), e))
    })?;
    Ok(match parsed {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

pub(crate) fn truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub(crate) fn parse_number(raw: &str) -> Option<u64> {
    let n: f64 = raw.trim().parse().ok()?;
    if n.is_finite() {
        Some(n.max(0.0).floor() as u64)
    } else {
        None
    }
}

/// Scalar file value as trimmed text; empty, null and container values are absent.
pub(crate) fn scalar(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

/// Environment and file layers beneath the command line.
pub(crate) struct Layers<'a> {
    pub env: &'a HashMap<String, String>,
    pub file: &'a Map<String, Value>,
}

impl Layers<'_> {
    fn env(&self, key: &str) -> Option<String> {
        self.env
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn file(&self, key: &str) -> Option<String> {
        scalar(self.file.get(key))
    }

    pub fn string(&self, cli: Option<&str>, env_key: &str, file_key: &str, fallback: &str) -> String {
        if let Some(value) = cli {
            return value.trim().to_string();
        }
        self.env(env_key)
            .or_else(|| self.file(file_key))
            .unwrap_or_else(|| fallback.trim().to_string())
    }

    /// Unparseable values fall through to the next layer.
    pub fn number(&self, cli: Option<u64>, env_key: &str, file_key: &str, fallback: u64) -> u64 {
        cli.or_else(|| self.env(env_key).and_then(|v| parse_number(&v)))
            .or_else(|| self.file(file_key).and_then(|v| parse_number(&v)))
            .unwrap_or(fallback)
    }

    pub fn flag(&self, cli: Option<bool>, env_key: &str, file_key: &str, fallback: bool) -> bool {
        if let Some(value) = cli {
            return value;
        }
        self.env(env_key)
            .or_else(|| self.file(file_key))
            .map(|v| truthy(&v))
            .unwrap_or(fallback)
    }
}
