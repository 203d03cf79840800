//! Configuration model: the raw operator document and the validated policy.
//!
//! The raw document keeps the operator's field names (`Folders`, `DaysToKeep`,
//! `Messgage`, ...) and is kept as an untyped tree so that every field can be
//! checked independently by [`crate::core::validation`]. Only `Folders` is
//! bound to a typed shape at parse time; failing that binding is fatal.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::errors::{CleanerError, Result};

/// Default retention threshold in days.
pub const DEFAULT_DAYS_TO_KEEP: u32 = 7;
/// Default cycle interval (12 hours).
pub const DEFAULT_INTERVAL_MINUTES: u32 = 12 * 60;
/// Default free-space alert threshold in percent.
pub const DEFAULT_FREE_SPACE_ALERT_PERCENT: u8 = 20;
/// Volume used when neither the document nor the environment names one.
pub const FALLBACK_VOLUME_NAME: &str = "C:";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// ──────────────────── field names ────────────────────

/// Top-level fields of the operator document, with their external names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ConfigField {
    Folders,
    DaysToKeep,
    IntervalCycleInMinutes,
    TokenWebHook,
    Message,
    DiscSpaceInPercent,
    DiscName,
    WebhookBaseUrl,
    VolumeMounts,
}

impl ConfigField {
    /// Key as it appears in the operator document.
    ///
    /// `Messgage` is misspelled in deployed configs and must stay that way.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Folders => "Folders",
            Self::DaysToKeep => "DaysToKeep",
            Self::IntervalCycleInMinutes => "IntervalCycleInMinutes",
            Self::TokenWebHook => "TokenWebHook",
            Self::Message => "Messgage",
            Self::DiscSpaceInPercent => "DiscSpaceInPercent",
            Self::DiscName => "DiscName",
            Self::WebhookBaseUrl => "WebhookBaseUrl",
            Self::VolumeMounts => "VolumeMounts",
        }
    }
}

impl std::fmt::Display for ConfigField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// ──────────────────── raw document ────────────────────

/// Serialization format of the operator document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Toml,
}

impl DocumentFormat {
    /// Pick the format from the file extension; anything but `.toml` is JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

/// One sweep root as written in the document: `{ "Path": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSpec {
    #[serde(rename = "Path")]
    pub path: PathBuf,
}

impl FolderSpec {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// The minimal typed shape every document must bind to.
#[derive(Debug, Deserialize)]
struct DocumentShape {
    #[serde(rename = "Folders", default)]
    folders: Option<Vec<FolderSpec>>,
}

/// A parsed, not-yet-validated configuration document.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    fields: Map<String, Value>,
    folders: Vec<FolderSpec>,
    folders_declared: bool,
}

impl ConfigDocument {
    /// Parse raw document text.
    ///
    /// Fails only when the text is not well-formed, the top level is not an
    /// object, or `Folders` is not an array of `{ "Path": string }`.
    pub fn parse(text: &str, format: DocumentFormat) -> Result<Self> {
        let tree: Value = match format {
            DocumentFormat::Json => {
                serde_json::from_str(text).map_err(|error| CleanerError::ConfigParse {
                    context: "json",
                    details: error.to_string(),
                })?
            }
            DocumentFormat::Toml => toml::from_str(text)?,
        };

        let Value::Object(fields) = tree else {
            return Err(CleanerError::ConfigParse {
                context: "document",
                details: format!("top level must be an object, got {}", type_name(&tree)),
            });
        };

        let shape: DocumentShape = serde_json::from_value(Value::Object(fields.clone()))
            .map_err(|error| CleanerError::ConfigParse {
                context: "Folders",
                details: error.to_string(),
            })?;

        Ok(Self {
            folders_declared: shape.folders.is_some(),
            folders: shape.folders.unwrap_or_default(),
            fields,
        })
    }

    /// Read and parse a document from disk, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_config_text(path)?;
        Self::parse(&text, DocumentFormat::from_path(path))
    }

    /// Raw value of a top-level field, if present.
    #[must_use]
    pub fn raw(&self, field: ConfigField) -> Option<&Value> {
        self.fields.get(field.key())
    }

    /// Typed `Folders` binding, in document order.
    #[must_use]
    pub fn folders(&self) -> &[FolderSpec] {
        &self.folders
    }

    /// Whether the document carried a `Folders` key at all.
    #[must_use]
    pub const fn folders_declared(&self) -> bool {
        self.folders_declared
    }
}

/// Read the raw configuration text.
pub fn read_config_text(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(CleanerError::MissingConfig {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| CleanerError::io(path, source))
}

/// Short JSON type label used in diagnostics.
#[must_use]
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ──────────────────── validated policy ────────────────────

/// Webhook token and message, present only when both passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertSettings {
    pub webhook_token: String,
    pub message: String,
}

/// Effective maintenance policy. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyConfig {
    pub roots: Vec<FolderSpec>,
    pub days_to_keep: u32,
    pub interval_minutes: u32,
    pub volume_name: String,
    pub free_space_alert_percent: u8,
    /// `Some` iff alerting is enabled for the lifetime of the process.
    pub alert: Option<AlertSettings>,
    pub webhook_base_url: Option<String>,
    pub volume_mounts: BTreeMap<String, PathBuf>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            days_to_keep: DEFAULT_DAYS_TO_KEEP,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            volume_name: default_volume_name(),
            free_space_alert_percent: DEFAULT_FREE_SPACE_ALERT_PERCENT,
            alert: None,
            webhook_base_url: None,
            volume_mounts: BTreeMap::new(),
        }
    }
}

impl PolicyConfig {
    #[must_use]
    pub const fn alerts_enabled(&self) -> bool {
        self.alert.is_some()
    }

    /// Maximum age an entry may reach before it becomes eligible for deletion.
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(u64::from(self.days_to_keep) * SECONDS_PER_DAY)
    }

    /// Time between cycle starts.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }

    /// Deterministic hash of the effective policy for the start-up log line.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }
}

/// The boot volume: `%SystemDrive%` when it is a 2-character name, else `C:`.
#[must_use]
pub fn default_volume_name() -> String {
    std::env::var("SystemDrive")
        .ok()
        .filter(|drive| drive.chars().count() == 2)
        .unwrap_or_else(|| FALLBACK_VOLUME_NAME.to_string())
}
