//! CCL-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, CleanerError>;

/// Top-level error type for the collector cleaner.
#[derive(Debug, Error)]
pub enum CleanerError {
    #[error("[CCL-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[CCL-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[CCL-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[CCL-2001] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[CCL-2002] unknown volume {volume:?}")]
    UnknownVolume { volume: String },

    #[error("[CCL-2003] volume stats failure for {path}: {details}")]
    VolumeStats { path: PathBuf, details: String },

    #[error("[CCL-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[CCL-3002] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[CCL-3900] runtime failure: {details}")]
    Runtime { details: String },

    #[error("[CCL-4001] webhook endpoint unavailable: {details}")]
    WebhookEndpoint { details: String },

    #[error("[CCL-4002] webhook transport failure: {details}")]
    WebhookTransport { details: String },
}

impl CleanerError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "CCL-1001",
            Self::MissingConfig { .. } => "CCL-1002",
            Self::ConfigParse { .. } => "CCL-1003",
            Self::UnsupportedPlatform { .. } => "CCL-2001",
            Self::UnknownVolume { .. } => "CCL-2002",
            Self::VolumeStats { .. } => "CCL-2003",
            Self::Io { .. } => "CCL-3001",
            Self::Serialization { .. } => "CCL-3002",
            Self::Runtime { .. } => "CCL-3900",
            Self::WebhookEndpoint { .. } => "CCL-4001",
            Self::WebhookTransport { .. } => "CCL-4002",
        }
    }

    /// Whether the failure describes a path that no longer exists.
    ///
    /// Overlapping sweeps may race on the same entry; the loser sees this.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for CleanerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for CleanerError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<ureq::Error> for CleanerError {
    fn from(value: ureq::Error) -> Self {
        Self::WebhookTransport {
            details: value.to_string(),
        }
    }
}
