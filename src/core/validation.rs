//! Per-field configuration validation with independent fallback.
//!
//! Every field is checked by its own function returning a [`FieldOutcome`].
//! A rejected field falls back to its default and never influences any other
//! field. The only coupled pair is `TokenWebHook` + `Messgage`: unless both
//! are accepted, alerting stays off for the lifetime of the process.

#![allow(missing_docs)]

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::config::{
    AlertSettings, ConfigDocument, ConfigField, DEFAULT_DAYS_TO_KEEP,
    DEFAULT_FREE_SPACE_ALERT_PERCENT, DEFAULT_INTERVAL_MINUTES, FolderSpec, PolicyConfig,
    default_volume_name, type_name,
};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, RootCheckPhase};

/// Required length of a volume name such as `C:`.
pub const VOLUME_NAME_LEN: usize = 2;

// ──────────────────── outcomes ────────────────────

/// Why a field value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum FieldProblem {
    #[error("value is missing")]
    Missing,
    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    #[error("value {value} must be greater than zero")]
    NotPositive { value: i128 },
    #[error("value {value} is outside {min}..={max}")]
    OutOfRange { value: i128, min: i128, max: i128 },
    #[error("value is empty or whitespace")]
    Blank,
    #[error("expected exactly {expected} characters, found {found}")]
    WrongLength { expected: usize, found: usize },
    #[error("{details}")]
    Malformed { details: String },
}

/// Result of validating one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum FieldOutcome<T> {
    Accepted(T),
    Defaulted(FieldProblem),
}

impl<T> FieldOutcome<T> {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    #[must_use]
    pub const fn accepted(&self) -> Option<&T> {
        match self {
            Self::Accepted(value) => Some(value),
            Self::Defaulted(_) => None,
        }
    }

    #[must_use]
    pub const fn problem(&self) -> Option<&FieldProblem> {
        match self {
            Self::Accepted(_) => None,
            Self::Defaulted(problem) => Some(problem),
        }
    }

    /// Effective value: the accepted one, or `default` when rejected.
    #[must_use]
    pub fn value_or(&self, default: T) -> T
    where
        T: Clone,
    {
        match self {
            Self::Accepted(value) => value.clone(),
            Self::Defaulted(_) => default,
        }
    }
}

/// Outcome of the `Folders` check. The list itself is always accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RootsCheck {
    pub roots: Vec<FolderSpec>,
    pub missing: Vec<PathBuf>,
    pub duplicates: Vec<PathBuf>,
    pub declared: bool,
}

/// Every validation decision taken for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub roots: RootsCheck,
    pub days_to_keep: FieldOutcome<u32>,
    pub interval_minutes: FieldOutcome<u32>,
    pub webhook_token: FieldOutcome<String>,
    pub alert_message: FieldOutcome<String>,
    pub free_space_alert_percent: FieldOutcome<u8>,
    pub volume_name: FieldOutcome<String>,
    /// `None` when the optional field is absent.
    pub webhook_base_url: Option<FieldOutcome<String>>,
    /// `None` when the optional field is absent.
    pub volume_mounts: Option<FieldOutcome<BTreeMap<String, PathBuf>>>,
}

/// Validated policy plus the decisions that produced it.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub policy: PolicyConfig,
    pub report: ValidationReport,
}

// ──────────────────── entry point ────────────────────

/// Validate every field of `doc` independently and assemble the effective policy.
#[must_use]
pub fn validate(doc: &ConfigDocument) -> ValidatedConfig {
    let report = ValidationReport {
        roots: check_roots(doc),
        days_to_keep: positive_u32(doc.raw(ConfigField::DaysToKeep)),
        interval_minutes: positive_u32(doc.raw(ConfigField::IntervalCycleInMinutes)),
        webhook_token: non_blank_string(doc.raw(ConfigField::TokenWebHook)),
        alert_message: non_blank_string(doc.raw(ConfigField::Message)),
        free_space_alert_percent: exclusive_percent(doc.raw(ConfigField::DiscSpaceInPercent)),
        volume_name: volume_name(doc.raw(ConfigField::DiscName)),
        webhook_base_url: doc.raw(ConfigField::WebhookBaseUrl).map(http_url),
        volume_mounts: doc.raw(ConfigField::VolumeMounts).map(volume_mounts),
    };

    let policy = report.effective_policy();
    ValidatedConfig { policy, report }
}

impl ValidationReport {
    /// Alerting requires both halves of the pair to be accepted.
    #[must_use]
    pub const fn alerts_enabled(&self) -> bool {
        self.webhook_token.is_accepted() && self.alert_message.is_accepted()
    }

    /// Fields that fell back to their default, with the reason.
    #[must_use]
    pub fn defaulted_fields(&self) -> Vec<(ConfigField, &FieldProblem)> {
        let candidates = [
            (ConfigField::DaysToKeep, self.days_to_keep.problem()),
            (
                ConfigField::IntervalCycleInMinutes,
                self.interval_minutes.problem(),
            ),
            (ConfigField::TokenWebHook, self.webhook_token.problem()),
            (ConfigField::Message, self.alert_message.problem()),
            (
                ConfigField::DiscSpaceInPercent,
                self.free_space_alert_percent.problem(),
            ),
            (ConfigField::DiscName, self.volume_name.problem()),
            (
                ConfigField::WebhookBaseUrl,
                self.webhook_base_url.as_ref().and_then(FieldOutcome::problem),
            ),
            (
                ConfigField::VolumeMounts,
                self.volume_mounts.as_ref().and_then(FieldOutcome::problem),
            ),
        ];
        candidates
            .into_iter()
            .filter_map(|(field, problem)| problem.map(|problem| (field, problem)))
            .collect()
    }

    fn effective_policy(&self) -> PolicyConfig {
        let alert = match (self.webhook_token.accepted(), self.alert_message.accepted()) {
            (Some(token), Some(message)) => Some(AlertSettings {
                webhook_token: token.clone(),
                message: message.clone(),
            }),
            _ => None,
        };

        PolicyConfig {
            roots: self.roots.roots.clone(),
            days_to_keep: self.days_to_keep.value_or(DEFAULT_DAYS_TO_KEEP),
            interval_minutes: self.interval_minutes.value_or(DEFAULT_INTERVAL_MINUTES),
            volume_name: self.volume_name.value_or(default_volume_name()),
            free_space_alert_percent: self
                .free_space_alert_percent
                .value_or(DEFAULT_FREE_SPACE_ALERT_PERCENT),
            alert,
            webhook_base_url: self
                .webhook_base_url
                .as_ref()
                .and_then(|outcome| outcome.accepted().cloned()),
            volume_mounts: self
                .volume_mounts
                .as_ref()
                .and_then(|outcome| outcome.accepted().cloned())
                .unwrap_or_default(),
        }
    }

    /// Emit one diagnostic per decision.
    ///
    /// Accepted values go out at debug, fallbacks at error. Token values are
    /// never logged.
    pub fn log(&self, logger: &ActivityLoggerHandle) {
        if !self.roots.declared {
            logger.send(ActivityEvent::FieldDefaulted {
                field: ConfigField::Folders,
                reason: FieldProblem::Missing.to_string(),
                default: "no roots".to_string(),
            });
        }
        for path in &self.roots.duplicates {
            logger.send(ActivityEvent::DuplicateRoot {
                path: path.display().to_string(),
            });
        }
        for path in &self.roots.missing {
            logger.send(ActivityEvent::RootUnavailable {
                path: path.display().to_string(),
                phase: RootCheckPhase::Validation,
            });
        }
        for root in &self.roots.roots {
            if !self.roots.missing.contains(&root.path) {
                logger.send(ActivityEvent::FieldAccepted {
                    field: ConfigField::Folders,
                    value: root.path.display().to_string(),
                });
            }
        }

        log_outcome(
            logger,
            ConfigField::DaysToKeep,
            &self.days_to_keep,
            DEFAULT_DAYS_TO_KEEP,
        );
        log_outcome(
            logger,
            ConfigField::IntervalCycleInMinutes,
            &self.interval_minutes,
            DEFAULT_INTERVAL_MINUTES,
        );
        log_outcome(
            logger,
            ConfigField::DiscSpaceInPercent,
            &self.free_space_alert_percent,
            DEFAULT_FREE_SPACE_ALERT_PERCENT,
        );
        log_outcome(
            logger,
            ConfigField::DiscName,
            &self.volume_name,
            default_volume_name(),
        );

        match &self.webhook_token {
            FieldOutcome::Accepted(_) => logger.send(ActivityEvent::FieldAccepted {
                field: ConfigField::TokenWebHook,
                value: "<set>".to_string(),
            }),
            FieldOutcome::Defaulted(problem) => logger.send(ActivityEvent::FieldDefaulted {
                field: ConfigField::TokenWebHook,
                reason: problem.to_string(),
                default: "alerts disabled".to_string(),
            }),
        }
        log_outcome(
            logger,
            ConfigField::Message,
            &self.alert_message,
            "alerts disabled",
        );
        if !self.alerts_enabled() {
            logger.send(ActivityEvent::AlertsDisabled {
                reason: alert_pair_reason(self),
            });
        }

        if let Some(outcome) = &self.webhook_base_url {
            log_outcome(logger, ConfigField::WebhookBaseUrl, outcome, "none");
        }
        if let Some(outcome) = &self.volume_mounts {
            match outcome {
                FieldOutcome::Accepted(map) => logger.send(ActivityEvent::FieldAccepted {
                    field: ConfigField::VolumeMounts,
                    value: format!("{} mapping(s)", map.len()),
                }),
                FieldOutcome::Defaulted(problem) => logger.send(ActivityEvent::FieldDefaulted {
                    field: ConfigField::VolumeMounts,
                    reason: problem.to_string(),
                    default: "none".to_string(),
                }),
            }
        }
    }
}

fn log_outcome<T: fmt::Display>(
    logger: &ActivityLoggerHandle,
    field: ConfigField,
    outcome: &FieldOutcome<T>,
    default: impl fmt::Display,
) {
    match outcome {
        FieldOutcome::Accepted(value) => logger.send(ActivityEvent::FieldAccepted {
            field,
            value: value.to_string(),
        }),
        FieldOutcome::Defaulted(problem) => logger.send(ActivityEvent::FieldDefaulted {
            field,
            reason: problem.to_string(),
            default: default.to_string(),
        }),
    }
}

fn alert_pair_reason(report: &ValidationReport) -> String {
    let mut parts = Vec::new();
    if let Some(problem) = report.webhook_token.problem() {
        parts.push(format!("{}: {problem}", ConfigField::TokenWebHook));
    }
    if let Some(problem) = report.alert_message.problem() {
        parts.push(format!("{}: {problem}", ConfigField::Message));
    }
    parts.join("; ")
}

// ──────────────────── field checks ────────────────────

fn check_roots(doc: &ConfigDocument) -> RootsCheck {
    let mut seen = HashSet::new();
    let mut check = RootsCheck {
        declared: doc.folders_declared(),
        ..RootsCheck::default()
    };

    for folder in doc.folders() {
        if !seen.insert(folder.path.clone()) {
            check.duplicates.push(folder.path.clone());
            continue;
        }
        if !folder.path.is_dir() {
            check.missing.push(folder.path.clone());
        }
        check.roots.push(folder.clone());
    }
    check
}

fn integer(raw: Option<&Value>) -> Result<i128, FieldProblem> {
    let value = raw.ok_or(FieldProblem::Missing)?;
    let exact = match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        _ => None,
    };
    match exact {
        Some(n) => Ok(n),
        None => Err(FieldProblem::WrongType {
            expected: "integer",
            found: type_name(value),
        }),
    }
}

fn string(raw: Option<&Value>) -> Result<&str, FieldProblem> {
    match raw.ok_or(FieldProblem::Missing)? {
        Value::String(s) => Ok(s.as_str()),
        other => Err(FieldProblem::WrongType {
            expected: "string",
            found: type_name(other),
        }),
    }
}

fn into_outcome<T>(result: Result<T, FieldProblem>) -> FieldOutcome<T> {
    match result {
        Ok(value) => FieldOutcome::Accepted(value),
        Err(problem) => FieldOutcome::Defaulted(problem),
    }
}

/// Integer-typed, strictly positive, fits in `u32`.
#[must_use]
pub fn positive_u32(raw: Option<&Value>) -> FieldOutcome<u32> {
    into_outcome(integer(raw).and_then(|value| {
        if value <= 0 {
            return Err(FieldProblem::NotPositive { value });
        }
        u32::try_from(value).map_err(|_| FieldProblem::OutOfRange {
            value,
            min: 1,
            max: i128::from(u32::MAX),
        })
    }))
}

/// Integer-typed, strictly between 0 and 100.
#[must_use]
pub fn exclusive_percent(raw: Option<&Value>) -> FieldOutcome<u8> {
    into_outcome(integer(raw).and_then(|value| {
        if (1..=99).contains(&value) {
            u8::try_from(value).map_err(|_| FieldProblem::OutOfRange {
                value,
                min: 1,
                max: 99,
            })
        } else {
            Err(FieldProblem::OutOfRange {
                value,
                min: 1,
                max: 99,
            })
        }
    }))
}

/// String-typed and not empty or whitespace-only.
#[must_use]
pub fn non_blank_string(raw: Option<&Value>) -> FieldOutcome<String> {
    into_outcome(string(raw).and_then(|s| {
        if s.trim().is_empty() {
            Err(FieldProblem::Blank)
        } else {
            Ok(s.to_string())
        }
    }))
}

/// Non-blank string of exactly [`VOLUME_NAME_LEN`] characters.
#[must_use]
pub fn volume_name(raw: Option<&Value>) -> FieldOutcome<String> {
    match non_blank_string(raw) {
        FieldOutcome::Accepted(name) => {
            let found = name.chars().count();
            if found == VOLUME_NAME_LEN {
                FieldOutcome::Accepted(name)
            } else {
                FieldOutcome::Defaulted(FieldProblem::WrongLength {
                    expected: VOLUME_NAME_LEN,
                    found,
                })
            }
        }
        rejected @ FieldOutcome::Defaulted(_) => rejected,
    }
}

fn http_url(raw: &Value) -> FieldOutcome<String> {
    match non_blank_string(Some(raw)) {
        FieldOutcome::Accepted(url) => {
            let trimmed = url.trim();
            if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                FieldOutcome::Accepted(trimmed.to_string())
            } else {
                FieldOutcome::Defaulted(FieldProblem::Malformed {
                    details: format!("{trimmed:?} is not an http(s) URL"),
                })
            }
        }
        rejected @ FieldOutcome::Defaulted(_) => rejected,
    }
}

fn volume_mounts(raw: &Value) -> FieldOutcome<BTreeMap<String, PathBuf>> {
    let Value::Object(entries) = raw else {
        return FieldOutcome::Defaulted(FieldProblem::WrongType {
            expected: "object",
            found: type_name(raw),
        });
    };

    let mut map = BTreeMap::new();
    for (name, target) in entries {
        match non_blank_string(Some(target)) {
            FieldOutcome::Accepted(path) => {
                map.insert(name.clone(), PathBuf::from(path));
            }
            FieldOutcome::Defaulted(problem) => {
                return FieldOutcome::Defaulted(FieldProblem::Malformed {
                    details: format!("mount for {name:?}: {problem}"),
                });
            }
        }
    }
    FieldOutcome::Accepted(map)
}
