//! Activity logger: a dedicated thread owning the JSONL writer.
//!
//! All other threads send [`ActivityEvent`]s through a bounded crossbeam
//! channel. `send()` uses `try_send()` so a cycle is never blocked by logging
//! back-pressure; dropped events are counted and reported on the next write.

#![allow(missing_docs)]

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};

use crate::core::config::ConfigField;
use crate::core::errors::{CleanerError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;
/// Minimum time between attempts to return a degraded writer to its primary path.
const RECOVERY_INTERVAL: Duration = Duration::from_secs(60);

// ──────────────────── public event type ────────────────────

/// Where a root was found to be unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootCheckPhase {
    /// Existence check during configuration validation.
    Validation,
    /// Re-check at the start of a sweep.
    Sweep,
}

impl RootCheckPhase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Sweep => "sweep",
        }
    }
}

/// Domain events emitted by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    ServiceStarted {
        version: String,
        config_hash: String,
        roots: usize,
        interval_minutes: u32,
        alerts_enabled: bool,
    },
    ServiceStopped {
        reason: String,
        uptime_secs: u64,
        cycles_run: u64,
    },
    /// The document could not be bound to its minimal shape.
    ConfigInvalid {
        error_code: String,
        error_message: String,
    },
    FieldAccepted {
        field: ConfigField,
        value: String,
    },
    FieldDefaulted {
        field: ConfigField,
        reason: String,
        default: String,
    },
    AlertsDisabled {
        reason: String,
    },
    RootUnavailable {
        path: String,
        phase: RootCheckPhase,
    },
    DuplicateRoot {
        path: String,
    },
    RootEnumerationFailed {
        path: String,
        error_code: String,
        error_message: String,
    },
    ItemDeleted {
        path: String,
        directory: bool,
        age_days: u64,
    },
    ItemAlreadyGone {
        path: String,
    },
    ItemDeleteFailed {
        path: String,
        error_code: String,
        error_message: String,
    },
    SweepCompleted {
        roots_swept: usize,
        roots_skipped: usize,
        deleted: usize,
        failed: usize,
        already_gone: usize,
        kept: usize,
        duration_ms: u64,
    },
    DiskSpaceOk {
        volume: String,
        free_pct: u8,
        threshold_pct: u8,
    },
    DiskSpaceLow {
        volume: String,
        free_pct: u8,
        threshold_pct: u8,
        /// `false` when alerting is disabled and the alert is suppressed.
        alerting: bool,
    },
    DiskCheckFailed {
        volume: String,
        error_code: String,
        error_message: String,
    },
    AlertDelivered {
        status: u16,
    },
    AlertRejected {
        status: u16,
    },
    AlertFailed {
        error_code: String,
        error_message: String,
    },
    CycleSkipped {
        reason: String,
    },
    CycleCompleted {
        duration_ms: u64,
        alert_sent: bool,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

impl ActivityEvent {
    /// Fixed severity of this event.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::FieldAccepted { .. } | Self::ItemAlreadyGone { .. } | Self::Shutdown => {
                Severity::Debug
            }
            Self::ServiceStarted { .. }
            | Self::ServiceStopped { .. }
            | Self::ItemDeleted { .. }
            | Self::SweepCompleted { .. }
            | Self::DiskSpaceOk { .. }
            | Self::AlertDelivered { .. }
            | Self::CycleCompleted { .. } => Severity::Info,
            Self::RootUnavailable { .. }
            | Self::DuplicateRoot { .. }
            | Self::DiskSpaceLow { .. }
            | Self::CycleSkipped { .. } => Severity::Warning,
            Self::FieldDefaulted { .. }
            | Self::AlertsDisabled { .. }
            | Self::RootEnumerationFailed { .. }
            | Self::ItemDeleteFailed { .. }
            | Self::DiskCheckFailed { .. }
            | Self::AlertRejected { .. }
            | Self::AlertFailed { .. } => Severity::Error,
            Self::ConfigInvalid { .. } => Severity::Fatal,
        }
    }

    /// One-line human summary, used for the stderr echo.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::ServiceStarted {
                version,
                config_hash,
                roots,
                interval_minutes,
                alerts_enabled,
            } => format!(
                "service started v{version} config={config_hash} roots={roots} \
                 interval={interval_minutes}m alerts={alerts_enabled}"
            ),
            Self::ServiceStopped {
                reason,
                uptime_secs,
                cycles_run,
            } => format!("service stopped ({reason}) after {uptime_secs}s, {cycles_run} cycle(s)"),
            Self::ConfigInvalid {
                error_code,
                error_message,
            } => format!("configuration rejected [{error_code}]: {error_message}"),
            Self::FieldAccepted { field, value } => format!("{field} accepted: {value}"),
            Self::FieldDefaulted {
                field,
                reason,
                default,
            } => format!("{field} invalid ({reason}); using {default}"),
            Self::AlertsDisabled { reason } => format!("alerting disabled: {reason}"),
            Self::RootUnavailable { path, phase } => {
                format!("root {path} does not exist ({})", phase.as_str())
            }
            Self::DuplicateRoot { path } => format!("duplicate root {path} ignored"),
            Self::RootEnumerationFailed {
                path,
                error_message,
                ..
            } => format!("cannot list {path}: {error_message}"),
            Self::ItemDeleted {
                path,
                directory,
                age_days,
            } => {
                let kind = if *directory { "directory" } else { "file" };
                format!("deleted {kind} {path} ({age_days} days old)")
            }
            Self::ItemAlreadyGone { path } => format!("{path} already gone"),
            Self::ItemDeleteFailed {
                path,
                error_message,
                ..
            } => format!("failed to delete {path}: {error_message}"),
            Self::SweepCompleted {
                roots_swept,
                roots_skipped,
                deleted,
                failed,
                already_gone,
                kept,
                duration_ms,
            } => format!(
                "sweep done in {duration_ms}ms: roots {roots_swept} swept/{roots_skipped} skipped, \
                 {deleted} deleted, {failed} failed, {already_gone} gone, {kept} kept"
            ),
            Self::DiskSpaceOk {
                volume,
                free_pct,
                threshold_pct,
            } => format!("{volume} has {free_pct}% free (threshold {threshold_pct}%)"),
            Self::DiskSpaceLow {
                volume,
                free_pct,
                threshold_pct,
                alerting,
            } => {
                let action = if *alerting {
                    "sending alert"
                } else {
                    "alert suppressed"
                };
                format!("{volume} low on space: {free_pct}% free < {threshold_pct}%, {action}")
            }
            Self::DiskCheckFailed {
                volume,
                error_message,
                ..
            } => format!("disk check for {volume} failed: {error_message}"),
            Self::AlertDelivered { status } => format!("alert delivered (HTTP {status})"),
            Self::AlertRejected { status } => format!("alert rejected (HTTP {status})"),
            Self::AlertFailed { error_message, .. } => format!("alert failed: {error_message}"),
            Self::CycleSkipped { reason } => format!("cycle skipped: {reason}"),
            Self::CycleCompleted {
                duration_ms,
                alert_sent,
            } => format!("cycle completed in {duration_ms}ms (alert sent: {alert_sent})"),
            Self::Shutdown => "logger shutdown".to_string(),
        }
    }

    /// Convenience constructor for failures carrying a [`CleanerError`].
    #[must_use]
    pub fn delete_failed(path: impl Into<String>, error: &CleanerError) -> Self {
        Self::ItemDeleteFailed {
            path: path.into(),
            error_code: error.code().to_string(),
            error_message: error.to_string(),
        }
    }
}

// ──────────────────── public handle ────────────────────

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Debug, Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Send an event to the logger thread. Non-blocking.
    ///
    /// If the channel is full the event is dropped and counted.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
        // Disconnected is fine during shutdown.
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// Handle whose events are delivered to the returned receiver.
    ///
    /// Used by tests to inspect emitted events.
    #[must_use]
    pub fn capture() -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = unbounded();
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Handle that silently drops every event.
    #[must_use]
    pub fn discard() -> Self {
        let (handle, _rx) = Self::capture();
        handle
    }
}

// ──────────────────── configuration ────────────────────

/// Options for the logger thread.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub jsonl: JsonlConfig,
    /// Events below this severity are not written.
    pub min_severity: Severity,
    /// Events at or above this severity are echoed to stderr. `None` disables.
    pub echo_stderr_min: Option<Severity>,
    pub channel_capacity: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            jsonl: JsonlConfig::default(),
            min_severity: Severity::Debug,
            echo_stderr_min: Some(Severity::Warning),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread and return a handle.
///
/// The thread runs until `handle.shutdown()` is called or all senders drop.
pub fn spawn_logger(
    config: LoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("ccl-logger".to_string())
        .spawn(move || logger_thread_main(&rx, config, &dropped_clone))
        .map_err(|e| CleanerError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

fn logger_thread_main(rx: &Receiver<ActivityEvent>, config: LoggerConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(config.jsonl);

    while let Ok(event) = rx.recv() {
        jsonl.recover_if_due(RECOVERY_INTERVAL);

        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::LoggerDrop, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }

        let severity = event.severity();
        if config.echo_stderr_min.is_some_and(|min| severity >= min) {
            let _ = writeln!(
                io::stderr(),
                "[CCL-{}] {}",
                severity.as_str().to_ascii_uppercase(),
                event.summary()
            );
        }
        if severity >= config.min_severity {
            jsonl.write_entry(&event_to_log_entry(&event));
        }
        if severity >= Severity::Error {
            jsonl.flush();
        }
    }

    jsonl.flush();
    jsonl.fsync();
}

// ──────────────────── event conversion ────────────────────

#[allow(clippy::too_many_lines)]
fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    let severity = event.severity();
    match event {
        ActivityEvent::ServiceStarted {
            version,
            config_hash,
            ..
        } => {
            let mut e = LogEntry::new(EventType::ServiceStart, severity);
            e.details = Some(format!("version={version} config_hash={config_hash}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::ServiceStopped {
            reason,
            uptime_secs,
            cycles_run,
        } => {
            let mut e = LogEntry::new(EventType::ServiceStop, severity);
            e.details = Some(format!(
                "reason={reason} uptime={uptime_secs}s cycles={cycles_run}"
            ));
            e.ok = Some(true);
            e
        }
        ActivityEvent::ConfigInvalid {
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::ConfigFatal, severity);
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::FieldAccepted { field, value } => {
            let mut e = LogEntry::new(EventType::ConfigField, severity);
            e.field = Some(field.key().to_string());
            e.ok = Some(true);
            e.details = Some(value.clone());
            e
        }
        ActivityEvent::FieldDefaulted {
            field,
            reason,
            default,
        } => {
            let mut e = LogEntry::new(EventType::ConfigField, severity);
            e.field = Some(field.key().to_string());
            e.ok = Some(false);
            e.error_message = Some(reason.clone());
            e.details = Some(format!("default={default}"));
            e
        }
        ActivityEvent::AlertsDisabled { reason } => {
            let mut e = LogEntry::new(EventType::ConfigAlerts, severity);
            e.ok = Some(false);
            e.error_message = Some(reason.clone());
            e
        }
        ActivityEvent::RootUnavailable { path, phase } => {
            let mut e = LogEntry::new(EventType::RootSkip, severity);
            e.path = Some(path.clone());
            e.details = Some(format!("missing during {}", phase.as_str()));
            e
        }
        ActivityEvent::DuplicateRoot { path } => {
            let mut e = LogEntry::new(EventType::RootSkip, severity);
            e.field = Some(ConfigField::Folders.key().to_string());
            e.path = Some(path.clone());
            e.details = Some("duplicate".to_string());
            e
        }
        ActivityEvent::RootEnumerationFailed {
            path,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::RootSkip, severity);
            e.path = Some(path.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::ItemDeleted {
            path,
            directory,
            age_days,
        } => {
            let mut e = LogEntry::new(EventType::ItemDelete, severity);
            e.path = Some(path.clone());
            e.ok = Some(true);
            e.details = Some(format!(
                "kind={} age_days={age_days}",
                if *directory { "directory" } else { "file" }
            ));
            e
        }
        ActivityEvent::ItemAlreadyGone { path } => {
            let mut e = LogEntry::new(EventType::ItemDelete, severity);
            e.path = Some(path.clone());
            e.ok = Some(true);
            e.details = Some("already gone".to_string());
            e
        }
        ActivityEvent::ItemDeleteFailed {
            path,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::ItemDelete, severity);
            e.path = Some(path.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::SweepCompleted {
            roots_swept,
            roots_skipped,
            deleted,
            failed,
            already_gone,
            kept,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::SweepComplete, severity);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(*failed == 0);
            e.details = Some(format!(
                "roots_swept={roots_swept} roots_skipped={roots_skipped} deleted={deleted} \
                 failed={failed} already_gone={already_gone} kept={kept}"
            ));
            e
        }
        ActivityEvent::DiskSpaceOk {
            volume,
            free_pct,
            threshold_pct,
        } => {
            let mut e = LogEntry::new(EventType::DiskCheck, severity);
            e.volume = Some(volume.clone());
            e.free_pct = Some(*free_pct);
            e.threshold_pct = Some(*threshold_pct);
            e.ok = Some(true);
            e
        }
        ActivityEvent::DiskSpaceLow {
            volume,
            free_pct,
            threshold_pct,
            alerting,
        } => {
            let mut e = LogEntry::new(EventType::DiskCheck, severity);
            e.volume = Some(volume.clone());
            e.free_pct = Some(*free_pct);
            e.threshold_pct = Some(*threshold_pct);
            e.ok = Some(true);
            e.details = Some(if *alerting {
                "below threshold".to_string()
            } else {
                "below threshold, alert suppressed".to_string()
            });
            e
        }
        ActivityEvent::DiskCheckFailed {
            volume,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::DiskCheck, severity);
            e.volume = Some(volume.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::AlertDelivered { status } => {
            let mut e = LogEntry::new(EventType::AlertSend, severity);
            e.status = Some(*status);
            e.ok = Some(true);
            e
        }
        ActivityEvent::AlertRejected { status } => {
            let mut e = LogEntry::new(EventType::AlertSend, severity);
            e.status = Some(*status);
            e.ok = Some(false);
            e
        }
        ActivityEvent::AlertFailed {
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::AlertSend, severity);
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::CycleSkipped { reason } => {
            let mut e = LogEntry::new(EventType::CycleSkip, severity);
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::CycleCompleted {
            duration_ms,
            alert_sent,
        } => {
            let mut e = LogEntry::new(EventType::CycleComplete, severity);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e.details = Some(format!("alert_sent={alert_sent}"));
            e
        }
        ActivityEvent::Shutdown => LogEntry::new(EventType::ServiceStop, severity),
    }
}

// ──────────────────── tests ────────────────────
