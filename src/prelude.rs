//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use collector_cleaner::prelude::*;
//! ```

// Core
pub use crate::core::config::{ConfigDocument, DocumentFormat, FolderSpec, PolicyConfig};
pub use crate::core::errors::{CleanerError, Result};
pub use crate::core::validation::{FieldOutcome, ValidatedConfig, ValidationReport, validate};

// Logging
pub use crate::logger::activity::{
    ActivityEvent, ActivityLoggerHandle, LoggerConfig, spawn_logger,
};
pub use crate::logger::jsonl::Severity;

// Platform
pub use crate::platform::pal::{MockPlatform, Platform, VolumeStats, detect_platform};

// Monitor
pub use crate::monitor::disk_space::{DiskCheck, DiskSpaceMonitor};

// Scanner
pub use crate::scanner::retention::{RetentionSweeper, SweepReport};

// Service
pub use crate::daemon::notifications::{
    AlertDispatcher, AlertOutcome, RecordingTransport, UreqTransport, WebhookTransport,
};
pub use crate::daemon::scheduler::{CycleScheduler, SchedulerState};
pub use crate::daemon::service::{CleanerContext, CleanerService, CycleReport, ServiceDeps};
