//! Service lifecycle: bootstrap from the raw document, arm the scheduler,
//! run cycles, stop cleanly.
//!
//! All collaborators live in one [`CleanerContext`] built once at start-up
//! and shared with the cycle thread through an `Arc`. Nothing is global.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::core::config::{ConfigDocument, DocumentFormat, PolicyConfig};
use crate::core::errors::Result;
use crate::core::validation::{ValidatedConfig, ValidationReport, validate};
use crate::daemon::notifications::{AlertDispatcher, AlertOutcome, UreqTransport, WebhookTransport};
use crate::daemon::scheduler::{CycleScheduler, SchedulerState};
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle};
use crate::monitor::disk_space::{DiskCheck, DiskSpaceMonitor};
use crate::platform::pal::Platform;
use crate::scanner::retention::{RetentionSweeper, SweepReport};

/// External collaborators injected at start-up.
#[derive(Clone)]
pub struct ServiceDeps {
    pub logger: ActivityLoggerHandle,
    pub platform: Arc<dyn Platform>,
    pub transport: Arc<dyn WebhookTransport>,
}

impl ServiceDeps {
    /// Host platform plus the real HTTP transport.
    pub fn native(logger: ActivityLoggerHandle) -> Result<Self> {
        Ok(Self {
            logger,
            platform: crate::platform::pal::detect_platform()?,
            transport: Arc::new(UreqTransport::default()),
        })
    }
}

/// What one cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub sweep: SweepReport,
    /// `None` when the disk check failed.
    pub disk: Option<DiskCheck>,
    /// `None` when no alert was attempted.
    pub alert: Option<AlertOutcome>,
    pub duration: Duration,
}

/// Everything a cycle needs.
pub struct CleanerContext {
    policy: PolicyConfig,
    logger: ActivityLoggerHandle,
    sweeper: RetentionSweeper,
    monitor: DiskSpaceMonitor,
    dispatcher: Option<AlertDispatcher>,
}

impl CleanerContext {
    #[must_use]
    pub fn new(policy: PolicyConfig, deps: &ServiceDeps) -> Self {
        let sweeper = RetentionSweeper::from_policy(&policy, deps.logger.clone());
        let monitor = DiskSpaceMonitor::from_policy(Arc::clone(&deps.platform), &policy);
        let dispatcher = policy.alert.clone().map(|settings| {
            AlertDispatcher::new(
                settings,
                policy.webhook_base_url.clone(),
                Arc::clone(&deps.transport),
                deps.logger.clone(),
            )
        });
        Self {
            policy,
            logger: deps.logger.clone(),
            sweeper,
            monitor,
            dispatcher,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Sweep, then check the disk, then alert if needed. Never fails.
    pub fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let sweep = self.sweeper.sweep(&self.policy.roots);
        let (disk, alert) = self.check_disk();

        let duration = started.elapsed();
        self.logger.send(ActivityEvent::CycleCompleted {
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            alert_sent: alert.as_ref().is_some_and(AlertOutcome::is_delivered),
        });
        CycleReport {
            sweep,
            disk,
            alert,
            duration,
        }
    }

    fn check_disk(&self) -> (Option<DiskCheck>, Option<AlertOutcome>) {
        let check = match self.monitor.check() {
            Ok(check) => check,
            Err(err) => {
                self.logger.send(ActivityEvent::DiskCheckFailed {
                    volume: self.monitor.volume_name().to_string(),
                    error_code: err.code().to_string(),
                    error_message: err.to_string(),
                });
                return (None, None);
            }
        };

        if !check.below_threshold {
            self.logger.send(ActivityEvent::DiskSpaceOk {
                volume: check.volume.clone(),
                free_pct: check.free_pct,
                threshold_pct: check.threshold_pct,
            });
            return (Some(check), None);
        }

        self.logger.send(ActivityEvent::DiskSpaceLow {
            volume: check.volume.clone(),
            free_pct: check.free_pct,
            threshold_pct: check.threshold_pct,
            alerting: self.dispatcher.is_some(),
        });
        let alert = self.dispatcher.as_ref().map(AlertDispatcher::dispatch);
        (Some(check), alert)
    }
}

/// Parse and validate a raw document, logging every decision.
///
/// Only a parse failure is returned as an error, after a fatal log entry.
pub fn bootstrap(
    raw: &str,
    format: DocumentFormat,
    logger: &ActivityLoggerHandle,
) -> Result<ValidatedConfig> {
    let doc = ConfigDocument::parse(raw, format).inspect_err(|err| {
        logger.send(ActivityEvent::ConfigInvalid {
            error_code: err.code().to_string(),
            error_message: err.to_string(),
        });
    })?;
    let validated = validate(&doc);
    validated.report.log(logger);
    Ok(validated)
}

/// The running maintenance service.
pub struct CleanerService {
    context: Arc<CleanerContext>,
    report: ValidationReport,
    scheduler: CycleScheduler,
    logger: ActivityLoggerHandle,
    started_at: Instant,
    stopped: AtomicBool,
}

impl CleanerService {
    /// Validate the document, log the effective policy and arm the scheduler.
    ///
    /// Returns `Err` only when the document cannot be parsed; the service
    /// then never reaches the running state.
    pub fn on_start(raw: &str, format: DocumentFormat, deps: ServiceDeps) -> Result<Self> {
        let ValidatedConfig { policy, report } = bootstrap(raw, format, &deps.logger)?;
        let config_hash = policy
            .stable_hash()
            .unwrap_or_else(|err| format!("unavailable ({})", err.code()));

        let context = Arc::new(CleanerContext::new(policy, &deps));
        let scheduler = CycleScheduler::new(context.policy().interval(), deps.logger.clone());

        deps.logger.send(ActivityEvent::ServiceStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash,
            roots: context.policy().roots.len(),
            interval_minutes: context.policy().interval_minutes,
            alerts_enabled: context.policy().alerts_enabled(),
        });

        let cycle_context = Arc::clone(&context);
        scheduler.start(move || {
            cycle_context.run_cycle();
        })?;

        Ok(Self {
            context,
            report,
            scheduler,
            logger: deps.logger,
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        })
    }

    /// Disarm the timer. An in-flight cycle finishes on its own. Idempotent.
    pub fn on_stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.scheduler.stop();
        self.logger.send(ActivityEvent::ServiceStopped {
            reason: "stop requested".to_string(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            cycles_run: self.scheduler.cycles_started(),
        });
    }

    /// Ask for an immediate cycle through the overlap guard.
    pub fn trigger_cycle(&self) -> Result<()> {
        self.scheduler.trigger_now()
    }

    /// Block until no cycle is executing, up to `timeout`.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.scheduler.wait_idle(timeout)
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    #[must_use]
    pub fn policy(&self) -> &PolicyConfig {
        self.context.policy()
    }

    #[must_use]
    pub const fn validation_report(&self) -> &ValidationReport {
        &self.report
    }

    #[must_use]
    pub fn context(&self) -> &Arc<CleanerContext> {
        &self.context
    }
}

impl Drop for CleanerService {
    fn drop(&mut self) {
        self.on_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::notifications::RecordingTransport;
    use crate::platform::pal::MockPlatform;
    use serde_json::json;

    fn deps(
        available: u64,
        transport: Arc<RecordingTransport>,
    ) -> (ServiceDeps, crossbeam_channel::Receiver<ActivityEvent>) {
        let (logger, rx) = ActivityLoggerHandle::capture();
        (
            ServiceDeps {
                logger,
                platform: Arc::new(MockPlatform::single("/mnt/data", 100, available)),
                transport,
            },
            rx,
        )
    }

    fn document(root: &std::path::Path, with_alerts: bool) -> String {
        let mut doc = json!({
            "Folders": [{"Path": root}],
            "DaysToKeep": 7,
            "IntervalCycleInMinutes": 60,
            "DiscName": "D:",
            "DiscSpaceInPercent": 20,
            "VolumeMounts": {"D:": "/mnt/data"}
        });
        if with_alerts {
            doc["TokenWebHook"] = json!("https://chat.example.com/hooks/abc");
            doc["Messgage"] = json!("D: is almost full");
        }
        doc.to_string()
    }

    #[test]
    fn low_space_with_alerts_dispatches_once() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::responding(200));
        let (deps, _rx) = deps(19, transport.clone());
        let validated = bootstrap(&document(dir.path(), true), DocumentFormat::Json, &deps.logger)
            .unwrap();
        let ctx = CleanerContext::new(validated.policy, &deps);

        let report = ctx.run_cycle();
        assert_eq!(report.disk.as_ref().unwrap().free_pct, 19);
        assert_eq!(report.alert, Some(AlertOutcome::Delivered { status: 200 }));
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, r#"{"text":"D: is almost full"}"#);
    }

    #[test]
    fn enough_space_does_not_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::responding(200));
        let (deps, rx) = deps(21, transport.clone());
        let validated = bootstrap(&document(dir.path(), true), DocumentFormat::Json, &deps.logger)
            .unwrap();
        let report = CleanerContext::new(validated.policy, &deps).run_cycle();

        assert!(report.alert.is_none());
        assert!(transport.requests().is_empty());
        assert!(
            rx.try_iter()
                .any(|e| matches!(e, ActivityEvent::DiskSpaceOk { free_pct: 21, .. }))
        );
    }

    #[test]
    fn low_space_without_alerts_is_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::responding(200));
        let (deps, rx) = deps(5, transport.clone());
        let validated = bootstrap(&document(dir.path(), false), DocumentFormat::Json, &deps.logger)
            .unwrap();
        let report = CleanerContext::new(validated.policy, &deps).run_cycle();

        assert!(report.alert.is_none());
        assert!(transport.requests().is_empty());
        assert!(rx.try_iter().any(|e| matches!(
            e,
            ActivityEvent::DiskSpaceLow {
                alerting: false,
                ..
            }
        )));
    }

    #[test]
    fn disk_failure_is_cycle_local() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::responding(200));
        let (mut deps, rx) = deps(5, transport.clone());
        deps.platform = Arc::new(MockPlatform::default());
        let validated = bootstrap(&document(dir.path(), true), DocumentFormat::Json, &deps.logger)
            .unwrap();
        let ctx = CleanerContext::new(validated.policy, &deps);

        let first = ctx.run_cycle();
        let second = ctx.run_cycle();
        assert!(first.disk.is_none() && second.disk.is_none());
        assert!(transport.requests().is_empty());
        let failures = rx
            .try_iter()
            .filter(|e| matches!(e, ActivityEvent::DiskCheckFailed { .. }))
            .count();
        assert_eq!(failures, 2);
    }

    #[test]
    fn malformed_document_is_fatal_and_never_starts() {
        let transport = Arc::new(RecordingTransport::responding(200));
        let (deps, rx) = deps(50, transport);
        let result = CleanerService::on_start("{ nope", DocumentFormat::Json, deps);
        assert!(result.is_err());
        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(e, ActivityEvent::ConfigInvalid { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, ActivityEvent::ServiceStarted { .. })));
    }

    #[test]
    fn start_and_stop_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::responding(200));
        let (deps, rx) = deps(50, transport);
        let service =
            CleanerService::on_start(&document(dir.path(), true), DocumentFormat::Json, deps)
                .unwrap();

        assert_eq!(service.state(), SchedulerState::Running);
        assert_eq!(service.policy().interval_minutes, 60);
        assert!(service.policy().alerts_enabled());

        service.trigger_cycle().unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert!(service.wait_idle(Duration::from_secs(2)));

        service.on_stop();
        service.on_stop();
        assert_eq!(service.state(), SchedulerState::Idle);

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(e, ActivityEvent::ServiceStarted { .. })));
        assert!(events.iter().any(|e| matches!(e, ActivityEvent::CycleCompleted { .. })));
        let stops = events
            .iter()
            .filter(|e| matches!(e, ActivityEvent::ServiceStopped { .. }))
            .count();
        assert_eq!(stops, 1);
    }
}
