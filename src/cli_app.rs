//! Top-level CLI definition and dispatch.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use collector_cleaner::core::config::{ConfigField, DocumentFormat, read_config_text};
use collector_cleaner::core::errors::CleanerError;
use collector_cleaner::core::paths::{resolve_config_path, resolve_log_path};
use collector_cleaner::core::validation::{FieldOutcome, ValidatedConfig, ValidationReport};
use collector_cleaner::daemon::notifications::AlertOutcome;
use collector_cleaner::daemon::service::{
    CleanerContext, CleanerService, CycleReport, ServiceDeps, bootstrap,
};
use collector_cleaner::daemon::signals::{SignalHandler, SignalRequest};
use collector_cleaner::logger::activity::{
    ActivityEvent, ActivityLoggerHandle, LoggerConfig, spawn_logger,
};
use collector_cleaner::logger::jsonl::{JsonlConfig, Severity};

/// How long `run` waits for an in-flight cycle after a stop request.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Collector Cleaner: deletes expired collected files and alerts on low disk space.
#[derive(Debug, Parser)]
#[command(
    name = "cclean",
    author,
    version,
    about = "Collector Cleaner - retention sweeps and low-disk alerts",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration document (JSON, or TOML by extension).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Diagnostics log file (JSONL).
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Minimum severity written to the log: debug, info, warning, error, fatal.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "debug")]
    log_level: Severity,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Run the service until SIGTERM/SIGINT (SIGUSR1 triggers a cycle).
    Run,
    /// Validate the configuration and print a per-field report.
    Check,
    /// Validate and run exactly one cycle.
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

const fn output_mode(cli: &Cli) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    }
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Unusable configuration or input.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<CleanerError> for CliError {
    fn from(err: CleanerError) -> Self {
        match err {
            CleanerError::MissingConfig { .. }
            | CleanerError::ConfigParse { .. }
            | CleanerError::InvalidConfig { .. } => Self::User(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Dispatch the parsed command line.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match cli.command {
        Command::Run => run_service(cli),
        Command::Check => run_check(cli),
        Command::Once => run_once(cli),
    }
}

// ──────────────────── shared plumbing ────────────────────

struct LoadedDocument {
    path: PathBuf,
    text: String,
    format: DocumentFormat,
}

fn load_document(cli: &Cli) -> Result<LoadedDocument, CleanerError> {
    let path = resolve_config_path(cli.config.as_deref());
    let text = read_config_text(&path)?;
    Ok(LoadedDocument {
        format: DocumentFormat::from_path(&path),
        path,
        text,
    })
}

fn start_logger(cli: &Cli) -> Result<(ActivityLoggerHandle, JoinHandle<()>), CliError> {
    let config = LoggerConfig {
        jsonl: JsonlConfig {
            path: resolve_log_path(cli.log_file.as_deref()),
            ..JsonlConfig::default()
        },
        min_severity: cli.log_level,
        echo_stderr_min: Some(Severity::Warning),
        ..LoggerConfig::default()
    };
    Ok(spawn_logger(config)?)
}

fn stop_logger(logger: &ActivityLoggerHandle, join: JoinHandle<()>) {
    logger.shutdown();
    let _ = join.join();
}

/// Read the document, logging a fatal entry if it cannot be read.
fn load_logged(cli: &Cli, logger: &ActivityLoggerHandle) -> Result<LoadedDocument, CleanerError> {
    load_document(cli).inspect_err(|err| {
        logger.send(ActivityEvent::ConfigInvalid {
            error_code: err.code().to_string(),
            error_message: err.to_string(),
        });
    })
}

// ──────────────────── run ────────────────────

fn run_service(cli: &Cli) -> Result<(), CliError> {
    let (logger, join) = start_logger(cli)?;
    let result = serve(cli, &logger);
    stop_logger(&logger, join);
    result
}

fn serve(cli: &Cli, logger: &ActivityLoggerHandle) -> Result<(), CliError> {
    let doc = load_logged(cli, logger)?;
    let deps = ServiceDeps::native(logger.clone())?;
    let signals = SignalHandler::new();
    let service = CleanerService::on_start(&doc.text, doc.format, deps)?;

    if output_mode(cli) == OutputMode::Human {
        eprintln!(
            "cclean: running with {} (every {} min, {} root(s)); send SIGUSR1 for an immediate cycle",
            doc.path.display(),
            service.policy().interval_minutes,
            service.policy().roots.len(),
        );
    }

    loop {
        match signals.wait() {
            SignalRequest::Shutdown => break,
            SignalRequest::RunCycle => {
                if let Err(err) = service.trigger_cycle() {
                    eprintln!("cclean: {err}");
                }
            }
        }
    }

    service.on_stop();
    if !service.wait_idle(SHUTDOWN_GRACE) {
        eprintln!("cclean: cycle still running after {SHUTDOWN_GRACE:?}, exiting anyway");
    }
    Ok(())
}

// ──────────────────── check ────────────────────

fn run_check(cli: &Cli) -> Result<(), CliError> {
    let doc = load_document(cli)?;
    let validated = bootstrap(&doc.text, doc.format, &ActivityLoggerHandle::discard())?;

    match output_mode(cli) {
        OutputMode::Human => print_check_report(&doc.path, &validated)?,
        OutputMode::Json => write_json_line(&check_payload(&doc.path, &validated))?,
    }
    Ok(())
}

fn outcome_line<T: std::fmt::Display>(
    out: &mut impl Write,
    field: ConfigField,
    outcome: &FieldOutcome<T>,
    default: &dyn std::fmt::Display,
) -> io::Result<()> {
    match outcome {
        FieldOutcome::Accepted(value) => {
            writeln!(out, "  {} {field} = {value}", "ok".green())
        }
        FieldOutcome::Defaulted(problem) => writeln!(
            out,
            "  {} {field}: {problem}; using {default}",
            "default".yellow()
        ),
    }
}

fn print_check_report(path: &Path, validated: &ValidatedConfig) -> io::Result<()> {
    let report = &validated.report;
    let policy = &validated.policy;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "{} {}", "config".bold(), path.display())?;

    if report.roots.declared {
        for root in &report.roots.roots {
            if report.roots.missing.contains(&root.path) {
                writeln!(
                    out,
                    "  {} Folders: {} does not exist",
                    "missing".yellow(),
                    root.path.display()
                )?;
            } else {
                writeln!(out, "  {} Folders: {}", "ok".green(), root.path.display())?;
            }
        }
        for dup in &report.roots.duplicates {
            writeln!(out, "  {} Folders: duplicate {}", "skip".yellow(), dup.display())?;
        }
    } else {
        writeln!(out, "  {} Folders: not set; nothing will be swept", "default".yellow())?;
    }

    outcome_line(&mut out, ConfigField::DaysToKeep, &report.days_to_keep, &policy.days_to_keep)?;
    outcome_line(
        &mut out,
        ConfigField::IntervalCycleInMinutes,
        &report.interval_minutes,
        &policy.interval_minutes,
    )?;
    outcome_line(
        &mut out,
        ConfigField::DiscSpaceInPercent,
        &report.free_space_alert_percent,
        &policy.free_space_alert_percent,
    )?;
    outcome_line(&mut out, ConfigField::DiscName, &report.volume_name, &policy.volume_name)?;

    let redacted = report.webhook_token.accepted().map(|_| "<set>");
    match redacted {
        Some(marker) => writeln!(
            out,
            "  {} {} = {marker}",
            "ok".green(),
            ConfigField::TokenWebHook
        )?,
        None => outcome_line(
            &mut out,
            ConfigField::TokenWebHook,
            &report.webhook_token,
            &"no alerts",
        )?,
    }
    outcome_line(&mut out, ConfigField::Message, &report.alert_message, &"no alerts")?;
    if let Some(outcome) = &report.webhook_base_url {
        outcome_line(&mut out, ConfigField::WebhookBaseUrl, outcome, &"none")?;
    }
    if let Some(outcome) = &report.volume_mounts {
        match outcome {
            FieldOutcome::Accepted(map) => {
                for (name, target) in map {
                    writeln!(
                        out,
                        "  {} {} {name} -> {}",
                        "ok".green(),
                        ConfigField::VolumeMounts,
                        target.display()
                    )?;
                }
            }
            FieldOutcome::Defaulted(problem) => writeln!(
                out,
                "  {} {}: {problem}; ignored",
                "default".yellow(),
                ConfigField::VolumeMounts
            )?,
        }
    }

    if report.alerts_enabled() {
        writeln!(out, "{} alerts enabled", "alerts".bold())?;
    } else {
        writeln!(out, "{} {}", "alerts".bold(), "disabled".red())?;
    }
    Ok(())
}

fn check_payload(path: &Path, validated: &ValidatedConfig) -> Value {
    let report: &ValidationReport = &validated.report;
    let policy = &validated.policy;
    let defaulted: Vec<Value> = report
        .defaulted_fields()
        .into_iter()
        .map(|(field, problem)| json!({ "field": field.key(), "problem": problem.to_string() }))
        .collect();

    json!({
        "command": "check",
        "config": path.to_string_lossy(),
        "roots": display_paths(policy.roots.iter().map(|r| r.path.as_path())),
        "missing_roots": display_paths(report.roots.missing.iter().map(PathBuf::as_path)),
        "duplicate_roots": display_paths(report.roots.duplicates.iter().map(PathBuf::as_path)),
        "days_to_keep": policy.days_to_keep,
        "interval_minutes": policy.interval_minutes,
        "volume_name": policy.volume_name,
        "free_space_alert_percent": policy.free_space_alert_percent,
        "alerts_enabled": policy.alerts_enabled(),
        "defaulted": defaulted,
    })
}

fn display_paths<'a>(paths: impl Iterator<Item = &'a Path>) -> Vec<String> {
    paths.map(|p| p.to_string_lossy().into_owned()).collect()
}

// ──────────────────── once ────────────────────

fn run_once(cli: &Cli) -> Result<(), CliError> {
    let (logger, join) = start_logger(cli)?;
    let result = once(cli, &logger);
    stop_logger(&logger, join);
    result
}

fn once(cli: &Cli, logger: &ActivityLoggerHandle) -> Result<(), CliError> {
    let doc = load_logged(cli, logger)?;
    let validated = bootstrap(&doc.text, doc.format, logger)?;
    let deps = ServiceDeps::native(logger.clone())?;
    let context = CleanerContext::new(validated.policy, &deps);
    let report = context.run_cycle();

    match output_mode(cli) {
        OutputMode::Human => print_cycle_report(&report)?,
        OutputMode::Json => write_json_line(&cycle_payload(&report))?,
    }
    Ok(())
}

fn print_cycle_report(report: &CycleReport) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let sweep = &report.sweep;
    writeln!(
        out,
        "{} {} deleted, {} failed, {} already gone, {} kept (roots: {} swept, {} skipped)",
        "sweep".bold(),
        sweep.items_deleted,
        sweep.items_failed,
        sweep.items_already_gone,
        sweep.items_kept,
        sweep.roots_swept,
        sweep.roots_skipped,
    )?;
    match &report.disk {
        Some(check) if check.below_threshold => writeln!(
            out,
            "{} {} {}% free, below {}%",
            "disk".bold(),
            check.volume,
            check.free_pct.to_string().as_str().red(),
            check.threshold_pct
        )?,
        Some(check) => writeln!(
            out,
            "{} {} {}% free (threshold {}%)",
            "disk".bold(),
            check.volume,
            check.free_pct.to_string().as_str().green(),
            check.threshold_pct
        )?,
        None => writeln!(out, "{} {}", "disk".bold(), "check failed, see log".red())?,
    }
    let alert = match &report.alert {
        None => "not sent".normal(),
        Some(AlertOutcome::Delivered { status }) => {
            format!("delivered (HTTP {status})").as_str().green()
        }
        Some(AlertOutcome::Rejected { status }) => {
            format!("rejected (HTTP {status})").as_str().red()
        }
        Some(AlertOutcome::Failed { error_message, .. }) => error_message.as_str().red(),
    };
    writeln!(out, "{} {alert}", "alert".bold())
}

fn cycle_payload(report: &CycleReport) -> Value {
    let alert = report.alert.as_ref().map(|outcome| match outcome {
        AlertOutcome::Delivered { status } => {
            json!({ "status": "delivered", "http_status": status })
        }
        AlertOutcome::Rejected { status } => {
            json!({ "status": "rejected", "http_status": status })
        }
        AlertOutcome::Failed {
            error_code,
            error_message,
        } => json!({
            "status": "failed",
            "error_code": error_code,
            "error_message": error_message,
        }),
    });
    json!({
        "command": "once",
        "sweep": {
            "roots_swept": report.sweep.roots_swept,
            "roots_skipped": report.sweep.roots_skipped,
            "deleted": report.sweep.items_deleted,
            "failed": report.sweep.items_failed,
            "already_gone": report.sweep.items_already_gone,
            "kept": report.sweep.items_kept,
        },
        "disk": report.disk,
        "alert": alert,
        "duration_ms": u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
    })
}

fn write_json_line(value: &Value) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
