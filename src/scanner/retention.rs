//! Retention sweep: delete immediate children of each root that are older
//! than the retention threshold.
//!
//! Only the first level of each root is considered. A child directory is an
//! atomic candidate and is removed recursively when expired; the root itself
//! is never removed. Every failure is logged and the sweep moves on.

#![allow(missing_docs)]

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime};

use crate::core::config::{FolderSpec, PolicyConfig};
use crate::core::errors::CleanerError;
use crate::logger::activity::{ActivityEvent, ActivityLoggerHandle, RootCheckPhase};
use crate::scanner::deletion::{DeleteOutcome, EntryKind, delete_entry};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Counters for one sweep over all roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub roots_swept: usize,
    pub roots_skipped: usize,
    pub items_deleted: usize,
    pub items_failed: usize,
    pub items_already_gone: usize,
    pub items_kept: usize,
    pub duration: Duration,
}

impl SweepReport {
    fn completed_event(&self) -> ActivityEvent {
        ActivityEvent::SweepCompleted {
            roots_swept: self.roots_swept,
            roots_skipped: self.roots_skipped,
            deleted: self.items_deleted,
            failed: self.items_failed,
            already_gone: self.items_already_gone,
            kept: self.items_kept,
            duration_ms: u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Age of an entry at `now`. Timestamps in the future count as zero.
#[must_use]
pub fn entry_age(created: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(created).unwrap_or(Duration::ZERO)
}

/// Strictly older than the retention window. An age equal to it is kept.
#[must_use]
pub fn is_expired(age: Duration, retention: Duration) -> bool {
    age > retention
}

/// Creation time, falling back to modification time where birth time is
/// unavailable.
pub fn entry_timestamp(meta: &fs::Metadata) -> std::io::Result<SystemTime> {
    meta.created().or_else(|_| meta.modified())
}

/// Deletes expired first-level entries under each configured root.
pub struct RetentionSweeper {
    retention: Duration,
    logger: ActivityLoggerHandle,
}

impl RetentionSweeper {
    #[must_use]
    pub fn new(retention: Duration, logger: ActivityLoggerHandle) -> Self {
        Self { retention, logger }
    }

    #[must_use]
    pub fn from_policy(policy: &PolicyConfig, logger: ActivityLoggerHandle) -> Self {
        Self::new(policy.retention(), logger)
    }

    #[must_use]
    pub const fn retention(&self) -> Duration {
        self.retention
    }

    /// Sweep every root in order using the current wall-clock time.
    pub fn sweep(&self, roots: &[FolderSpec]) -> SweepReport {
        self.sweep_at(roots, SystemTime::now())
    }

    /// Sweep with an explicit reference time.
    pub fn sweep_at(&self, roots: &[FolderSpec], now: SystemTime) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::default();

        for root in roots {
            if !root.path.is_dir() {
                self.logger.send(ActivityEvent::RootUnavailable {
                    path: root.path.display().to_string(),
                    phase: RootCheckPhase::Sweep,
                });
                report.roots_skipped += 1;
                continue;
            }
            if self.sweep_root(&root.path, now, &mut report) {
                report.roots_swept += 1;
            } else {
                report.roots_skipped += 1;
            }
        }

        report.duration = started.elapsed();
        self.logger.send(report.completed_event());
        report
    }

    /// Returns `false` when the root could not be listed at all.
    fn sweep_root(&self, root: &Path, now: SystemTime, report: &mut SweepReport) -> bool {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                self.log_enumeration_failure(root, &CleanerError::io(root, e));
                return false;
            }
        };

        for entry in entries {
            match entry {
                Ok(entry) => self.consider(&entry.path(), now, report),
                Err(e) => self.log_enumeration_failure(root, &CleanerError::io(root, e)),
            }
        }
        true
    }

    fn consider(&self, path: &Path, now: SystemTime, report: &mut SweepReport) {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(e) => {
                let outcome = DeleteOutcome::Failed(CleanerError::io(path, e));
                self.record_outcome(path, false, 0, outcome, report);
                return;
            }
        };
        let kind = EntryKind::from_metadata(&meta);
        let timestamp = match entry_timestamp(&meta) {
            Ok(ts) => ts,
            Err(e) => {
                self.record_outcome(
                    path,
                    kind.is_dir(),
                    0,
                    DeleteOutcome::Failed(CleanerError::io(path, e)),
                    report,
                );
                return;
            }
        };

        let age = entry_age(timestamp, now);
        if !is_expired(age, self.retention) {
            report.items_kept += 1;
            return;
        }

        let outcome = delete_entry(path, kind);
        let age_days = age.as_secs() / SECONDS_PER_DAY;
        self.record_outcome(path, kind.is_dir(), age_days, outcome, report);
    }

    fn record_outcome(
        &self,
        path: &Path,
        directory: bool,
        age_days: u64,
        outcome: DeleteOutcome,
        report: &mut SweepReport,
    ) {
        let display = path.display().to_string();
        match outcome {
            DeleteOutcome::Deleted => {
                report.items_deleted += 1;
                self.logger.send(ActivityEvent::ItemDeleted {
                    path: display,
                    directory,
                    age_days,
                });
            }
            DeleteOutcome::AlreadyGone => {
                report.items_already_gone += 1;
                self.logger.send(ActivityEvent::ItemAlreadyGone { path: display });
            }
            DeleteOutcome::Failed(err) if err.is_not_found() => {
                report.items_already_gone += 1;
                self.logger.send(ActivityEvent::ItemAlreadyGone { path: display });
            }
            DeleteOutcome::Failed(err) => {
                report.items_failed += 1;
                self.logger.send(ActivityEvent::delete_failed(display, &err));
            }
        }
    }

    fn log_enumeration_failure(&self, root: &Path, err: &CleanerError) {
        self.logger.send(ActivityEvent::RootEnumerationFailed {
            path: root.display().to_string(),
            error_code: err.code().to_string(),
            error_message: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(SECONDS_PER_DAY);

    fn sweeper(days: u64) -> (RetentionSweeper, crossbeam_channel::Receiver<ActivityEvent>) {
        let (logger, rx) = ActivityLoggerHandle::capture();
        (RetentionSweeper::new(DAY * u32::try_from(days).unwrap(), logger), rx)
    }

    /// Reference time `days` after the entry's actual creation.
    fn days_later(path: &Path, days: u64) -> SystemTime {
        let meta = fs::symlink_metadata(path).unwrap();
        entry_timestamp(&meta).unwrap() + DAY * u32::try_from(days).unwrap()
    }

    #[test]
    fn age_boundaries() {
        let retention = DAY * 3;
        assert!(!is_expired(DAY * 3, retention));
        assert!(is_expired(DAY * 3 + Duration::from_secs(1), retention));
        assert!(!is_expired(DAY * 2, retention));
    }

    #[test]
    fn future_timestamp_counts_as_zero_age() {
        let now = SystemTime::now();
        assert_eq!(entry_age(now + DAY, now), Duration::ZERO);
        assert_eq!(entry_age(now - DAY, now), DAY);
    }

    #[test]
    fn item_older_than_threshold_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.csv");
        fs::write(&file, b"x").unwrap();
        let now = days_later(&file, 5) + Duration::from_secs(60);

        let (sweeper, _rx) = sweeper(4);
        let report = sweeper.sweep_at(&[FolderSpec::new(dir.path())], now);
        assert_eq!(report.items_deleted, 1);
        assert!(!file.exists());
        assert!(dir.path().exists(), "root itself must survive");
    }

    #[test]
    fn item_younger_than_threshold_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.csv");
        fs::write(&file, b"x").unwrap();
        let now = days_later(&file, 5) + Duration::from_secs(60);

        let (sweeper, _rx) = sweeper(6);
        let report = sweeper.sweep_at(&[FolderSpec::new(dir.path())], now);
        assert_eq!(report.items_deleted, 0);
        assert_eq!(report.items_kept, 1);
        assert!(file.exists());
    }

    #[test]
    fn age_exactly_at_threshold_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("edge.log");
        fs::write(&file, b"x").unwrap();
        let now = days_later(&file, 5);

        let (sweeper, _rx) = sweeper(5);
        let report = sweeper.sweep_at(&[FolderSpec::new(dir.path())], now);
        assert_eq!(report.items_kept, 1);
        assert!(file.exists());
    }

    #[test]
    fn old_directory_is_removed_recursively_without_descending() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("2024-01-01");
        fs::create_dir_all(sub.join("nested")).unwrap();
        fs::write(sub.join("nested").join("dump.bin"), b"data").unwrap();
        let now = days_later(&sub, 10);

        let (sweeper, rx) = sweeper(7);
        let report = sweeper.sweep_at(&[FolderSpec::new(dir.path())], now);
        assert_eq!(report.items_deleted, 1, "directory is one candidate");
        assert!(!sub.exists());

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            ActivityEvent::ItemDeleted { directory: true, age_days: 10, .. }
        )));
    }

    #[test]
    fn missing_root_is_skipped_and_later_roots_still_swept() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("old.txt");
        fs::write(&file, b"x").unwrap();
        let now = days_later(&file, 30);

        let (sweeper, rx) = sweeper(7);
        let roots = [
            FolderSpec::new(dir.path().join("does-not-exist")),
            FolderSpec::new(dir.path()),
        ];
        let report = sweeper.sweep_at(&roots, now);
        assert_eq!(report.roots_skipped, 1);
        assert_eq!(report.roots_swept, 1);
        assert!(!file.exists());

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            ActivityEvent::RootUnavailable {
                phase: RootCheckPhase::Sweep,
                ..
            }
        )));
        assert!(matches!(
            events.last(),
            Some(ActivityEvent::SweepCompleted {
                roots_swept: 1,
                roots_skipped: 1,
                deleted: 1,
                ..
            })
        ));
    }

    #[test]
    fn file_given_as_root_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();
        let (sweeper, _rx) = sweeper(1);
        let report = sweeper.sweep(&[FolderSpec::new(&file)]);
        assert_eq!(report.roots_skipped, 1);
        assert!(file.exists());
    }

    #[test]
    fn second_sweep_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"x").unwrap();
        fs::write(dir.path().join("b"), b"y").unwrap();
        let now = days_later(&dir.path().join("a"), 9);

        let (sweeper, _rx) = sweeper(2);
        let roots = [FolderSpec::new(dir.path())];
        let first = sweeper.sweep_at(&roots, now);
        let second = sweeper.sweep_at(&roots, now);
        assert_eq!(first.items_deleted, 2);
        assert_eq!(second.items_deleted, 0);
        assert_eq!(second.items_failed, 0);
    }

    #[test]
    fn vanished_entry_is_already_gone_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (sweeper, rx) = sweeper(1);
        let mut report = SweepReport::default();
        sweeper.record_outcome(
            &dir.path().join("raced"),
            false,
            3,
            delete_entry(&dir.path().join("raced"), EntryKind::File),
            &mut report,
        );
        assert_eq!(report.items_already_gone, 1);
        assert_eq!(report.items_failed, 0);
        assert!(matches!(
            rx.try_recv().unwrap(),
            ActivityEvent::ItemAlreadyGone { .. }
        ));
    }

    #[test]
    fn only_expired_children_of_a_root_are_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.bin");
        let new = dir.path().join("new.bin");
        fs::write(&old, b"old").unwrap();
        std::thread::sleep(Duration::from_millis(1200));
        fs::write(&new, b"new").unwrap();

        let created = entry_timestamp(&fs::symlink_metadata(&old).unwrap()).unwrap();
        let now = created + Duration::from_millis(1500);
        let (logger, _rx) = ActivityLoggerHandle::capture();
        let sweeper = RetentionSweeper::new(Duration::from_secs(1), logger);

        let report = sweeper.sweep_at(&[FolderSpec::new(dir.path())], now);
        assert_eq!(report.items_deleted, 1);
        assert_eq!(report.items_kept, 1);
        assert!(!old.exists());
        assert!(new.exists());
        assert!(dir.path().is_dir(), "root itself must survive");
    }

    #[cfg(unix)]
    #[test]
    fn failed_delete_does_not_stop_the_sweep() {
        use std::os::unix::fs::PermissionsExt;

        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let locked = first.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("pinned.bin"), b"x").unwrap();
        let sibling = first.path().join("sibling.bin");
        fs::write(&sibling, b"x").unwrap();
        let later = second.path().join("later.bin");
        fs::write(&later, b"x").unwrap();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        // Permission bits do not bind a privileged user.
        if fs::write(locked.join("canary"), b"x").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let (sweeper, rx) = sweeper(1);
        let roots = [FolderSpec::new(first.path()), FolderSpec::new(second.path())];
        let report = sweeper.sweep_at(&roots, SystemTime::now() + DAY * 30);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(report.items_failed, 1);
        assert_eq!(report.items_deleted, 2);
        assert_eq!(report.roots_swept, 2);
        assert!(!sibling.exists());
        assert!(!later.exists());
        assert!(locked.join("pinned.bin").exists());

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            ActivityEvent::ItemDeleteFailed { path, .. } if path.ends_with("locked")
        )));
    }
}
