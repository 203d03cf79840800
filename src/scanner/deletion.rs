//! Single-entry removal with "already gone" detection.
//!
//! Directories are removed recursively, everything else (files, symlinks,
//! special files) with `remove_file`, so a symlink is unlinked and its
//! target is never followed.

#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use crate::core::errors::CleanerError;

/// What kind of entry a sweep candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// Classify from `symlink_metadata`, so links count as leaves.
    #[must_use]
    pub fn from_metadata(meta: &fs::Metadata) -> Self {
        if meta.file_type().is_dir() {
            Self::Directory
        } else {
            Self::File
        }
    }

    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Result of one delete attempt.
#[derive(Debug)]
pub enum DeleteOutcome {
    Deleted,
    /// The path vanished before or during removal.
    AlreadyGone,
    Failed(CleanerError),
}

/// Remove one entry.
///
/// `NotFound` from the top-level removal maps to [`DeleteOutcome::AlreadyGone`],
/// which keeps overlapping sweeps of the same root idempotent.
#[must_use]
pub fn delete_entry(path: &Path, kind: EntryKind) -> DeleteOutcome {
    let result = match kind {
        EntryKind::Directory => fs::remove_dir_all(path),
        EntryKind::File => fs::remove_file(path),
    };
    match result {
        Ok(()) => DeleteOutcome::Deleted,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => DeleteOutcome::AlreadyGone,
        Err(e) => DeleteOutcome::Failed(CleanerError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletes_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("old.log");
        fs::write(&file, b"x").unwrap();
        let sub = dir.path().join("batch");
        fs::create_dir_all(sub.join("inner")).unwrap();
        fs::write(sub.join("inner").join("a.bin"), b"data").unwrap();

        assert!(matches!(
            delete_entry(&file, EntryKind::File),
            DeleteOutcome::Deleted
        ));
        assert!(matches!(
            delete_entry(&sub, EntryKind::Directory),
            DeleteOutcome::Deleted
        ));
        assert!(!file.exists());
        assert!(!sub.exists());
        assert!(dir.path().exists());
    }

    #[test]
    fn missing_path_is_already_gone() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("gone.txt");
        assert!(matches!(
            delete_entry(&gone, EntryKind::File),
            DeleteOutcome::AlreadyGone
        ));
        assert!(matches!(
            delete_entry(&gone, EntryKind::Directory),
            DeleteOutcome::AlreadyGone
        ));
    }

    #[test]
    fn wrong_kind_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("still-a-dir");
        fs::create_dir(&sub).unwrap();
        match delete_entry(&sub, EntryKind::File) {
            DeleteOutcome::Failed(err) => assert_eq!(err.code(), "CCL-3001"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(sub.exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_is_unlinked_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep.txt"), b"keep").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let kind = EntryKind::from_metadata(&fs::symlink_metadata(&link).unwrap());
        assert_eq!(kind, EntryKind::File);
        assert!(matches!(delete_entry(&link, kind), DeleteOutcome::Deleted));
        assert!(!link.exists());
        assert!(target.join("keep.txt").exists());
    }
}
