//! Directory orchestration: find `BDMV` directories under a root, back up
//! each `index.bdmv` once, and run the patcher over it.
//!
//! Errors inside one `BDMV` directory are logged and recorded in the
//! [`RootReport`]; they never stop the walk.

use crate::config::PatcherOptions;
use crate::index::{process_with, Diagnostic, PatchError, PatchOutcome, Severity, MIN_LENGTH};
use crate::safety::{RootGuard, SafetyError};
use crate::store::{self, BackupStatus, INDEX_NAME};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Directory name that holds a nested `BDMV` on AVCHD media.
pub const AVCHD_NAME: &str = "AVCHD";

/// Directory name that holds `index.bdmv`.
pub const BDMV_NAME: &str = "BDMV";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("No index.bdmv file found in {0}")]
    MissingIndex(PathBuf),

    #[error("Backup {backup} does not match original (expected xxh3 {expected:016x}, found {actual:016x})")]
    BackupMismatch {
        backup: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Refusing path: {0}")]
    Safety(#[from] SafetyError),

    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// What the patcher did with one index file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Length field and footer were written back.
    Patched { original_len: usize, new_len: usize },
    /// Dry run: the file would have been patched.
    WouldPatch { original_len: usize },
    /// Length field was set and every check passed.
    Verified,
    /// Length field was set and at least one check failed.
    Invalid { diagnostics: Vec<Diagnostic> },
    /// File is shorter than the header; left untouched.
    TooShort { len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub index: PathBuf,
    pub backup: BackupStatus,
    pub outcome: FileOutcome,
}

/// Everything that happened under one root directory.
#[derive(Debug)]
pub struct RootReport {
    pub root: PathBuf,
    /// One entry per `BDMV` directory found, in walk order.
    pub entries: Vec<(PathBuf, Result<FileReport, ProcessError>)>,
}

impl RootReport {
    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|(_, result)| matches!(result, Ok(report) if pred(&report.outcome)))
            .count()
    }

    pub fn patched(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                FileOutcome::Patched { .. } | FileOutcome::WouldPatch { .. }
            )
        })
    }

    pub fn verified(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Verified))
    }

    pub fn invalid(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Invalid { .. } | FileOutcome::TooShort { .. }))
    }

    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_err()).count()
    }
}

/// Walk `root` for `BDMV` and `AVCHD/BDMV` directories and process each.
///
/// Returns `Err` only when `root` itself cannot be read.
pub fn process_root(root: &Path, options: &PatcherOptions) -> Result<RootReport, ProcessError> {
    let guard = RootGuard::new(root)?;
    let mut report = RootReport {
        root: root.to_path_buf(),
        entries: Vec::new(),
    };

    scan_dir(root, &guard, options, &mut report)?;

    if report.entries.is_empty() {
        warn!("no {BDMV_NAME} directory found");
    }

    Ok(report)
}

fn scan_dir(
    dir: &Path,
    guard: &RootGuard,
    options: &PatcherOptions,
    report: &mut RootReport,
) -> Result<(), ProcessError> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            ProcessError::Io {
                path,
                source: e.into(),
            }
        })?;

        if !entry.path().is_dir() {
            continue;
        }

        match entry.file_name().to_str() {
            Some(AVCHD_NAME) => {
                debug!(dir = %entry.path().display(), "descending into AVCHD");
                if let Err(e) = scan_dir(entry.path(), guard, options, report) {
                    error!(dir = %entry.path().display(), error = %e, "failed to read directory");
                    report.entries.push((entry.path().to_path_buf(), Err(e)));
                }
            }
            Some(BDMV_NAME) => {
                let result = process_bdmv(entry.path(), guard, options);
                if let Err(e) = &result {
                    error!(dir = %entry.path().display(), error = %e, "skipping directory");
                }
                report.entries.push((entry.path().to_path_buf(), result));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Back up and patch the `index.bdmv` inside one `BDMV` directory.
pub fn process_bdmv(
    bdmv: &Path,
    guard: &RootGuard,
    options: &PatcherOptions,
) -> Result<FileReport, ProcessError> {
    let bdmv = guard.validate_path(bdmv)?;
    let index = bdmv.join(INDEX_NAME);
    if !index.is_file() {
        return Err(ProcessError::MissingIndex(bdmv));
    }
    let index = guard.validate_path(&index)?;

    let backup = store::ensure_backup(&bdmv, &index, options.verify_backup, options.dry_run)?;

    let outcome = process_index(&index, options)?;

    Ok(FileReport {
        index,
        backup,
        outcome,
    })
}

/// Read one index file, run the patcher, and write back a patched result.
pub fn process_index(index: &Path, options: &PatcherOptions) -> Result<FileOutcome, ProcessError> {
    let data = fs::read(index).map_err(|source| ProcessError::Io {
        path: index.to_path_buf(),
        source,
    })?;
    let original_len = data.len();

    if original_len < MIN_LENGTH {
        error!(
            path = %index.display(),
            file_length = original_len,
            "file length less than minimum length {MIN_LENGTH}"
        );
        return Ok(FileOutcome::TooShort { len: original_len });
    }

    match process_with(data, options.report)? {
        PatchOutcome::Patched(bytes) => {
            let new_len = bytes.len();
            if options.dry_run {
                info!(
                    path = %index.display(),
                    file_length = original_len,
                    "length bytes are zero, would write file length and append end bytes"
                );
                return Ok(FileOutcome::WouldPatch { original_len });
            }

            info!(
                path = %index.display(),
                file_length = original_len,
                "length bytes are zero, writing file length and appending end bytes"
            );
            store::atomic_write(index, &bytes)?;
            Ok(FileOutcome::Patched {
                original_len,
                new_len,
            })
        }
        PatchOutcome::Unchanged {
            stored_length,
            diagnostics,
        } => {
            info!(
                path = %index.display(),
                stored_length,
                file_length = original_len,
                "length bytes are set, verifying file structure"
            );
            for diagnostic in &diagnostics {
                match diagnostic.severity() {
                    Severity::Error => error!(path = %index.display(), "{diagnostic}"),
                    Severity::Warning => warn!(path = %index.display(), "{diagnostic}"),
                }
            }

            if diagnostics.is_empty() {
                Ok(FileOutcome::Verified)
            } else {
                Ok(FileOutcome::Invalid { diagnostics })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::FOOTER;
    use crate::store::BACKUP_NAME;

    fn write_index(bdmv: &Path, contents: &[u8]) -> PathBuf {
        fs::create_dir_all(bdmv).unwrap();
        let index = bdmv.join(INDEX_NAME);
        fs::write(&index, contents).unwrap();
        index
    }

    fn stripped(len: usize) -> Vec<u8> {
        let mut data = vec![0x42u8; len];
        data[12..16].fill(0);
        data
    }

    #[test]
    fn test_process_index_patches_stripped_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let index = write_index(&temp_dir.path().join(BDMV_NAME), &stripped(100));

        let outcome = process_index(&index, &PatcherOptions::default()).unwrap();
        assert_eq!(
            outcome,
            FileOutcome::Patched {
                original_len: 100,
                new_len: 124,
            }
        );

        let written = fs::read(&index).unwrap();
        assert_eq!(&written[12..16], &100u32.to_be_bytes());
        assert!(written.ends_with(&FOOTER));
    }

    #[test]
    fn test_process_index_too_short_untouched() {
        let temp_dir = tempfile::tempdir().unwrap();
        let index = write_index(&temp_dir.path().join(BDMV_NAME), &[0u8; 10]);

        let outcome = process_index(&index, &PatcherOptions::default()).unwrap();
        assert_eq!(outcome, FileOutcome::TooShort { len: 10 });
        assert_eq!(fs::read(&index).unwrap(), vec![0u8; 10]);
    }

    #[test]
    fn test_process_index_dry_run_leaves_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let index = write_index(&temp_dir.path().join(BDMV_NAME), &stripped(64));
        let options = PatcherOptions {
            dry_run: true,
            ..PatcherOptions::default()
        };

        let outcome = process_index(&index, &options).unwrap();
        assert_eq!(outcome, FileOutcome::WouldPatch { original_len: 64 });
        assert_eq!(fs::read(&index).unwrap(), stripped(64));
    }

    #[test]
    fn test_process_bdmv_missing_index() {
        let temp_dir = tempfile::tempdir().unwrap();
        let bdmv = temp_dir.path().join(BDMV_NAME);
        fs::create_dir_all(&bdmv).unwrap();
        let guard = RootGuard::new(temp_dir.path()).unwrap();

        let result = process_bdmv(&bdmv, &guard, &PatcherOptions::default());
        assert!(matches!(result, Err(ProcessError::MissingIndex(_))));
        assert!(!bdmv.join(BACKUP_NAME).exists());
    }

    #[test]
    fn test_process_bdmv_backs_up_original() {
        let temp_dir = tempfile::tempdir().unwrap();
        let bdmv = temp_dir.path().join(BDMV_NAME);
        write_index(&bdmv, &stripped(48));
        let guard = RootGuard::new(temp_dir.path()).unwrap();

        let report = process_bdmv(&bdmv, &guard, &PatcherOptions::default()).unwrap();
        assert_eq!(report.backup, BackupStatus::Created);
        assert_eq!(
            fs::read(bdmv.join(BACKUP_NAME).join(INDEX_NAME)).unwrap(),
            stripped(48)
        );
    }

    #[test]
    fn test_root_report_counts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        write_index(&root.join(BDMV_NAME), &stripped(32));
        write_index(&root.join(AVCHD_NAME).join(BDMV_NAME), &[1u8; 4]);

        let report = process_root(root, &PatcherOptions::default()).unwrap();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.patched(), 1);
        assert_eq!(report.invalid(), 1);
        assert_eq!(report.failed(), 0);
    }
}
