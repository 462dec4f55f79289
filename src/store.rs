//! On-disk side of a repair: the one-time backup copy and the atomic
//! write-back of patched contents.

use crate::walk::ProcessError;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

/// Name of the index file inside a `BDMV` directory.
pub const INDEX_NAME: &str = "index.bdmv";

/// Name of the backup directory created inside a `BDMV` directory.
pub const BACKUP_NAME: &str = "BACKUP";

/// What happened to the backup of one index file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStatus {
    /// A copy of the original index was written to `BACKUP/`.
    Created,
    /// `BACKUP/index.bdmv` already existed and was left alone.
    Existing,
    /// Dry run: a copy would have been made.
    Skipped,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ProcessError + '_ {
    move |source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Make sure `bdmv/BACKUP/index.bdmv` holds the unmodified original.
///
/// An existing backup is never overwritten. A fresh copy is staged in a
/// temp file inside `BACKUP/`, given the original's permissions and
/// modification time, hash-checked when `verify` is set, and only then
/// renamed into place. A failed copy or check leaves no `index.bdmv` behind.
pub fn ensure_backup(
    bdmv: &Path,
    index: &Path,
    verify: bool,
    dry_run: bool,
) -> Result<BackupStatus, ProcessError> {
    let backup_dir = bdmv.join(BACKUP_NAME);
    let backup_index = backup_dir.join(INDEX_NAME);

    if backup_index.is_file() {
        debug!(backup = %backup_index.display(), "backup already present");
        return Ok(BackupStatus::Existing);
    }

    if !backup_dir.is_dir() {
        if dry_run {
            info!(dir = %backup_dir.display(), "would create backup directory");
            return Ok(BackupStatus::Skipped);
        }
        info!(dir = %backup_dir.display(), "creating backup directory");
        fs::create_dir_all(&backup_dir).map_err(io_err(&backup_dir))?;
    }

    if dry_run {
        info!(backup = %backup_index.display(), "would copy index to backup");
        return Ok(BackupStatus::Skipped);
    }

    info!(backup = %backup_index.display(), "copying index to backup");
    let mut staged = tempfile::NamedTempFile::new_in(&backup_dir).map_err(io_err(&backup_dir))?;
    let mut source = File::open(index).map_err(io_err(index))?;
    io::copy(&mut source, staged.as_file_mut()).map_err(io_err(&backup_index))?;
    staged.as_file().sync_all().map_err(io_err(&backup_index))?;

    let meta = source.metadata().map_err(io_err(index))?;
    staged
        .as_file()
        .set_permissions(meta.permissions())
        .map_err(io_err(&backup_index))?;
    let mtime = filetime::FileTime::from_last_modification_time(&meta);
    filetime::set_file_mtime(staged.path(), mtime).map_err(io_err(&backup_index))?;

    install_backup(staged, index, &backup_index, verify)?;
    Ok(BackupStatus::Created)
}

/// Check a staged copy against the original and rename it to `dest`.
///
/// On any error the staged file is dropped, which deletes it.
fn install_backup(
    staged: tempfile::NamedTempFile,
    original: &Path,
    dest: &Path,
    verify: bool,
) -> Result<(), ProcessError> {
    if verify {
        let expected = xxh3_64(&fs::read(original).map_err(io_err(original))?);
        let actual = xxh3_64(&fs::read(staged.path()).map_err(io_err(dest))?);

        if expected != actual {
            return Err(ProcessError::BackupMismatch {
                backup: dest.to_path_buf(),
                expected,
                actual,
            });
        }
        debug!(backup = %dest.display(), hash = expected, "backup verified");
    }

    staged.persist_noclobber(dest).map_err(|e| ProcessError::Io {
        path: dest.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full new contents land at `path` or the old file is untouched.
/// An existing target keeps its permissions.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), ProcessError> {
    // Same directory as the target so the rename stays on one filesystem
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(io_err(parent))?;
    temp.write_all(content).map_err(io_err(path))?;

    // NamedTempFile is created 0600
    match fs::metadata(path) {
        Ok(meta) => temp
            .as_file()
            .set_permissions(meta.permissions())
            .map_err(io_err(path))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(path)(e)),
    }

    temp.as_file().sync_all().map_err(io_err(path))?;
    temp.persist(path).map_err(|e| ProcessError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}
