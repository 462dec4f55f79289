use std::path::{Path, PathBuf};
use thiserror::Error;

/// Keeps every path the orchestrator reads or writes under the processed root.
///
/// Disc backups are often assembled from symlinks; a `BDMV` or `index.bdmv`
/// link that resolves outside the root is refused rather than patched.
#[derive(Debug, Clone)]
pub struct RootGuard {
    /// Canonical path of the directory given on the command line
    root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside processed root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl RootGuard {
    /// Create a guard for `root`, canonicalizing it to resolve symlinks.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// Check that an existing path resolves inside the root.
    ///
    /// Returns the canonical path on success.
    pub fn validate_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        let canonical = absolute.canonicalize()?;
        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical,
                root: self.root.clone(),
            });
        }

        Ok(canonical)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
