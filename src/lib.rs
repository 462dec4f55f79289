//! BDMV Patcher: restores the length field and footer of stripped
//! `index.bdmv` files
//!
//! Some Blu-ray/AVCHD backup tools drop the trailing block of `index.bdmv`
//! and zero the length field at offset `0x0C`. Certain players then refuse
//! the disc. This crate puts both back.
//!
//! # Architecture
//!
//! - [`index`]: the byte patcher. A pure function from an owned buffer to a
//!   [`PatchOutcome`]; no I/O.
//! - [`walk`]: finds `BDMV` and `AVCHD/BDMV` directories under a root and
//!   drives the patcher for each `index.bdmv`.
//! - [`store`]: one-time backup into `BDMV/BACKUP/` and atomic write-back.
//! - [`safety`]: keeps every touched path inside the processed root.
//! - [`config`]: runtime options and the optional TOML config file.
//!
//! # Example
//!
//! ```
//! use bdmv_patcher::{process, PatchOutcome, FOOTER};
//!
//! let outcome = process(vec![0u8; 16]).unwrap();
//! match outcome {
//!     PatchOutcome::Patched(bytes) => {
//!         assert_eq!(&bytes[12..16], &16u32.to_be_bytes());
//!         assert!(bytes.ends_with(&FOOTER));
//!     }
//!     PatchOutcome::Unchanged { .. } => unreachable!(),
//! }
//! ```

pub mod config;
pub mod index;
pub mod safety;
pub mod store;
pub mod walk;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, ConfigFile, PatcherOptions};
pub use index::{
    process, process_with, stored_length, validate, Diagnostic, PatchError, PatchOutcome,
    ReportMode, Severity, FOOTER, LENGTH_OFFSET, MIN_LENGTH,
};
pub use safety::{RootGuard, SafetyError};
pub use store::{atomic_write, ensure_backup, BackupStatus, BACKUP_NAME, INDEX_NAME};
pub use walk::{
    process_bdmv, process_index, process_root, FileOutcome, FileReport, ProcessError, RootReport,
};
