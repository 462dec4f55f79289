//! Length-field and footer repair for `index.bdmv` buffers.
//!
//! Backup tools that strip the trailing block of an index file leave the
//! 4-byte length field at offset `0x0C` zeroed. Such a buffer is repaired by
//! writing its own length into that field and appending [`FOOTER`]. A buffer
//! whose length field is already set is only checked, never modified.
//!
//! Nothing in this module touches the filesystem.

use std::fmt;
use thiserror::Error;

/// Byte offset of the big-endian stored-length field.
pub const LENGTH_OFFSET: usize = 0x0C;

/// Width of the stored-length field in bytes.
pub const LENGTH_SIZE: usize = 4;

/// Smallest buffer the patcher accepts: the header up to and including the
/// length field.
pub const MIN_LENGTH: usize = LENGTH_OFFSET + LENGTH_SIZE;

/// Trailing block expected after `stored_length` bytes of primary content.
pub const FOOTER: [u8; 24] = [
    // 00    01    02    03    04    05    06    07    08    09    0A    0B    0C    0D    0E    0F
    0x00, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x01, 0x10, 0x00, 0x01, 0x00,
    0x00, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x00,
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("Index is {len} bytes, less than minimum length {min}")]
    TooShort { len: usize, min: usize },

    #[error("Index is {len} bytes, which does not fit in the 4-byte length field")]
    TooLong { len: usize },
}

/// How many validation findings to report for an initialized buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// Stop at the first failing check, in documented order.
    #[default]
    FirstMatch,
    /// Run every check and report each failure.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// A structural problem found in an index whose length field is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Stored length is smaller than the header itself.
    BelowMinimum { stored_length: u32 },
    /// Stored length points past the end of the buffer.
    ExceedsFileLength {
        stored_length: u32,
        file_length: usize,
    },
    /// Number of bytes after `stored_length` is not the footer size.
    /// `found` is negative when the stored length overshoots the buffer.
    TrailingByteCount { found: i64, expected: usize },
    /// The last bytes of the buffer are not [`FOOTER`].
    FooterMismatch,
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::TrailingByteCount { .. } => Severity::Warning,
            Diagnostic::BelowMinimum { .. }
            | Diagnostic::ExceedsFileLength { .. }
            | Diagnostic::FooterMismatch => Severity::Error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::BelowMinimum { stored_length } => write!(
                f,
                "stored length {stored_length} below minimum length {MIN_LENGTH}"
            ),
            Diagnostic::ExceedsFileLength {
                stored_length,
                file_length,
            } => write!(
                f,
                "stored length {stored_length} exceeds file length {file_length}"
            ),
            Diagnostic::TrailingByteCount { found, expected } => write!(
                f,
                "unexpected trailing byte count: found {found} beyond stored length, expected {expected}"
            ),
            Diagnostic::FooterMismatch => write!(
                f,
                "trailing {} bytes do not match expected footer",
                FOOTER.len()
            ),
        }
    }
}

/// Result of running the patcher over one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a Patched outcome carries bytes that must be written back"]
pub enum PatchOutcome {
    /// The length field was zero. Holds the repaired contents.
    Patched(Vec<u8>),
    /// The length field was set. The input was left as is.
    Unchanged {
        stored_length: u32,
        diagnostics: Vec<Diagnostic>,
    },
}

impl PatchOutcome {
    pub fn is_patched(&self) -> bool {
        matches!(self, PatchOutcome::Patched(_))
    }

    /// Diagnostics from the validation branch; empty for a patched buffer.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            PatchOutcome::Patched(_) => &[],
            PatchOutcome::Unchanged { diagnostics, .. } => diagnostics,
        }
    }
}

/// Decode the big-endian length field at [`LENGTH_OFFSET`].
pub fn stored_length(buffer: &[u8]) -> Result<u32, PatchError> {
    let field = buffer
        .get(LENGTH_OFFSET..MIN_LENGTH)
        .ok_or(PatchError::TooShort {
            len: buffer.len(),
            min: MIN_LENGTH,
        })?;
    let mut raw = [0u8; LENGTH_SIZE];
    raw.copy_from_slice(field);
    Ok(u32::from_be_bytes(raw))
}

/// Patch or validate `buffer`, reporting at most one finding.
pub fn process(buffer: Vec<u8>) -> Result<PatchOutcome, PatchError> {
    process_with(buffer, ReportMode::FirstMatch)
}

/// Patch or validate `buffer` with an explicit report mode.
///
/// A zero length field selects the patch path: the field is set to the
/// buffer's current length and [`FOOTER`] is appended. Any other value
/// selects the validation path, which never modifies the buffer.
pub fn process_with(mut buffer: Vec<u8>, mode: ReportMode) -> Result<PatchOutcome, PatchError> {
    let stored = stored_length(&buffer)?;

    if stored != 0 {
        let diagnostics = validate(&buffer, stored, mode);
        return Ok(PatchOutcome::Unchanged {
            stored_length: stored,
            diagnostics,
        });
    }

    let actual = u32::try_from(buffer.len()).map_err(|_| PatchError::TooLong {
        len: buffer.len(),
    })?;
    buffer[LENGTH_OFFSET..MIN_LENGTH].copy_from_slice(&actual.to_be_bytes());
    buffer.reserve_exact(FOOTER.len());
    buffer.extend_from_slice(&FOOTER);

    Ok(PatchOutcome::Patched(buffer))
}

/// Check an initialized buffer against its stored length and [`FOOTER`].
///
/// Checks run in a fixed order: minimum, upper bound, trailing byte count,
/// footer bytes.
pub fn validate(buffer: &[u8], stored: u32, mode: ReportMode) -> Vec<Diagnostic> {
    let file_length = buffer.len();
    // Compared in u64 so `stored + FOOTER.len()` cannot overflow on 32-bit.
    let file_len = file_length as u64;
    let stored_len = u64::from(stored);
    let mut found = Vec::new();

    if stored_len < MIN_LENGTH as u64 {
        found.push(Diagnostic::BelowMinimum {
            stored_length: stored,
        });
    }

    if stored_len > file_len {
        found.push(Diagnostic::ExceedsFileLength {
            stored_length: stored,
            file_length,
        });
    }

    if file_len != stored_len + FOOTER.len() as u64 {
        found.push(Diagnostic::TrailingByteCount {
            found: file_length as i64 - i64::from(stored),
            expected: FOOTER.len(),
        });
    }

    if file_length >= FOOTER.len() && !buffer.ends_with(&FOOTER) {
        found.push(Diagnostic::FooterMismatch);
    }

    if mode == ReportMode::FirstMatch {
        found.truncate(1);
    }

    found
}
