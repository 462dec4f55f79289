use crate::index::ReportMode;
use serde::Deserialize;
use std::fmt;

/// Highest `-v` count with a distinct meaning (debug output).
pub const MAX_VERBOSITY: u8 = 2;

/// Contents of a `--config` TOML file.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub patcher: PatcherSection,
}

/// The `[patcher]` table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct PatcherSection {
    pub verbose: u8,
    pub dry_run: bool,
    /// `"first-match"` or `"all"`
    pub report: String,
    pub verify_backup: bool,
}

impl Default for PatcherSection {
    fn default() -> Self {
        Self {
            verbose: 0,
            dry_run: false,
            report: "first-match".to_string(),
            verify_backup: true,
        }
    }
}

impl ConfigFile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if parse_report_mode(&self.patcher.report).is_none() {
            issues.push(ValidationIssue::UnknownReportMode(
                self.patcher.report.clone(),
            ));
        }

        if self.patcher.verbose > MAX_VERBOSITY {
            issues.push(ValidationIssue::VerbosityOutOfRange(self.patcher.verbose));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Convert to runtime options. Call [`ConfigFile::validate`] first.
    pub fn options(&self) -> PatcherOptions {
        PatcherOptions {
            verbose: self.patcher.verbose,
            dry_run: self.patcher.dry_run,
            report: parse_report_mode(&self.patcher.report).unwrap_or_default(),
            verify_backup: self.patcher.verify_backup,
        }
    }
}

fn parse_report_mode(value: &str) -> Option<ReportMode> {
    match value {
        "first-match" => Some(ReportMode::FirstMatch),
        "all" => Some(ReportMode::All),
        _ => None,
    }
}

/// Options the orchestrator runs with, after merging file and command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatcherOptions {
    pub verbose: u8,
    /// Report what would change without creating backups or writing.
    pub dry_run: bool,
    pub report: ReportMode,
    /// Hash-check a freshly copied backup before patching the original.
    pub verify_backup: bool,
}

impl Default for PatcherOptions {
    fn default() -> Self {
        ConfigFile::default().options()
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    UnknownReportMode(String),
    VerbosityOutOfRange(u8),
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::UnknownReportMode(value) => write!(
                f,
                "patcher.report must be \"first-match\" or \"all\", got {value:?}"
            ),
            ValidationIssue::VerbosityOutOfRange(value) => write!(
                f,
                "patcher.verbose must be at most {MAX_VERBOSITY}, got {value}"
            ),
        }
    }
}
