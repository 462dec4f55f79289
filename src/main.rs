use anyhow::{Context, Result};
use bdmv_patcher::config::{load_from_path, ConfigFile, PatcherOptions, MAX_VERBOSITY};
use bdmv_patcher::{process_root, FileOutcome, ReportMode, RootReport};
use clap::Parser;
use colored::Colorize;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{error, info_span, Level};

#[derive(Parser)]
#[command(name = "bdmv-patcher")]
#[command(
    about = "Modify BDMV backups to be playable in the Oppo file browser",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Directories to process, each containing a BDMV or AVCHD/BDMV subdirectory
    #[arg(value_name = "DIR", required = true)]
    dirs: Vec<PathBuf>,

    /// Log progress (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dry run - report what would change without creating backups or writing
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Report every failed structure check instead of only the first
    #[arg(long)]
    all_findings: bool,

    /// Skip hash verification of freshly copied backups
    #[arg(long)]
    no_verify_backup: bool,

    /// TOML file with a [patcher] table of default options
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = resolve_options(&cli)?;

    init_logging(options.verbose);

    let mut failed = 0;
    for dir in &cli.dirs {
        let span = info_span!("root", source = %dir.display());
        let _entered = span.enter();

        match process_root(dir, &options) {
            Ok(report) => {
                print_report(&report, options.dry_run);
                failed += report.failed();
            }
            Err(e) => {
                error!(error = %e, "failed to process directory");
                eprintln!("{} {}: {}", "✗".red(), dir.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

/// Merge the optional config file with command-line flags.
///
/// Flags can raise verbosity and turn on dry run or full reporting, but not
/// turn them back off. `--no-verify-backup` always wins over the file.
fn resolve_options(cli: &Cli) -> Result<PatcherOptions> {
    let mut options = match &cli.config {
        Some(path) => load_from_path(path)
            .with_context(|| format!("loading {}", path.display()))?
            .options(),
        None => ConfigFile::default().options(),
    };

    options.verbose = options.verbose.max(cli.verbose).min(MAX_VERBOSITY);
    options.dry_run |= cli.dry_run;
    if cli.all_findings {
        options.report = ReportMode::All;
    }
    if cli.no_verify_backup {
        options.verify_backup = false;
    }

    Ok(options)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();
}

fn print_report(report: &RootReport, dry_run: bool) {
    println!("{}", format!("{}", report.root.display()).bold());

    for (dir, result) in &report.entries {
        match result {
            Ok(file) => match &file.outcome {
                FileOutcome::Patched { new_len, .. } => {
                    println!(
                        "  {} {}: patched ({} bytes)",
                        "✓".green(),
                        dir.display(),
                        new_len
                    );
                }
                FileOutcome::WouldPatch { original_len } => {
                    println!(
                        "  {} {}: would patch ({} bytes)",
                        "✓".green(),
                        dir.display(),
                        original_len
                    );
                }
                FileOutcome::Verified => {
                    println!("  {} {}: already patched", "⊙".yellow(), dir.display());
                }
                FileOutcome::Invalid { diagnostics } => {
                    println!("  {} {}: invalid structure", "⊘".cyan(), dir.display());
                    for diagnostic in diagnostics {
                        println!("    - {}", diagnostic.to_string().dimmed());
                    }
                }
                FileOutcome::TooShort { len } => {
                    println!(
                        "  {} {}: index too short ({} bytes)",
                        "⊘".cyan(),
                        dir.display(),
                        len
                    );
                }
            },
            Err(e) => {
                println!("  {} {}: {}", "✗".red(), dir.display(), e);
            }
        }
    }

    let patched_label = if dry_run { "would patch" } else { "patched" };
    println!(
        "  {} {}, {} verified, {} invalid, {} failed",
        format!("{}", report.patched()).green(),
        patched_label,
        format!("{}", report.verified()).yellow(),
        format!("{}", report.invalid()).cyan(),
        format!("{}", report.failed()).red()
    );
}
