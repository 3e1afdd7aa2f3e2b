use std::path::{Path, PathBuf};

use clap::Parser;

use gpmp_core::exiftool::Exiftool;
use gpmp_core::stats::RunTier;
use gpmp_core::verify::{SampleStatus, VerificationReport, MISSING_DISPLAY_CAP};
use gpmp_core::{ProcessOptions, ProcessResult, TimePolicy};

const ERROR_DISPLAY_CAP: usize = 10;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Parser)]
#[command(
    name = "gpmp-rs",
    version,
    about = "Google Photos Takeout metadata processor - reconcile JSON sidecars into media files"
)]
struct Cli {
    /// Source directory containing the Takeout media tree
    #[arg(default_value = "Google Photos")]
    source: PathBuf,

    /// Output directory for processed files
    #[arg(short, long, default_value = "Output")]
    output: PathBuf,

    /// Path to the exiftool binary (default: auto-detect)
    #[arg(long)]
    exiftool: Option<PathBuf>,

    /// Show what would be done without making changes
    #[arg(long)]
    dry_run: bool,

    /// Print detailed progress for each file
    #[arg(long)]
    verbose: bool,

    /// Don't copy files that lack JSON metadata
    #[arg(long)]
    skip_no_json: bool,

    /// Skip the disk space preflight
    #[arg(long)]
    skip_disk_check: bool,

    /// Render timestamps as UTC instead of host-local time
    #[arg(long)]
    utc: bool,

    /// Number of files re-read during the verification spot-check
    #[arg(long, default_value_t = 5)]
    sample_count: usize,
}

fn main() {
    match run() {
        Ok(tier) => std::process::exit(tier.exit_code()),
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            std::process::exit(RunTier::Failed.exit_code());
        }
    }
}

fn run() -> anyhow::Result<RunTier> {
    let cli = Cli::parse();
    let t_total = std::time::Instant::now();

    eprintln!("Google Photos Takeout Metadata Processor");
    eprintln!("{}", "=".repeat(60));

    let exiftool_path = match cli.exiftool.clone().or_else(Exiftool::detect) {
        Some(path) => path,
        None => {
            eprintln!("ERROR: exiftool not found");
            eprintln!("Please install exiftool:");
            eprintln!("  macOS: brew install exiftool");
            eprintln!("  Linux: apt install libimage-exiftool-perl");
            eprintln!("Or specify path with --exiftool");
            return Ok(RunTier::Failed);
        }
    };
    eprintln!("Using exiftool: {}", exiftool_path.display());

    anyhow::ensure!(
        cli.source.is_dir(),
        "source directory not found: {}",
        cli.source.display()
    );

    if !cli.dry_run && !cli.skip_disk_check && !check_disk_space(&cli.source) {
        return Ok(RunTier::Failed);
    }

    if cli.dry_run {
        eprintln!("\n*** DRY RUN MODE - No changes will be made ***");
    }
    eprintln!("\nProcessing {}...", cli.source.display());

    let options = ProcessOptions {
        source: cli.source,
        output: cli.output.clone(),
        exiftool: Some(exiftool_path),
        dry_run: cli.dry_run,
        skip_no_json: cli.skip_no_json,
        time_policy: if cli.utc {
            TimePolicy::Utc
        } else {
            TimePolicy::Local
        },
        sample_count: cli.sample_count,
    };

    let verbose = cli.verbose;
    let result = gpmp_core::process(&options, &move |stage, current, total, message| {
        match stage {
            "preview" => {
                if verbose {
                    eprintln!("  [DRY RUN] Would run: {}", message);
                }
            }
            _ if verbose => {
                eprintln!("[{}/{}] {}", (current + 1).min(total), total, message)
            }
            _ => eprint!("\r[{}] {}/{} {}", stage, (current + 1).min(total), total, message),
        }
    })?;
    eprintln!();

    if let Some(verification) = &result.verification {
        print_verification(&result, verification);
    }
    print_summary(&result, cli.dry_run);
    eprintln!("Total: {:.2}s", t_total.elapsed().as_secs_f64());

    match result.tier {
        RunTier::Failed => eprintln!("\nFAILED: Some files were not processed"),
        RunTier::Degraded => {
            eprintln!("\nCOMPLETED WITH ERRORS");
            eprintln!("All files copied but some metadata may be incomplete");
        }
        RunTier::Success => {
            if !cli.dry_run {
                eprintln!(
                    "\nSUCCESS: All {} media files processed!",
                    result.stats.total_files
                );
                eprintln!("Output directory: {}", cli.output.display());
            }
        }
    }

    Ok(result.tier)
}

fn print_verification(result: &ProcessResult, verification: &VerificationReport) {
    eprintln!("\n{}", "=".repeat(60));
    eprintln!("VERIFICATION");
    eprintln!("{}", "=".repeat(60));
    eprintln!("Source: {} media files", result.stats.total_files);
    eprintln!("Output: {} media files", result.stats.processed);

    if verification.is_complete() {
        eprintln!("All files accounted for");
    } else {
        eprintln!(
            "\nERROR: {} files not processed!",
            verification.missing.len()
        );
        for path in verification.missing.iter().take(MISSING_DISPLAY_CAP) {
            eprintln!("  MISSING: {}", path.display());
        }
        if verification.missing.len() > MISSING_DISPLAY_CAP {
            eprintln!(
                "  ... and {} more files",
                verification.missing.len() - MISSING_DISPLAY_CAP
            );
        }
    }

    if !verification.samples.is_empty() {
        eprintln!(
            "\nSample metadata verification ({} random files):",
            verification.samples.len()
        );
        for check in &verification.samples {
            match &check.status {
                SampleStatus::Verified => {
                    eprintln!("  [ok] {}: metadata verified", check.rel_path.display())
                }
                SampleStatus::Inconclusive => eprintln!(
                    "  [??] {}: no metadata found (may be expected)",
                    check.rel_path.display()
                ),
                SampleStatus::Failed(reason) => eprintln!(
                    "  [!!] {}: verification failed ({})",
                    check.rel_path.display(),
                    reason
                ),
            }
        }
    }
}

fn print_summary(result: &ProcessResult, dry_run: bool) {
    let stats = &result.stats;
    eprintln!("\n{}", "=".repeat(60));
    eprintln!(
        "{}",
        if dry_run {
            "DRY RUN COMPLETE"
        } else {
            "PROCESSING COMPLETE"
        }
    );
    eprintln!("{}", "=".repeat(60));
    eprintln!("Total files found: {}", stats.total_files);
    eprintln!("Files processed: {}", stats.processed);
    eprintln!("Files with JSON metadata: {}", stats.with_sidecar);
    eprintln!("Files without JSON: {}", stats.without_sidecar);

    if !dry_run {
        eprintln!("Metadata application successful: {}", stats.metadata_success);
        eprintln!("Metadata application failed: {}", stats.metadata_failed);
        eprintln!("GPS coordinates applied: {}", stats.gps_applied);
    }

    if !stats.errors.is_empty() {
        eprintln!("\nErrors encountered: {}", stats.errors.len());
        for error in stats.errors.iter().take(ERROR_DISPLAY_CAP) {
            eprintln!("  - {}", error);
        }
        if stats.errors.len() > ERROR_DISPLAY_CAP {
            eprintln!(
                "  ... and {} more errors",
                stats.errors.len() - ERROR_DISPLAY_CAP
            );
        }
    }
    eprintln!("{}", "=".repeat(60));
}

/// Total size of all regular files under `path`.
fn directory_size(path: &Path) -> u64 {
    walkdir::WalkDir::new(path)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(unix)]
fn available_space(path: &Path) -> Option<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) } != 0 {
        return None;
    }
    Some(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(not(unix))]
fn available_space(_path: &Path) -> Option<u64> {
    None
}

/// Verify the output volume can hold a full copy of the source, with a
/// 20% safety margin. Inconclusive measurements pass.
fn check_disk_space(source: &Path) -> bool {
    const SAFETY_MARGIN: f64 = 1.2;

    let source_size = directory_size(source);
    let required = source_size as f64 * SAFETY_MARGIN;
    let Some(available) = available_space(Path::new(".")) else {
        return true;
    };

    if (available as f64) < required {
        eprintln!("ERROR: Insufficient disk space.");
        eprintln!("  Source size: {:.1} GB", source_size as f64 / GIB);
        eprintln!("  Required (with 20% margin): {:.1} GB", required / GIB);
        eprintln!("  Available: {:.1} GB", available as f64 / GIB);
        return false;
    }
    true
}
