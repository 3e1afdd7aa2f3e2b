use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;

use crate::discover::discover_media_files;
use crate::exiftool::Exiftool;
use crate::stats::RunError;

/// Spot-check sample size when the caller does not override it.
pub const DEFAULT_SAMPLE_COUNT: usize = 5;

/// How many missing paths to render before truncating. The full count is
/// always retained in the report.
pub const MISSING_DISPLAY_CAP: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub enum SampleStatus {
    /// Tool read succeeded and returned date tags
    Verified,
    /// Clean read but no date tags; legitimate for files without a sidecar
    Inconclusive,
    /// Tool invocation failed for this sample member
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SampleCheck {
    pub rel_path: PathBuf,
    pub status: SampleStatus,
}

/// Post-run verification: completeness is gating, the spot-check advisory.
#[derive(Debug, Default)]
pub struct VerificationReport {
    /// Source-relative paths absent from the output tree, sorted
    pub missing: Vec<PathBuf>,
    pub samples: Vec<SampleCheck>,
}

impl VerificationReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Recompute both media sets with the discovery rule and return the
/// source-minus-output difference as sorted relative paths.
pub fn verify_completeness(
    source_root: &Path,
    output_root: &Path,
) -> Result<Vec<PathBuf>, RunError> {
    let source = discover_media_files(source_root)?;

    if !output_root.is_dir() {
        // No output tree at all: everything is missing.
        return Ok(source.into_iter().map(|m| m.rel_path).collect());
    }

    let output: HashSet<PathBuf> = discover_media_files(output_root)?
        .into_iter()
        .map(|m| m.rel_path)
        .collect();

    let missing: Vec<PathBuf> = source
        .into_iter()
        .map(|m| m.rel_path)
        .filter(|p| !output.contains(p))
        .collect();
    // Discovery is already sorted; the filter preserves that.
    Ok(missing)
}

/// Re-read date tags from a bounded random sample of output files.
pub fn verify_sample(
    tool: &Exiftool,
    output_root: &Path,
    sample_count: usize,
) -> Result<Vec<SampleCheck>, RunError> {
    let files = discover_media_files(output_root)?;
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let mut rng = rand::thread_rng();
    let sample = files.choose_multiple(&mut rng, sample_count.min(files.len()));

    let mut checks = Vec::new();
    for media in sample {
        let status = match tool.read_date_tags(&media.source) {
            Ok(stdout) if !stdout.trim().is_empty() => SampleStatus::Verified,
            Ok(_) => SampleStatus::Inconclusive,
            Err(e) => SampleStatus::Failed(e.to_string()),
        };
        checks.push(SampleCheck {
            rel_path: media.rel_path.clone(),
            status,
        });
    }
    Ok(checks)
}
