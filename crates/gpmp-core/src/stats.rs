use std::path::PathBuf;

use thiserror::Error;

/// Per-file and run-level error taxonomy. Only `Discovery` aborts a run;
/// everything else is recorded against its file and processing continues.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to read source tree at {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to parse sidecar {path}: {reason}")]
    SidecarParse { path: PathBuf, reason: String },

    #[error("failed to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("exiftool failed for {path}: {reason}")]
    ToolInvocation { path: PathBuf, reason: String },

    #[error("{count} source file(s) missing from output")]
    VerificationGap { count: usize },
}

/// Whether metadata was written to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataStatus {
    /// All tags in the plan were applied (or would be, in preview mode)
    Applied,
    /// Nothing to apply: no sidecar, empty metadata, or file skipped
    #[default]
    Skipped,
    /// The external tool rejected the plan; file remains copied but untagged
    Failed,
}

/// Result of processing one file. Built once, then folded into RunStats.
#[derive(Debug, Default)]
pub struct ProcessingOutcome {
    pub rel_path: PathBuf,
    pub had_sidecar: bool,
    pub copied: bool,
    pub metadata: MetadataStatus,
    pub gps_applied: bool,
    /// Soft errors recorded against this file, in occurrence order; a bad
    /// sidecar parse and a later copy failure are both retained
    pub errors: Vec<RunError>,
    /// Fully-formed tool invocation, recorded in preview mode only
    pub preview_command: Option<String>,
}

impl ProcessingOutcome {
    pub fn new(rel_path: PathBuf) -> Self {
        Self {
            rel_path,
            ..Default::default()
        }
    }

    /// A file counts as processed unless its copy failed; metadata failures
    /// leave the copy in place and still count.
    pub fn processed(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| matches!(e, RunError::Copy { .. }))
    }
}

/// Aggregate counters for one run. Owned by the coordinator and mutated
/// only through the record methods, so a future parallel pipeline can merge
/// worker outcomes through the same seam.
#[derive(Debug, Default)]
pub struct RunStats {
    pub total_files: usize,
    pub processed: usize,
    pub with_sidecar: usize,
    pub without_sidecar: usize,
    pub metadata_success: usize,
    pub metadata_failed: usize,
    pub gps_applied: usize,
    /// Append-only; rendered capped, counted in full
    pub errors: Vec<String>,
}

impl RunStats {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Default::default()
        }
    }

    pub fn record_outcome(&mut self, outcome: &ProcessingOutcome) {
        if outcome.had_sidecar {
            self.with_sidecar += 1;
        } else {
            self.without_sidecar += 1;
        }
        match outcome.metadata {
            MetadataStatus::Applied => self.metadata_success += 1,
            MetadataStatus::Failed => self.metadata_failed += 1,
            MetadataStatus::Skipped => {}
        }
        if outcome.gps_applied {
            self.gps_applied += 1;
        }
        if outcome.processed() {
            self.processed += 1;
        }
        for err in &outcome.errors {
            self.errors.push(err.to_string());
        }
    }

    pub fn record_error(&mut self, error: &RunError) {
        self.errors.push(error.to_string());
    }
}

/// Terminal state of a run, each tier mapped to a distinct exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunTier {
    /// Every file processed, no errors recorded
    Success,
    /// Every file processed, but some metadata is incomplete
    Degraded,
    /// Some files were never processed
    Failed,
}

impl RunTier {
    pub fn exit_code(self) -> i32 {
        match self {
            RunTier::Success => 0,
            RunTier::Failed => 1,
            RunTier::Degraded => 2,
        }
    }
}
