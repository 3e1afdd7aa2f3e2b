pub mod discover;
pub mod exiftool;
pub mod media;
pub mod metadata;
pub mod sidecar;
pub mod stats;
pub mod tags;
pub mod verify;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;

use crate::exiftool::Exiftool;
use crate::media::MediaFile;
use crate::metadata::ExtractedMetadata;
use crate::stats::{MetadataStatus, ProcessingOutcome, RunError, RunStats, RunTier};
use crate::verify::VerificationReport;

pub use crate::metadata::TimePolicy;

/// Options for one reconciliation run.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Source root of the Takeout export
    pub source: PathBuf,
    /// Output root; mirrors the source tree path-for-path
    pub output: PathBuf,
    /// Explicit exiftool binary; auto-detected when absent
    pub exiftool: Option<PathBuf>,
    /// Preview mode: build every plan, touch nothing
    pub dry_run: bool,
    /// Don't copy files that lack a sidecar
    pub skip_no_json: bool,
    /// Timezone used to render epoch timestamps into tag values
    pub time_policy: TimePolicy,
    /// Spot-check sample size
    pub sample_count: usize,
}

/// Final state of a run.
#[derive(Debug)]
pub struct ProcessResult {
    pub stats: RunStats,
    /// Present in apply mode only; preview has no output tree to verify
    pub verification: Option<VerificationReport>,
    pub tier: RunTier,
}

/// Type alias for progress callback: (stage, current, total, message)
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Throttled progress reporter - emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: std::sync::Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: std::sync::Mutex::new(Instant::now() - std::time::Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap();
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Run the full reconciliation pipeline: discovery, then one sequential
/// per-file pass (match, extract, copy, apply), then verification over the
/// completed output tree. Per-file errors are recorded and never abort the
/// run; only an unreadable source root is fatal.
pub fn process(
    options: &ProcessOptions,
    progress_callback: &ProgressCallback,
) -> anyhow::Result<ProcessResult> {
    let tp = ThrottledProgress::new(progress_callback);

    let tool_path = match &options.exiftool {
        Some(p) => p.clone(),
        None => Exiftool::detect().context(
            "exiftool not found; install it or pass an explicit path",
        )?,
    };
    let tool = Exiftool::new(tool_path);

    let media = discover::discover_media_files(&options.source)?;
    let total = media.len() as u64;
    let mut stats = RunStats::new(media.len());

    for (i, m) in media.iter().enumerate() {
        tp.report("process", i as u64, total, m.filename());
        let outcome = process_file(&tool, m, options);
        if let Some(cmd) = &outcome.preview_command {
            // Preview lines are the run's product, never throttled away.
            progress_callback("preview", i as u64, total, cmd);
        }
        stats.record_outcome(&outcome);
    }
    tp.report("process", total, total, "Processing complete");

    // Verification needs every file's processing to have completed; the
    // sequential pass above is that barrier.
    let verification = if options.dry_run {
        None
    } else {
        Some(run_verification(&tool, options, &mut stats)?)
    };

    let missing_count = verification.as_ref().map_or(0, |v| v.missing.len());
    let tier = if stats.processed < stats.total_files || missing_count > 0 {
        RunTier::Failed
    } else if !stats.errors.is_empty() {
        RunTier::Degraded
    } else {
        RunTier::Success
    };

    Ok(ProcessResult {
        stats,
        verification,
        tier,
    })
}

/// Match, extract, copy and apply for one file. Every failure past discovery
/// is captured in the outcome instead of propagating.
fn process_file(tool: &Exiftool, media: &MediaFile, options: &ProcessOptions) -> ProcessingOutcome {
    let mut outcome = ProcessingOutcome::new(media.rel_path.clone());

    let sidecar = sidecar::find_sidecar(&media.source);
    outcome.had_sidecar = sidecar.is_some();

    let meta = match &sidecar {
        Some(path) => match metadata::extract_metadata(path, options.time_policy) {
            Ok(meta) => meta,
            Err(e) => {
                // Soft: proceed with no metadata rather than abort the file.
                outcome.errors.push(e);
                ExtractedMetadata::default()
            }
        },
        None => {
            if options.skip_no_json {
                return outcome;
            }
            ExtractedMetadata::default()
        }
    };

    let dest = options.output.join(&media.rel_path);

    if !options.dry_run {
        if let Some(parent) = dest.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                outcome.errors.push(RunError::Copy {
                    path: media.source.clone(),
                    source: e,
                });
                return outcome;
            }
        }
        if let Err(e) = fs::copy(&media.source, &dest) {
            outcome.errors.push(RunError::Copy {
                path: media.source.clone(),
                source: e,
            });
            return outcome;
        }
        outcome.copied = true;
    }

    if meta.is_empty() {
        return outcome;
    }
    let plan = tags::build_tag_plan(&meta, media.is_video);

    if options.dry_run {
        outcome.preview_command = Some(tool.command_line(&dest, &plan));
        outcome.metadata = MetadataStatus::Applied;
        outcome.gps_applied = meta.has_gps();
        return outcome;
    }

    match tool.apply(&dest, &plan) {
        Ok(()) => {
            outcome.metadata = MetadataStatus::Applied;
            outcome.gps_applied = meta.has_gps();
            // Align the copy's mtime with the capture time. Independent of
            // tag reporting; a failure here does not flip the status.
            if let Some(epoch) = meta.timestamp {
                let ft = filetime::FileTime::from_unix_time(epoch, 0);
                let _ = filetime::set_file_times(&dest, ft, ft);
            }
        }
        Err(e) => {
            outcome.metadata = MetadataStatus::Failed;
            outcome.errors.push(e);
        }
    }

    outcome
}

/// Completeness plus the advisory spot-check, run once over the finished
/// output tree.
fn run_verification(
    tool: &Exiftool,
    options: &ProcessOptions,
    stats: &mut RunStats,
) -> anyhow::Result<VerificationReport> {
    // With skip_no_json the output is intentionally partial, so the
    // source-minus-output difference proves nothing.
    let missing = if options.skip_no_json {
        Vec::new()
    } else {
        verify::verify_completeness(&options.source, &options.output)?
    };

    if !missing.is_empty() {
        stats.record_error(&RunError::VerificationGap {
            count: missing.len(),
        });
    }

    let samples = if stats.with_sidecar > 0 && options.output.is_dir() {
        verify::verify_sample(tool, &options.output, options.sample_count)?
    } else {
        Vec::new()
    };

    Ok(VerificationReport { missing, samples })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    fn no_progress() -> &'static ProgressCallback {
        &|_, _, _, _| {}
    }

    fn write_file(path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap().write_all(contents).unwrap();
    }

    #[cfg(unix)]
    fn stub_tool(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("exiftool-stub.sh");
        write_file(&path, script.as_bytes());
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn options(source: &Path, output: &Path, tool: PathBuf) -> ProcessOptions {
        ProcessOptions {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            exiftool: Some(tool),
            dry_run: false,
            skip_no_json: false,
            time_policy: TimePolicy::Utc,
            sample_count: verify::DEFAULT_SAMPLE_COUNT,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_video_without_sidecar_is_copied_unmodified() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let output = dir.path().join("output");
        write_file(&source.join("clip.mp4"), b"video-bytes");

        let opts = options(&source, &output, PathBuf::from("true"));
        let result = process(&opts, no_progress()).unwrap();

        assert_eq!(result.tier, RunTier::Success);
        assert_eq!(result.stats.processed, 1);
        assert_eq!(result.stats.without_sidecar, 1);
        assert_eq!(result.stats.with_sidecar, 0);
        assert_eq!(result.stats.metadata_success, 0);
        assert_eq!(result.stats.gps_applied, 0);
        assert_eq!(fs::read(output.join("clip.mp4")).unwrap(), b"video-bytes");
        assert!(result.verification.unwrap().is_complete());
    }

    #[cfg(unix)]
    #[test]
    fn test_sidecar_metadata_applied_and_mtime_set() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let output = dir.path().join("output");
        write_file(&source.join("album/IMG.jpg"), b"jpeg");
        write_file(
            &source.join("album/IMG.jpg.supplemental-metadata.json"),
            br#"{
                "photoTakenTime": {"timestamp": "1609459200"},
                "geoDataExif": {"latitude": 37.0, "longitude": -122.0, "altitude": 0.0}
            }"#,
        );

        let opts = options(&source, &output, PathBuf::from("true"));
        let result = process(&opts, no_progress()).unwrap();

        assert_eq!(result.tier, RunTier::Success);
        assert_eq!(result.stats.with_sidecar, 1);
        assert_eq!(result.stats.metadata_success, 1);
        assert_eq!(result.stats.gps_applied, 1);

        let mtime = fs::metadata(output.join("album/IMG.jpg"))
            .unwrap()
            .modified()
            .unwrap();
        let epoch = mtime
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        assert_eq!(epoch, 1609459200);
    }

    #[cfg(unix)]
    #[test]
    fn test_one_tool_failure_among_ten_is_degraded() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let output = dir.path().join("output");

        for i in 0..9 {
            let name = format!("ok{}.jpg", i);
            write_file(&source.join(&name), b"jpeg");
            write_file(
                &source.join(format!("{}.supplemental-metadata.json", name)),
                br#"{"photoTakenTime": {"timestamp": "1609459200"}}"#,
            );
        }
        write_file(&source.join("fail.jpg"), b"jpeg");
        write_file(
            &source.join("fail.jpg.supplemental-metadata.json"),
            br#"{"photoTakenTime": {"timestamp": "1609459200"}}"#,
        );

        // Rejects writes to fail.jpg, reads (-DateTimeOriginal) always pass.
        let tool = stub_tool(
            dir.path(),
            "#!/bin/sh\n\
             case \"$1\" in -DateTimeOriginal) exit 0;; esac\n\
             for arg; do last=\"$arg\"; done\n\
             case \"$last\" in *fail.jpg) echo 'stub: write rejected' >&2; exit 1;; esac\n\
             exit 0\n",
        );

        let opts = options(&source, &output, tool);
        let result = process(&opts, no_progress()).unwrap();

        assert_eq!(result.tier, RunTier::Degraded);
        assert_eq!(result.stats.processed, 10);
        assert_eq!(result.stats.metadata_success, 9);
        assert_eq!(result.stats.metadata_failed, 1);
        assert_eq!(result.stats.errors.len(), 1);
        assert!(result.stats.errors[0].contains("write rejected"));
        // The failed file is still copied, so completeness holds.
        assert!(result.verification.unwrap().is_complete());
    }

    #[test]
    fn test_preview_mode_never_mutates_the_filesystem() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let output = dir.path().join("output");
        write_file(&source.join("IMG.jpg"), b"jpeg");
        write_file(
            &source.join("IMG.jpg.supplemental-metadata.json"),
            br#"{"photoTakenTime": {"timestamp": "1609459200"}}"#,
        );

        let mut opts = options(&source, &output, PathBuf::from("/usr/bin/exiftool"));
        opts.dry_run = true;

        let previews = std::sync::Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let sink = previews.clone();
        let cb = move |stage: &str, _: u64, _: u64, msg: &str| {
            if stage == "preview" {
                sink.lock().unwrap().push(msg.to_string());
            }
        };
        let result = process(&opts, &cb).unwrap();
        assert_eq!(result.tier, RunTier::Success);
        assert_eq!(result.stats.processed, 1);
        assert_eq!(result.stats.metadata_success, 1);
        assert!(result.verification.is_none());

        assert!(!output.exists());
        let previews = previews.lock().unwrap();
        assert_eq!(previews.len(), 1);
        assert!(previews[0].contains("-DateTimeOriginal=2021:01:01 00:00:00"));
        assert!(previews[0].contains("-overwrite_original"));
    }

    #[cfg(unix)]
    #[test]
    fn test_malformed_sidecar_is_soft_and_file_still_copied() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let output = dir.path().join("output");
        write_file(&source.join("IMG.jpg"), b"jpeg");
        write_file(
            &source.join("IMG.jpg.supplemental-metadata.json"),
            b"{broken",
        );

        let opts = options(&source, &output, PathBuf::from("true"));
        let result = process(&opts, no_progress()).unwrap();

        assert_eq!(result.tier, RunTier::Degraded);
        assert_eq!(result.stats.processed, 1);
        assert_eq!(result.stats.with_sidecar, 1);
        assert_eq!(result.stats.metadata_success, 0);
        assert_eq!(result.stats.errors.len(), 1);
        assert!(output.join("IMG.jpg").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_and_copy_failures_are_both_retained() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        write_file(&source.join("IMG.jpg"), b"jpeg");
        write_file(
            &source.join("IMG.jpg.supplemental-metadata.json"),
            b"{broken",
        );
        // A regular file where the output root should go makes every copy
        // fail, after the sidecar has already failed to parse.
        let output = dir.path().join("output");
        write_file(&output, b"in the way");

        let opts = options(&source, &output, PathBuf::from("true"));
        let result = process(&opts, no_progress()).unwrap();

        assert_eq!(result.tier, RunTier::Failed);
        assert_eq!(result.stats.processed, 0);
        let errors = &result.stats.errors;
        assert!(errors.iter().any(|e| e.contains("parse")));
        assert!(errors.iter().any(|e| e.contains("copy")));
    }

    #[cfg(unix)]
    #[test]
    fn test_skip_no_json_leaves_file_uncopied_but_processed() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        let output = dir.path().join("output");
        write_file(&source.join("orphan.jpg"), b"jpeg");
        write_file(&source.join("kept.jpg"), b"jpeg");
        write_file(
            &source.join("kept.jpg.supplemental-metadata.json"),
            br#"{"photoTakenTime": {"timestamp": "1609459200"}}"#,
        );

        let mut opts = options(&source, &output, PathBuf::from("true"));
        opts.skip_no_json = true;
        let result = process(&opts, no_progress()).unwrap();

        assert_eq!(result.tier, RunTier::Success);
        assert_eq!(result.stats.processed, 2);
        assert!(output.join("kept.jpg").exists());
        assert!(!output.join("orphan.jpg").exists());
        // Completeness is skipped for an intentionally partial output.
        assert!(result.verification.unwrap().is_complete());
    }
}
