use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::stats::RunError;
use crate::tags::TagPlan;

/// Upper bound for one tag-writing invocation.
pub const APPLY_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for a tag read during verification.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Install locations probed when exiftool is not on PATH.
const COMMON_LOCATIONS: &[&str] = &[
    "/opt/homebrew/bin/exiftool",
    "/usr/local/bin/exiftool",
    "/usr/bin/exiftool",
];

/// Handle to the external metadata tool. One blocking invocation per file,
/// bounded by a fixed timeout; a timeout is a failure, never retried.
#[derive(Debug, Clone)]
pub struct Exiftool {
    path: PathBuf,
}

#[derive(Debug)]
struct ToolOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl Exiftool {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Locate exiftool on PATH, falling back to common install locations.
    pub fn detect() -> Option<PathBuf> {
        if let Ok(output) = Command::new("which")
            .arg("exiftool")
            .stdin(Stdio::null())
            .output()
        {
            if output.status.success() {
                let found = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !found.is_empty() {
                    return Some(PathBuf::from(found));
                }
            }
        }

        COMMON_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    /// Apply a tag plan to `dest` in place. Non-zero exit and timeout both
    /// surface as `ToolInvocation` against the file; the copy stays as-is.
    pub fn apply(&self, dest: &Path, plan: &TagPlan) -> Result<(), RunError> {
        let mut cmd = Command::new(&self.path);
        cmd.arg("-overwrite_original");
        cmd.args(plan.to_args());
        cmd.arg(dest);

        let output = run_with_timeout(cmd, APPLY_TIMEOUT).map_err(|e| {
            RunError::ToolInvocation {
                path: dest.to_path_buf(),
                reason: e,
            }
        })?;

        if !output.status.success() {
            return Err(RunError::ToolInvocation {
                path: dest.to_path_buf(),
                reason: output.stderr.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Re-read the date tags used by the verification spot-check.
    /// Returns the tool's stdout; empty output means no date tags present.
    pub fn read_date_tags(&self, path: &Path) -> Result<String, RunError> {
        let mut cmd = Command::new(&self.path);
        cmd.args(["-DateTimeOriginal", "-CreateDate"]);
        cmd.arg(path);

        let output =
            run_with_timeout(cmd, READ_TIMEOUT).map_err(|e| RunError::ToolInvocation {
                path: path.to_path_buf(),
                reason: e,
            })?;

        if !output.status.success() {
            return Err(RunError::ToolInvocation {
                path: path.to_path_buf(),
                reason: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// The invocation `apply` would run, rendered for preview mode.
    pub fn command_line(&self, dest: &Path, plan: &TagPlan) -> String {
        let mut parts = vec![
            self.path.display().to_string(),
            "-overwrite_original".to_string(),
        ];
        parts.extend(plan.to_args());
        parts.push(dest.display().to_string());
        parts.join(" ")
    }
}

/// Run a command to completion or kill it at the deadline. Stdout/stderr are
/// drained on separate threads so a chatty child cannot block on a full pipe.
fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<ToolOutput, String> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| format!("failed to spawn: {}", e))?;
    let stdout = drain_on_thread(child.stdout.take());
    let stderr = drain_on_thread(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    kill_and_reap(&mut child);
                    let _ = stdout.join();
                    let _ = stderr.join();
                    return Err(format!("timed out after {}s", timeout.as_secs()));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(format!("wait failed: {}", e));
            }
        }
    };

    Ok(ToolOutput {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain_on_thread<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
