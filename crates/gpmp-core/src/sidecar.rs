use std::path::{Path, PathBuf};

/// Sidecar filename suffixes, appended to the full media filename.
/// Takeout truncates the suffix inconsistently; first existing match wins
/// and the patterns are treated as mutually exclusive.
pub const SIDECAR_PATTERNS: &[&str] = &[
    ".supplemental-metadata.json",
    ".supplemental-metada.json",
    ".supplemental-me.json",
];

/// Find the JSON sidecar for a media file, if any. Absence is common and
/// not an error.
pub fn find_sidecar(media_path: &Path) -> Option<PathBuf> {
    let dir = media_path.parent()?;
    let name = media_path.file_name()?.to_str()?;

    for pattern in SIDECAR_PATTERNS {
        let candidate = dir.join(format!("{}{}", name, pattern));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}
