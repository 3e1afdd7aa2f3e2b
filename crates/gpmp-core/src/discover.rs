use std::path::Path;

use walkdir::WalkDir;

use crate::media::MediaFile;
use crate::stats::RunError;

/// Recursively discover all media files under `root`, sorted by relative path
/// so repeated runs over an unchanged tree enumerate identically.
pub fn discover_media_files(root: &Path) -> Result<Vec<MediaFile>, RunError> {
    let mut media = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            // Only an unreadable root is fatal; unreadable descendants are
            // skipped, like the rest of an album after a torn download.
            Err(e) if e.depth() == 0 => {
                return Err(RunError::Discovery {
                    path: root.to_path_buf(),
                    source: e,
                })
            }
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(m) = MediaFile::from_path(root, entry.path()) {
            media.push(m);
        }
    }

    media.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(media)
}
