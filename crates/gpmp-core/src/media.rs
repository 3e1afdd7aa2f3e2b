use std::path::{Path, PathBuf};

/// File extensions (lowercase, no dot) recognized as media during discovery.
/// Covers the photo and video formats a Takeout export can contain.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    // Photos
    "jpg", "jpeg", "png", "webp", "heic", "heif", "bmp", "tiff", "gif", "avif", "jxl", "jfif",
    // Camera raw
    "raw", "cr2", "nef", "orf", "sr2", "arw", "dng", "pef", "raf", "rw2", "srw", "3fr", "erf",
    "k25", "kdc", "mef", "mos", "mrw", "nrw", "srf", "x3f",
    // Video
    "mp4", "mov", "mkv", "avi", "webm", "3gp", "m4v", "mpg", "mpeg", "mts", "m2ts", "ts", "flv",
    "f4v", "wmv", "asf", "rm", "rmvb", "vob", "ogv", "mxf", "dv", "divx", "xvid",
];

/// Extensions that get the video tag set (QuickTime/track-level date tags)
/// instead of the EXIF photo tags.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// Album-level sidecar filename. Never a per-file sidecar, excluded from discovery.
pub const ALBUM_METADATA_FILENAME: &str = "metadata.json";

/// A media file found under the source root. Immutable once discovered.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Absolute (or root-joined) path to the file
    pub source: PathBuf,
    /// Path relative to the discovery root; identity of the file across trees
    pub rel_path: PathBuf,
    /// Lowercase extension without the dot
    pub extension: String,
    /// Whether the video tag set applies
    pub is_video: bool,
}

impl MediaFile {
    /// Build a MediaFile if `path` (under `root`) has a recognized media
    /// extension and is not an album-level `metadata.json`.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let filename = path.file_name()?.to_str()?;
        if filename == ALBUM_METADATA_FILENAME {
            return None;
        }
        let extension = path.extension()?.to_str()?.to_lowercase();
        if !MEDIA_EXTENSIONS.contains(&extension.as_str()) {
            return None;
        }
        let rel_path = path.strip_prefix(root).ok()?.to_path_buf();
        let is_video = VIDEO_EXTENSIONS.contains(&extension.as_str());
        Some(Self {
            source: path.to_path_buf(),
            rel_path,
            extension,
            is_video,
        })
    }

    /// Just the filename component.
    pub fn filename(&self) -> &str {
        self.source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }
}
