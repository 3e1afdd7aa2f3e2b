use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::stats::RunError;

/// Timezone used when rendering epoch timestamps into `YYYY:MM:DD HH:MM:SS`.
/// Takeout timestamps are UTC epochs; Local reproduces the historical
/// behavior of writing host-local wall-clock time into the tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimePolicy {
    #[default]
    Local,
    Utc,
}

/// Normalized metadata pulled from one sidecar. Fields are independent
/// options except for GPS: latitude and longitude are present together or
/// not at all, and altitude only alongside them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    /// Capture time rendered as `YYYY:MM:DD HH:MM:SS`
    pub datetime: Option<String>,
    /// Capture time as epoch seconds, for the mtime fixup
    pub timestamp: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub description: Option<String>,
}

impl ExtractedMetadata {
    pub fn is_empty(&self) -> bool {
        self.datetime.is_none()
            && self.latitude.is_none()
            && self.description.is_none()
    }

    pub fn has_gps(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Consumed subset of the Takeout sidecar schema. Everything else in the
/// file is ignored.
#[derive(Debug, Deserialize)]
struct Sidecar {
    #[serde(rename = "photoTakenTime")]
    photo_taken_time: Option<PhotoTakenTime>,
    #[serde(rename = "geoDataExif")]
    geo_data_exif: Option<GeoData>,
    #[serde(rename = "geoData")]
    geo_data: Option<GeoData>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoTakenTime {
    timestamp: Option<Timestamp>,
}

/// Epoch seconds. The export usually string-encodes these but some sidecar
/// generations carry plain integers; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Text(String),
    Seconds(i64),
}

impl Timestamp {
    fn epoch_seconds(&self) -> anyhow::Result<i64> {
        match self {
            Timestamp::Text(s) => s
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("invalid photoTakenTime timestamp {:?}", s)),
            Timestamp::Seconds(n) => Ok(*n),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeoData {
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    #[serde(default)]
    altitude: f64,
}

/// Render an epoch timestamp per the configured timezone policy.
pub fn format_timestamp(epoch: i64, policy: TimePolicy) -> Option<String> {
    let utc = chrono::DateTime::from_timestamp(epoch, 0)?;
    let naive = match policy {
        TimePolicy::Utc => utc.naive_utc(),
        TimePolicy::Local => utc.with_timezone(&chrono::Local).naive_local(),
    };
    Some(naive.format("%Y:%m:%d %H:%M:%S").to_string())
}

/// Read and normalize one sidecar file. A parse failure is a soft error;
/// the caller records it and proceeds with empty metadata.
pub fn extract_metadata(
    sidecar_path: &Path,
    policy: TimePolicy,
) -> Result<ExtractedMetadata, RunError> {
    let bytes = fs::read(sidecar_path).map_err(|e| RunError::SidecarParse {
        path: sidecar_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_sidecar(&bytes, policy).map_err(|e| RunError::SidecarParse {
        path: sidecar_path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Normalize raw sidecar JSON. Split out from the I/O for testability.
pub fn parse_sidecar(bytes: &[u8], policy: TimePolicy) -> anyhow::Result<ExtractedMetadata> {
    let sidecar: Sidecar = serde_json::from_slice(bytes)?;
    let mut meta = ExtractedMetadata::default();

    if let Some(ts) = sidecar.photo_taken_time.and_then(|t| t.timestamp) {
        let epoch = ts.epoch_seconds()?;
        let formatted = format_timestamp(epoch, policy)
            .ok_or_else(|| anyhow::anyhow!("timestamp {} is out of range", epoch))?;
        meta.datetime = Some(formatted);
        meta.timestamp = Some(epoch);
    }

    // geoDataExif wins over geoData when present and non-null; never merged.
    let geo = sidecar.geo_data_exif.or(sidecar.geo_data);
    if let Some(g) = geo {
        // 0.0 is the export's "no data" sentinel, not a coordinate.
        if g.latitude != 0.0 && g.longitude != 0.0 {
            meta.latitude = Some(g.latitude);
            meta.longitude = Some(g.longitude);
            if g.altitude != 0.0 {
                meta.altitude = Some(g.altitude);
            }
        }
    }

    if let Some(desc) = sidecar.description {
        if !desc.is_empty() {
            meta.description = Some(desc);
        }
    }

    Ok(meta)
}
