use crate::metadata::ExtractedMetadata;

/// One `-Tag=value` assignment for the external tool.
#[derive(Debug, Clone, PartialEq)]
pub struct TagAssignment {
    pub tag: &'static str,
    pub value: String,
}

impl TagAssignment {
    fn new(tag: &'static str, value: impl Into<String>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// Render as an exiftool argument.
    pub fn to_arg(&self) -> String {
        format!("-{}={}", self.tag, self.value)
    }
}

/// Ordered tag assignments for one file. Empty is legal and means
/// "copy the file, don't touch tags".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagPlan {
    pub assignments: Vec<TagAssignment>,
}

impl TagPlan {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn to_args(&self) -> Vec<String> {
        self.assignments.iter().map(|a| a.to_arg()).collect()
    }
}

/// Date tags written to video containers (QuickTime: container, track and
/// media stream level).
const VIDEO_DATE_TAGS: &[&str] = &[
    "CreateDate",
    "ModifyDate",
    "TrackCreateDate",
    "TrackModifyDate",
    "MediaCreateDate",
    "MediaModifyDate",
];

/// Date tags written to photos (EXIF).
const PHOTO_DATE_TAGS: &[&str] = &["DateTimeOriginal", "CreateDate", "ModifyDate"];

/// Build the tag plan for one file: dates first, then GPS, then description.
/// All values come from the normalized metadata, never from the raw sidecar.
pub fn build_tag_plan(meta: &ExtractedMetadata, is_video: bool) -> TagPlan {
    let mut plan = TagPlan::default();

    if let Some(dt) = &meta.datetime {
        let tags = if is_video {
            VIDEO_DATE_TAGS
        } else {
            PHOTO_DATE_TAGS
        };
        for tag in tags {
            plan.assignments.push(TagAssignment::new(tag, dt.clone()));
        }
    }

    if let (Some(lat), Some(lon)) = (meta.latitude, meta.longitude) {
        let lat_ref = if lat >= 0.0 { "N" } else { "S" };
        let lon_ref = if lon >= 0.0 { "E" } else { "W" };
        plan.assignments
            .push(TagAssignment::new("GPSLatitude", lat.abs().to_string()));
        plan.assignments
            .push(TagAssignment::new("GPSLatitudeRef", lat_ref));
        plan.assignments
            .push(TagAssignment::new("GPSLongitude", lon.abs().to_string()));
        plan.assignments
            .push(TagAssignment::new("GPSLongitudeRef", lon_ref));

        if let Some(alt) = meta.altitude {
            // 0 = above sea level, 1 = below
            let alt_ref = if alt >= 0.0 { "0" } else { "1" };
            plan.assignments
                .push(TagAssignment::new("GPSAltitude", alt.abs().to_string()));
            plan.assignments
                .push(TagAssignment::new("GPSAltitudeRef", alt_ref));
        }
    }

    if let Some(desc) = &meta.description {
        plan.assignments
            .push(TagAssignment::new("ImageDescription", desc.clone()));
    }

    plan
}
