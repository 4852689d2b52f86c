use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Structured concept for a commissioned garment, as produced by a brief generator.
///
/// Field names follow the generator's response schema, so the same shape is used
/// on the wire to the front-end.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DesignBrief {
    pub style: String,
    pub garment_type: String,
    pub occasion: String,
    pub summary: String,
    pub key_features: Vec<String>,
    pub suggested_fabrics: Vec<String>,
}

impl DesignBrief {
    /// Items a user can pick as preferences, key features first.
    pub fn preference_options(&self) -> impl Iterator<Item = &str> {
        self.key_features
            .iter()
            .chain(self.suggested_fabrics.iter())
            .map(String::as_str)
    }
}

/// Inspiration image held by a wizard session. The bytes are never inspected
/// beyond format sniffing; they are handed to the brief generator as-is.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { filename: filename.into(), mime_type: mime_type.into(), data: data.into() }
    }

    /// Build an upload whose mime type is guessed from the leading magic bytes.
    pub fn sniffed(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let mime_type = image::guess_format(&data)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Self { filename: filename.into(), mime_type, data }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn metadata(&self) -> ImageMetadata {
        ImageMetadata {
            filename: self.filename.clone(),
            mime_type: self.mime_type.clone(),
            size: self.size(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub filename: String,
    pub mime_type: String,
    pub size: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Upload,
    Preferences,
    Summary,
    Confirmation,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Upload => "upload",
            Step::Preferences => "preferences",
            Step::Summary => "summary",
            Step::Confirmation => "confirmation",
        };
        f.write_str(name)
    }
}

/// What gets handed to the request submitter when the user confirms.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CustomRequest {
    pub id: Uuid,
    pub brief: DesignBrief,
    pub selected_preferences: Vec<String>,
    pub notes: String,
    pub image: Option<ImageMetadata>,
    pub submitted_at: DateTime<Utc>,
}

/// Read-only view of a wizard session returned by the API.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionView {
    pub id: Uuid,
    pub step: Step,
    pub image: Option<ImageMetadata>,
    pub notes: String,
    pub brief: Option<DesignBrief>,
    pub selected_preferences: Vec<String>,
    pub error: Option<String>,
    pub generating: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UploadImageRequest {
    pub filename: String,
    #[serde(default)]
    pub mime_type: Option<String>, // sniffed from the bytes when absent
    pub data_base64: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotesRequest {
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TogglePreferenceRequest {
    pub item: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn preference_options_lists_features_before_fabrics() {
        let brief = DesignBrief {
            key_features: vec!["Puff sleeves".into()],
            suggested_fabrics: vec!["Silk".into(), "Linen".into()],
            ..Default::default()
        };
        let options: Vec<&str> = brief.preference_options().collect();
        assert_eq!(options, vec!["Puff sleeves", "Silk", "Linen"]);
    }

    #[test]
    fn sniffed_upload_detects_png() {
        let png_header = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        let upload = ImageUpload::sniffed("look.png", png_header);
        assert_eq!(upload.mime_type, "image/png");
        assert_eq!(upload.size(), 16);
    }

    #[test]
    fn sniffed_upload_falls_back_to_octet_stream() {
        let upload = ImageUpload::sniffed("notes.txt", b"plain text".to_vec());
        assert_eq!(upload.mime_type, "application/octet-stream");
    }

    #[test]
    fn brief_serializes_with_schema_field_names() {
        let value = serde_json::to_value(DesignBrief::default()).unwrap();
        assert!(value.get("garmentType").is_some());
        assert!(value.get("keyFeatures").is_some());
        assert!(value.get("suggestedFabrics").is_some());
    }
}
