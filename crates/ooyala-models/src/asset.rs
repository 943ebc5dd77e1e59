//! Asset models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use validator::Validate;

/// Lifecycle status reported by the service for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Created, waiting for chunks
    #[default]
    Uploading,
    /// All chunks received, waiting for transcoding
    Uploaded,
    /// Transcoding in progress
    Processing,
    /// Available for playback
    Live,
    Paused,
    Failed,
    Duplicate,
    /// Deleted and pending purge
    Cremated,
    #[serde(other)]
    Unknown,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Uploading => "uploading",
            AssetStatus::Uploaded => "uploaded",
            AssetStatus::Processing => "processing",
            AssetStatus::Live => "live",
            AssetStatus::Paused => "paused",
            AssetStatus::Failed => "failed",
            AssetStatus::Duplicate => "duplicate",
            AssetStatus::Cremated => "cremated",
            AssetStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Asset as returned by the service.
///
/// Only the commonly used fields are typed; everything else (player ids,
/// preview image urls, included metadata/labels) is kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier
    #[serde(default)]
    pub embed_code: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AssetStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    /// Duration in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Fields returned through `include=` or not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Input for creating (or, when `embed_code` is set, updating) an asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct NewAsset {
    /// Existing asset id; when present the asset is patched instead of created
    #[serde(default, skip_serializing)]
    pub embed_code: Option<String>,

    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[validate(length(min = 1, message = "file_name must not be empty"))]
    pub file_name: String,

    #[validate(range(min = 1, message = "file_size must be positive"))]
    pub file_size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_at: Option<String>,

    /// Custom metadata applied after creation
    #[serde(default, skip_serializing)]
    pub metadata: Option<Map<String, Value>>,

    /// Label full paths assigned after creation
    #[serde(default, skip_serializing)]
    pub labels: Vec<String>,
}

impl NewAsset {
    pub fn new(name: impl Into<String>, file_name: impl Into<String>, file_size: u64) -> Self {
        Self {
            name: name.into(),
            file_name: file_name.into(),
            file_size,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_hosted_at(mut self, hosted_at: impl Into<String>) -> Self {
        self.hosted_at = Some(hosted_at.into());
        self
    }

    pub fn with_embed_code(mut self, embed_code: impl Into<String>) -> Self {
        self.embed_code = Some(embed_code.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

/// Partial update of an asset's data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted_at: Option<String>,
}

impl From<&NewAsset> for AssetPatch {
    fn from(asset: &NewAsset) -> Self {
        Self {
            name: Some(asset.name.clone()),
            description: Some(asset.description.clone()),
            hosted_at: asset.hosted_at.clone(),
        }
    }
}

/// Body of an upload status transition. The service only accepts `uploaded`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatus {
    pub status: String,
}

impl UploadStatus {
    pub fn uploaded() -> Self {
        Self {
            status: "uploaded".to_string(),
        }
    }
}

/// Body announcing a content replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementRequest {
    pub file_size: u64,
    pub chunk_size: u64,
}

/// Primary preview image selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewImageSelection {
    /// Use the most recently uploaded image file
    UploadedFile,
    /// Use a frame generated at `time` seconds
    Generated { time: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_asset_validation() {
        let ok = NewAsset::new("Clip", "clip.mp4", 1024);
        assert!(ok.validate().is_ok());

        let empty_name = NewAsset::new("", "clip.mp4", 1024);
        assert!(empty_name.validate().is_err());

        let zero_size = NewAsset::new("Clip", "clip.mp4", 0);
        assert!(zero_size.validate().is_err());
    }

    #[test]
    fn test_new_asset_serialization_skips_client_fields() {
        let asset = NewAsset::new("Clip", "clip.mp4", 1024)
            .with_embed_code("abc")
            .with_labels(vec!["News/Local".to_string()]);

        let json = serde_json::to_value(&asset).unwrap();
        assert!(json.get("embed_code").is_none());
        assert!(json.get("labels").is_none());
        assert!(json.get("metadata").is_none());
        assert_eq!(json["file_size"], 1024);
    }

    #[test]
    fn test_asset_deserialize_keeps_extra_fields() {
        let asset: Asset = serde_json::from_value(serde_json::json!({
            "embed_code": "abc",
            "name": "Clip",
            "status": "live",
            "player_id": "p1",
            "created_at": "2015-09-14T23:13:39Z"
        }))
        .unwrap();

        assert_eq!(asset.embed_code, "abc");
        assert_eq!(asset.status, Some(AssetStatus::Live));
        assert_eq!(asset.extra["player_id"], "p1");
        assert!(asset.created_at.is_some());
    }

    #[test]
    fn test_unknown_status() {
        let status: AssetStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(status, AssetStatus::Unknown);
    }

    #[test]
    fn test_preview_image_selection_serialization() {
        let generated =
            serde_json::to_value(PreviewImageSelection::Generated { time: 2.5 }).unwrap();
        assert_eq!(generated, serde_json::json!({"type": "generated", "time": 2.5}));

        let uploaded = serde_json::to_value(PreviewImageSelection::UploadedFile).unwrap();
        assert_eq!(uploaded, serde_json::json!({"type": "uploaded_file"}));
    }
}
