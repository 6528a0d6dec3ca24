use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::upload::ImageFormat;
use crate::variant_path::VariantPathTranslator;

/// Hosting ids are ASCII letters, digits, `-` and `_`.
pub fn is_valid_asset_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Image as reported by the hosting service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedAsset {
    pub id: String,
    pub filename: String,
    pub uploaded: DateTime<Utc>,
    /// Metadata written at URL issuance; every value is a string
    pub meta: BTreeMap<String, String>,
    /// Absolute delivery URLs, one per variant
    pub variants: Vec<String>,
}

impl HostedAsset {
    fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn width(&self) -> u32 {
        self.meta_value("width")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.meta_value("height")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn size(&self) -> u64 {
        self.meta_value("size")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn format(&self) -> ImageFormat {
        self.meta_value("format")
            .map(ImageFormat::parse)
            .unwrap_or_default()
    }

    pub fn latitude(&self) -> Option<f64> {
        self.meta_value("latitude").and_then(|v| v.parse().ok())
    }

    pub fn longitude(&self) -> Option<f64> {
        self.meta_value("longitude").and_then(|v| v.parse().ok())
    }

    /// Location is only known when both coordinates are.
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.longitude(), self.latitude()) {
            (Some(longitude), Some(latitude)) => Some(GeoPoint {
                longitude,
                latitude,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

/// Persisted image record (table `assets`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: Uuid,
    /// Hosting service id; unique across records
    pub external_id: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    pub size: i64,
    pub location: Option<GeoPoint>,
    pub meta: BTreeMap<String, String>,
    /// Variant name to internal CDN path
    pub variants: BTreeMap<String, String>,
    pub count: i64,
    /// Subject whose owner grant has not been confirmed yet
    pub pending_owner: Option<String>,
}

impl AssetRecord {
    pub fn from_hosted(
        hosted: &HostedAsset,
        translator: &VariantPathTranslator,
        pending_owner: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: hosted.id.clone(),
            filename: hosted.filename.clone(),
            uploaded_at: hosted.uploaded,
            size: i64::try_from(hosted.size()).unwrap_or(i64::MAX),
            location: hosted.location(),
            meta: hosted.meta.clone(),
            variants: translator.translate_all(&hosted.variants),
            count: 0,
            pending_owner: pending_owner.map(str::to_string),
        }
    }
}

/// Image metadata returned to the client on completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AssetMetadata {
    pub width: u32,
    pub height: u32,
    #[schema(example = "JPEG")]
    pub format: String,
    pub size: u64,
    /// RFC 3339 upload time
    pub upload_time: String,
}

impl From<&HostedAsset> for AssetMetadata {
    fn from(hosted: &HostedAsset) -> Self {
        Self {
            width: hosted.width(),
            height: hosted.height(),
            format: hosted.format().as_str().to_string(),
            size: hosted.size(),
            upload_time: hosted.uploaded.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Per-image outcome of completing an upload session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AssetStatus {
    pub image_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AssetMetadata>,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
    /// Set when the hosting lookup for this image failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssetStatus {
    pub fn completed(record: &AssetRecord, hosted: &HostedAsset) -> Self {
        Self {
            image_id: record.external_id.clone(),
            metadata: Some(AssetMetadata::from(hosted)),
            variants: record.variants.clone(),
            error: None,
        }
    }

    pub fn failed(image_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            metadata: None,
            variants: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
