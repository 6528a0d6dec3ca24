use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Image format declared by the client at upload time.
///
/// Serialized with the upper-case wire names; anything unrecognised reads as
/// `Unspecified` rather than failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageFormat {
    #[default]
    Unspecified,
    Jpeg,
    Png,
    Gif,
    Webp,
    Heic,
    Svg,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Unspecified => "UNSPECIFIED",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Png => "PNG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Webp => "WEBP",
            ImageFormat::Heic => "HEIC",
            ImageFormat::Svg => "SVG",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "JPEG" | "JPG" => ImageFormat::Jpeg,
            "PNG" => ImageFormat::Png,
            "GIF" => ImageFormat::Gif,
            "WEBP" => ImageFormat::Webp,
            "HEIC" => ImageFormat::Heic,
            "SVG" => ImageFormat::Svg,
            _ => ImageFormat::Unspecified,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ImageFormat {
    fn from(value: String) -> Self {
        ImageFormat::parse(&value)
    }
}

impl From<ImageFormat> for String {
    fn from(value: ImageFormat) -> Self {
        value.as_str().to_string()
    }
}

/// One image the client intends to upload
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct UploadItem {
    /// File size in bytes
    #[validate(range(min = 1, message = "Image size must be at least 1 byte"))]
    pub size: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    #[schema(value_type = String, example = "JPEG")]
    pub format: ImageFormat,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,
}

impl UploadItem {
    /// Metadata attached to the hosted image. Every value is a string; the
    /// coordinates are only present when the client supplied them.
    pub fn to_hosting_metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::from([
            ("width".to_string(), self.width.to_string()),
            ("height".to_string(), self.height.to_string()),
            ("format".to_string(), self.format.as_str().to_string()),
            ("size".to_string(), self.size.to_string()),
        ]);
        if let Some(latitude) = self.latitude {
            meta.insert("latitude".to_string(), latitude.to_string());
        }
        if let Some(longitude) = self.longitude {
            meta.insert("longitude".to_string(), longitude.to_string());
        }
        meta
    }
}

/// A pre-signed direct upload URL and the hosted image id it will fill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SignedUpload {
    pub image_id: String,
    pub upload_url: String,
}

/// URLs issued for one caller session, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    pub uploads: Vec<SignedUpload>,
}

impl UploadSession {
    pub fn new(uploads: Vec<SignedUpload>) -> Self {
        Self { uploads }
    }

    pub fn asset_ids(&self) -> Vec<String> {
        self.uploads.iter().map(|u| u.image_id.clone()).collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
