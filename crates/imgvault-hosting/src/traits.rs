//! Hosting service abstraction trait

use std::collections::BTreeMap;

use async_trait::async_trait;
use imgvault_core::models::{HostedAsset, SignedUpload};
use thiserror::Error;

/// Hosting operation errors
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("Hosting API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Invalid image id: {0:?}")]
    InvalidId(String),

    #[error("Invalid hosting response: {0}")]
    InvalidResponse(String),

    #[error("Failed to obtain credentials: {0}")]
    Credential(String),

    #[error("Hosting request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for hosting operations
pub type HostingResult<T> = Result<T, HostingError>;

/// External image hosting service.
///
/// Implementations must treat deleting an image that no longer exists as
/// success, so a deletion cascade can be retried to completion.
#[async_trait]
pub trait HostingService: Send + Sync {
    /// Issue a pre-signed direct upload URL carrying the given metadata.
    async fn issue_upload_url(
        &self,
        metadata: &BTreeMap<String, String>,
    ) -> HostingResult<SignedUpload>;

    /// Fetch what the hosting service knows about an uploaded image.
    async fn fetch_asset(&self, id: &str) -> HostingResult<HostedAsset>;

    /// Delete an image. Deleting a missing image is not an error.
    async fn delete_asset(&self, id: &str) -> HostingResult<()>;

    /// Delete several images concurrently, failing on the first error.
    async fn delete_assets(&self, ids: &[String]) -> HostingResult<()> {
        futures::future::try_join_all(ids.iter().map(|id| self.delete_asset(id))).await?;
        Ok(())
    }
}
