use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use imgvault_core::models::{UploadItem, UploadSession};
use imgvault_core::{AppError, CacheConfig, TimeoutConfig};
use imgvault_hosting::HostingService;
use imgvault_infra::SessionCache;

use super::bounded;

/// Reads a session. A stored value that no longer parses is treated as a
/// store failure rather than a missing session.
pub(crate) async fn load_session(
    sessions: &dyn SessionCache,
    key: &str,
    limit: Duration,
) -> Result<Option<UploadSession>, AppError> {
    let raw = bounded(limit, "session read", sessions.get(key))
        .await
        .map_err(|e| AppError::session_store("Failed to read upload session", e))?;

    raw.map(|raw| {
        UploadSession::from_json(&raw)
            .map_err(|e| AppError::session_store("Stored upload session is corrupt", e))
    })
    .transpose()
}

/// Issues pre-signed upload URLs once per session key.
pub struct UploadSessionService {
    hosting: Arc<dyn HostingService>,
    sessions: Arc<dyn SessionCache>,
    session_ttl: Duration,
    batch_timeout: Duration,
    cache_timeout: Duration,
}

impl UploadSessionService {
    pub fn new(
        hosting: Arc<dyn HostingService>,
        sessions: Arc<dyn SessionCache>,
        cache: &CacheConfig,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self {
            hosting,
            sessions,
            session_ttl: cache.session_ttl,
            batch_timeout: timeouts.upload_batch,
            cache_timeout: timeouts.cache,
        }
    }

    /// Returns the upload URLs for `session_key`, allocating them from the
    /// hosting service only if the session does not exist yet.
    #[tracing::instrument(skip(self, items), fields(operation = "batch_upload", items = items.len()))]
    pub async fn batch_upload(
        &self,
        session_key: &str,
        items: &[UploadItem],
    ) -> Result<UploadSession, AppError> {
        if items.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one image is required".to_string(),
            ));
        }

        if let Some(existing) =
            load_session(self.sessions.as_ref(), session_key, self.cache_timeout).await?
        {
            tracing::debug!(uploads = existing.uploads.len(), "Replaying existing upload session");
            return Ok(existing);
        }

        let requests = items.iter().map(|item| {
            let metadata = item.to_hosting_metadata();
            async move { self.hosting.issue_upload_url(&metadata).await }
        });
        let uploads = bounded(self.batch_timeout, "upload URL batch", try_join_all(requests))
            .await
            .map_err(|e| AppError::external_store("Failed to issue upload URLs", e))?;

        let session = UploadSession::new(uploads);
        let value = session
            .to_json()
            .map_err(|e| AppError::session_write("Failed to encode upload session", e))?;

        let stored = bounded(
            self.cache_timeout,
            "session write",
            self.sessions
                .set_if_absent(session_key, &value, self.session_ttl),
        )
        .await
        .map_err(|e| AppError::session_write("Failed to store upload session", e))?;

        if stored {
            tracing::info!(uploads = session.uploads.len(), "Upload session created");
            return Ok(session);
        }

        // A concurrent request for the same key stored its URLs first; ours are abandoned.
        tracing::info!("Concurrent upload session won, returning stored URLs");
        load_session(self.sessions.as_ref(), session_key, self.cache_timeout)
            .await?
            .ok_or_else(|| {
                AppError::session_write(
                    "Upload session disappeared after a concurrent write",
                    anyhow::anyhow!("session {} expired before it could be read", session_key),
                )
            })
    }

    /// Forgets the session. Clearing an absent session succeeds.
    #[tracing::instrument(skip(self), fields(operation = "clear_session"))]
    pub async fn clear(&self, session_key: &str) -> Result<(), AppError> {
        bounded(self.cache_timeout, "session delete", self.sessions.delete(session_key))
            .await
            .map_err(|e| AppError::session_store("Failed to clear upload session", e))
    }
}
