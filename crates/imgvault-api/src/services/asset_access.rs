use std::sync::Arc;
use std::time::Duration;

use imgvault_core::models::NS_IMAGE;
use imgvault_core::{AppError, TimeoutConfig};
use imgvault_db::AssetStore;
use imgvault_infra::{CounterCache, RelationService};
use tokio::task::JoinHandle;

use super::bounded;

/// Read path: variant lookup, access counting and permission checks.
pub struct AssetAccessService {
    assets: Arc<dyn AssetStore>,
    relations: Arc<dyn RelationService>,
    counters: Arc<dyn CounterCache>,
    store_timeout: Duration,
    relation_timeout: Duration,
    cache_timeout: Duration,
}

impl AssetAccessService {
    pub fn new(
        assets: Arc<dyn AssetStore>,
        relations: Arc<dyn RelationService>,
        counters: Arc<dyn CounterCache>,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self {
            assets,
            relations,
            counters,
            store_timeout: timeouts.store,
            relation_timeout: timeouts.relation,
            cache_timeout: timeouts.cache,
        }
    }

    /// Internal CDN path of one variant. Counts the access without waiting for it.
    #[tracing::instrument(skip(self), fields(operation = "get_asset_uri"))]
    pub async fn asset_uri(&self, external_id: &str, variant: &str) -> Result<String, AppError> {
        let record = bounded(
            self.store_timeout,
            "record lookup",
            self.assets.find_by_external_id(external_id),
        )
        .await
        .map_err(|e| AppError::store_query("Failed to look up image", e))?
        .ok_or_else(|| AppError::AssetNotFound(external_id.to_string()))?;

        let uri = record
            .variants
            .get(variant)
            .cloned()
            .ok_or_else(|| AppError::VariantNotFound {
                asset_id: external_id.to_string(),
                variant: variant.to_string(),
            })?;

        self.record_access(external_id);
        Ok(uri)
    }

    /// Increments the access counter on a detached task. Failures are only logged.
    pub fn record_access(&self, external_id: &str) -> JoinHandle<()> {
        let counters = self.counters.clone();
        let external_id = external_id.to_string();
        let limit = self.cache_timeout;

        tokio::spawn(async move {
            if let Err(e) = bounded(limit, "counter increment", counters.incr_by(&external_id, 1)).await {
                tracing::warn!(image_id = %external_id, error = %e, "Failed to record image access");
            }
        })
    }

    #[tracing::instrument(skip(self), fields(operation = "check_access"))]
    pub async fn check_access(
        &self,
        external_id: &str,
        relation: &str,
        subject_id: &str,
    ) -> Result<bool, AppError> {
        bounded(
            self.relation_timeout,
            "access check",
            self.relations
                .check(NS_IMAGE, external_id, relation, subject_id),
        )
        .await
        .map_err(|e| AppError::grant_check("Failed to check image access", e))
    }
}
