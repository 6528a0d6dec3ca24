use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use imgvault_core::models::{is_valid_asset_id, NS_IMAGE};
use imgvault_core::{AppError, TimeoutConfig};
use imgvault_db::AssetStore;
use imgvault_hosting::HostingService;
use imgvault_infra::RelationService;

use super::bounded;

/// Removes images from the hosting service, the record store and the
/// relation service, in that order.
///
/// Each phase stops the cascade on failure and completed phases are not
/// undone. Every phase tolerates already-deleted state, so retrying a failed
/// delete converges.
pub struct DeletionService {
    hosting: Arc<dyn HostingService>,
    assets: Arc<dyn AssetStore>,
    relations: Arc<dyn RelationService>,
    hosting_timeout: Duration,
    store_timeout: Duration,
    relation_timeout: Duration,
}

impl DeletionService {
    pub fn new(
        hosting: Arc<dyn HostingService>,
        assets: Arc<dyn AssetStore>,
        relations: Arc<dyn RelationService>,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self {
            hosting,
            assets,
            relations,
            hosting_timeout: timeouts.hosting_call,
            store_timeout: timeouts.store,
            relation_timeout: timeouts.relation,
        }
    }

    pub async fn delete(&self, external_id: &str) -> Result<(), AppError> {
        self.delete_many(&[external_id.to_string()]).await
    }

    #[tracing::instrument(skip(self), fields(operation = "delete_images", count = external_ids.len()))]
    pub async fn delete_many(&self, external_ids: &[String]) -> Result<(), AppError> {
        if external_ids.is_empty() {
            return Ok(());
        }
        if let Some(bad) = external_ids.iter().find(|id| !is_valid_asset_id(id)) {
            return Err(AppError::InvalidInput(format!("Invalid image id: {:?}", bad)));
        }

        bounded(
            self.hosting_timeout,
            "hosting delete",
            self.hosting.delete_assets(external_ids),
        )
        .await
        .map_err(|e| AppError::external_store("Failed to delete images from hosting service", e))?;

        let removed = bounded(
            self.store_timeout,
            "record delete",
            self.assets.delete_by_external_ids(external_ids),
        )
        .await
        .map_err(|e| AppError::store_delete("Failed to delete image records", e))?;

        let grant_deletes = external_ids
            .iter()
            .map(|id| self.relations.delete_object(NS_IMAGE, id));
        bounded(
            self.relation_timeout,
            "grant delete",
            try_join_all(grant_deletes),
        )
        .await
        .map_err(|e| AppError::grant_delete("Failed to delete image grants", e))?;

        tracing::info!(requested = external_ids.len(), removed, "Images deleted");
        Ok(())
    }
}
