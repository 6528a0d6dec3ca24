//! Turns an upload session into persisted, owned image records.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use imgvault_core::models::{
    AssetRecord, AssetStatus, AuthorizationGrant, CallerIdentity, HostedAsset,
};
use imgvault_core::{AppError, TimeoutConfig, VariantPathTranslator};
use imgvault_db::{AssetStore, StoreError};
use imgvault_hosting::HostingService;
use imgvault_infra::{RelationService, SessionCache};

use super::bounded;
use super::upload_session::load_session;

enum Lookup {
    Found(AssetRecord, HostedAsset),
    Failed(String, anyhow::Error),
}

pub struct CompletionService {
    hosting: Arc<dyn HostingService>,
    assets: Arc<dyn AssetStore>,
    relations: Arc<dyn RelationService>,
    sessions: Arc<dyn SessionCache>,
    translator: VariantPathTranslator,
    hosting_timeout: Duration,
    store_timeout: Duration,
    relation_timeout: Duration,
    cache_timeout: Duration,
}

impl CompletionService {
    pub fn new(
        hosting: Arc<dyn HostingService>,
        assets: Arc<dyn AssetStore>,
        relations: Arc<dyn RelationService>,
        sessions: Arc<dyn SessionCache>,
        translator: VariantPathTranslator,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self {
            hosting,
            assets,
            relations,
            sessions,
            translator,
            hosting_timeout: timeouts.hosting_call,
            store_timeout: timeouts.store,
            relation_timeout: timeouts.relation,
            cache_timeout: timeouts.cache,
        }
    }

    /// Persists every uploaded image of the session, grants the caller
    /// ownership, and forgets the session.
    ///
    /// The session is only deleted once records and grants exist, so a failed
    /// call can be retried with the same session key. A retry after a grant
    /// failure finds its own records still pending and resumes from the grant. Images whose hosting
    /// lookup failed are reported with an error marker and not persisted.
    #[tracing::instrument(skip(self, caller), fields(operation = "complete_upload", user_id = %caller.user_id))]
    pub async fn complete(
        &self,
        session_key: &str,
        caller: &CallerIdentity,
    ) -> Result<Vec<AssetStatus>, AppError> {
        let session = load_session(self.sessions.as_ref(), session_key, self.cache_timeout)
            .await?
            .ok_or(AppError::SessionNotFound)?;
        let ids = session.asset_ids();

        let lookups = self.lookup_all(&ids, &caller.user_id).await;

        let records: Vec<AssetRecord> = lookups
            .iter()
            .filter_map(|lookup| match lookup {
                Lookup::Found(record, _) => Some(record.clone()),
                Lookup::Failed(..) => None,
            })
            .collect();

        if records.is_empty() {
            let cause = lookups
                .into_iter()
                .find_map(|lookup| match lookup {
                    Lookup::Failed(_, err) => Some(err),
                    Lookup::Found(..) => None,
                })
                .unwrap_or_else(|| anyhow::anyhow!("upload session holds no images"));
            return Err(AppError::external_store(
                "No uploaded image could be read from the hosting service",
                cause,
            ));
        }

        if let Err(e) = bounded(
            self.store_timeout,
            "bulk insert",
            self.assets.insert_many(&records),
        )
        .await
        {
            let duplicate = matches!(e.downcast_ref::<StoreError>(), Some(StoreError::Duplicate(_)));
            if !(duplicate && self.awaiting_grant(&records, caller).await) {
                return Err(AppError::bulk_insert(
                    format!("Failed to insert {} image records", records.len()),
                    e,
                ));
            }
            // An earlier call inserted these records and then failed to grant.
            tracing::info!("Records already persisted for this caller, resuming at ownership grant");
        }

        let persisted: Vec<String> = records.iter().map(|r| r.external_id.clone()).collect();
        self.grant_ownership(&persisted, caller).await?;

        if let Err(e) = bounded(
            self.cache_timeout,
            "session delete",
            self.sessions.delete(session_key),
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to delete completed upload session; it will expire");
        }

        tracing::info!(
            requested = ids.len(),
            persisted = persisted.len(),
            "Upload session completed"
        );

        Ok(lookups
            .into_iter()
            .map(|lookup| match lookup {
                Lookup::Found(record, hosted) => AssetStatus::completed(&record, &hosted),
                Lookup::Failed(id, err) => AssetStatus::failed(id, err.to_string()),
            })
            .collect())
    }

    /// One lookup per id, all in flight together, results in input order.
    async fn lookup_all(&self, ids: &[String], owner: &str) -> Vec<Lookup> {
        let fetches = ids.iter().map(|id| async move {
            match bounded(
                self.hosting_timeout,
                "image lookup",
                self.hosting.fetch_asset(id),
            )
            .await
            {
                Ok(hosted) => {
                    let record = AssetRecord::from_hosted(&hosted, &self.translator, Some(owner));
                    Lookup::Found(record, hosted)
                }
                Err(err) => {
                    tracing::warn!(image_id = %id, error = %err, "Image lookup failed");
                    Lookup::Failed(id.clone(), err)
                }
            }
        });
        join_all(fetches).await
    }

    /// Whether every record is already stored with `caller` as its pending owner.
    async fn awaiting_grant(&self, records: &[AssetRecord], caller: &CallerIdentity) -> bool {
        let lookups = records.iter().map(|record| {
            bounded(
                self.store_timeout,
                "record lookup",
                self.assets.find_by_external_id(&record.external_id),
            )
        });

        match try_join_all(lookups).await {
            Ok(stored) => stored.iter().all(|existing| {
                existing
                    .as_ref()
                    .and_then(|r| r.pending_owner.as_deref())
                    == Some(caller.user_id.as_str())
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to look up existing records");
                false
            }
        }
    }

    /// Grants ownership of every persisted image, then clears the pending
    /// marker. A marker left behind is picked up by the ownership sweep.
    async fn grant_ownership(
        &self,
        external_ids: &[String],
        caller: &CallerIdentity,
    ) -> Result<(), AppError> {
        let grants: Vec<AuthorizationGrant> = external_ids
            .iter()
            .map(|id| AuthorizationGrant::owner(id.clone(), caller.user_id.clone()))
            .collect();

        bounded(
            self.relation_timeout,
            "owner grants",
            self.relations.add_grants(&grants),
        )
        .await
        .map_err(|e| AppError::grant("Failed to grant image ownership", e))?;

        if let Err(e) = bounded(
            self.store_timeout,
            "clear pending owner",
            self.assets.clear_pending_owner(external_ids),
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to clear pending owner; the ownership sweep will retry");
        }
        Ok(())
    }
}
