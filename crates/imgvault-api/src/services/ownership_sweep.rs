//! Repairs records whose owner grant was never confirmed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use imgvault_core::models::AuthorizationGrant;
use imgvault_core::{AppError, ReconcileConfig, TimeoutConfig};
use imgvault_db::AssetStore;
use imgvault_infra::RelationService;
use serde::Serialize;
use tokio::time::interval;
use utoipa::ToSchema;

use super::bounded;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Records found with an unconfirmed owner
    pub examined: usize,
    /// Records whose grant was created and marker cleared
    pub repaired: usize,
    /// Records left for the next run
    pub failed: usize,
}

pub struct OwnershipSweep {
    assets: Arc<dyn AssetStore>,
    relations: Arc<dyn RelationService>,
    batch_size: i64,
    grace: chrono::Duration,
    store_timeout: Duration,
    relation_timeout: Duration,
}

impl OwnershipSweep {
    pub fn new(
        assets: Arc<dyn AssetStore>,
        relations: Arc<dyn RelationService>,
        reconcile: &ReconcileConfig,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self {
            assets,
            relations,
            batch_size: reconcile.ownership_sweep_batch_size,
            grace: chrono::Duration::seconds(reconcile.ownership_sweep_grace_secs),
            store_timeout: timeouts.store,
            relation_timeout: timeouts.relation,
        }
    }

    /// Start the background sweep loop. Returns a JoinHandle for shutdown.
    pub fn start(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);

            loop {
                ticker.tick().await;

                match self.sweep().await {
                    Ok(report) if report.examined > 0 => {
                        tracing::info!(?report, "Ownership sweep finished");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Ownership sweep failed"),
                }
            }
        })
    }

    /// Re-creates the owner grant of records still marked with a pending
    /// owner once they are older than the grace period, which keeps the sweep
    /// clear of completions that are still in flight.
    #[tracing::instrument(skip(self), fields(operation = "sweep_ownership"))]
    pub async fn sweep(&self) -> Result<SweepReport, AppError> {
        let cutoff = Utc::now() - self.grace;
        let pending = bounded(
            self.store_timeout,
            "pending owner scan",
            self.assets.list_pending_owner(cutoff, self.batch_size),
        )
        .await
        .map_err(|e| AppError::store_query("Failed to list records awaiting an owner", e))?;

        let mut report = SweepReport {
            examined: pending.len(),
            ..Default::default()
        };

        for record in pending {
            let Some(owner) = record.pending_owner.as_deref() else {
                continue;
            };
            let grant = AuthorizationGrant::owner(record.external_id.clone(), owner);

            if let Err(e) = bounded(
                self.relation_timeout,
                "owner grant",
                self.relations.add_grant(&grant),
            )
            .await
            {
                tracing::warn!(image_id = %record.external_id, error = %e, "Owner grant still failing");
                report.failed += 1;
                continue;
            }

            match bounded(
                self.store_timeout,
                "clear pending owner",
                self.assets
                    .clear_pending_owner(std::slice::from_ref(&record.external_id)),
            )
            .await
            {
                Ok(_) => report.repaired += 1,
                Err(e) => {
                    tracing::warn!(image_id = %record.external_id, error = %e, "Failed to clear pending owner");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
