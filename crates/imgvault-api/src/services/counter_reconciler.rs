//! Merges buffered access counts into the persistent records.

use std::sync::Arc;
use std::time::Duration;

use imgvault_core::{AppError, TimeoutConfig};
use imgvault_db::AssetStore;
use imgvault_infra::CounterCache;
use serde::Serialize;
use tokio::time::interval;
use utoipa::ToSchema;

use super::bounded;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReconcileReport {
    /// Counters found in the cache
    pub scanned: usize,
    /// Counters merged into a record
    pub applied: usize,
    /// Counters dropped because no record exists for the id
    pub orphaned: usize,
    /// Counters left for the next run
    pub failed: usize,
}

pub struct CounterReconciler {
    counters: Arc<dyn CounterCache>,
    assets: Arc<dyn AssetStore>,
    store_timeout: Duration,
    cache_timeout: Duration,
}

impl CounterReconciler {
    pub fn new(
        counters: Arc<dyn CounterCache>,
        assets: Arc<dyn AssetStore>,
        timeouts: &TimeoutConfig,
    ) -> Self {
        Self {
            counters,
            assets,
            store_timeout: timeouts.store,
            cache_timeout: timeouts.cache,
        }
    }

    /// Start the background merge loop. Returns a JoinHandle for shutdown.
    pub fn start(self: Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);

            loop {
                ticker.tick().await;

                match self.reconcile().await {
                    Ok(report) if report.scanned > 0 => {
                        tracing::info!(?report, "Access counters reconciled");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!(error = %e, "Access counter reconciliation failed"),
                }
            }
        })
    }

    /// Drains every counter and adds it to the matching record's count.
    ///
    /// A counter is removed atomically before it is merged. If the merge
    /// fails, the drained delta is added back so the next run retries it.
    #[tracing::instrument(skip(self), fields(operation = "reconcile_counters"))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, AppError> {
        let ids = bounded(self.cache_timeout, "counter scan", self.counters.scan_ids())
            .await
            .map_err(|e| AppError::counter_store("Failed to scan access counters", e))?;

        let mut report = ReconcileReport {
            scanned: ids.len(),
            ..Default::default()
        };

        for id in &ids {
            let delta = match bounded(self.cache_timeout, "counter drain", self.counters.take(id)).await {
                Ok(delta) => delta,
                Err(e) => {
                    tracing::warn!(image_id = %id, error = %e, "Failed to drain access counter");
                    report.failed += 1;
                    continue;
                }
            };
            if delta == 0 {
                continue;
            }

            match bounded(
                self.store_timeout,
                "count merge",
                self.assets.increment_count(id, delta),
            )
            .await
            {
                Ok(true) => report.applied += 1,
                Ok(false) => {
                    tracing::debug!(image_id = %id, delta, "Dropping access count for unknown image");
                    report.orphaned += 1;
                }
                Err(e) => {
                    tracing::warn!(image_id = %id, delta, error = %e, "Failed to merge access count");
                    report.failed += 1;
                    self.credit_back(id, delta).await;
                }
            }
        }

        Ok(report)
    }

    async fn credit_back(&self, id: &str, delta: i64) {
        if let Err(e) = bounded(
            self.cache_timeout,
            "counter credit",
            self.counters.incr_by(id, delta),
        )
        .await
        {
            tracing::error!(image_id = %id, delta, error = %e, "Access count lost");
        }
    }
}
