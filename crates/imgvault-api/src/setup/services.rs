//! Wires collaborators into the lifecycle services.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use imgvault_core::{Config, VariantPathTranslator};
use imgvault_db::{AssetRepository, AssetStore};
use imgvault_hosting::{create_hosting_service, HostingService};
use imgvault_infra::{create_cache, Caches, KetoRelationClient, RelationService};
use sqlx::PgPool;
use tokio::task::JoinHandle;

use crate::services::{
    AssetAccessService, CompletionService, CounterReconciler, DeletionService, OwnershipSweep,
    UploadSessionService,
};
use crate::state::AppState;

/// External systems the services talk to.
pub struct Collaborators {
    pub hosting: Arc<dyn HostingService>,
    pub assets: Arc<dyn AssetStore>,
    pub relations: Arc<dyn RelationService>,
    pub caches: Caches,
}

/// Connect every collaborator described by the configuration.
pub async fn initialize_services(config: &Config, pool: PgPool) -> Result<Arc<AppState>> {
    let hosting = create_hosting_service(config).context("Failed to create hosting service")?;

    let caches = create_cache(config.cache())
        .await
        .context("Failed to connect to cache")?;

    let relation_http = reqwest::Client::builder()
        .timeout(config.timeouts().relation)
        .build()
        .context("Failed to create relation service HTTP client")?;
    let relations: Arc<dyn RelationService> = Arc::new(KetoRelationClient::new(
        relation_http,
        &config.relation().read_url,
        &config.relation().write_url,
    ));

    let assets: Arc<dyn AssetStore> = Arc::new(AssetRepository::new(pool.clone()));

    tracing::info!("Services initialized");

    Ok(Arc::new(build_state(
        config,
        Some(pool),
        Collaborators {
            hosting,
            assets,
            relations,
            caches,
        },
    )))
}

pub fn build_state(config: &Config, pool: Option<PgPool>, c: Collaborators) -> AppState {
    let timeouts = config.timeouts();
    let translator = VariantPathTranslator::new(config.cdn_root());

    AppState {
        pool,
        uploads: Arc::new(UploadSessionService::new(
            c.hosting.clone(),
            c.caches.sessions.clone(),
            config.cache(),
            timeouts,
        )),
        completion: Arc::new(CompletionService::new(
            c.hosting.clone(),
            c.assets.clone(),
            c.relations.clone(),
            c.caches.sessions.clone(),
            translator,
            timeouts,
        )),
        deletion: Arc::new(DeletionService::new(
            c.hosting,
            c.assets.clone(),
            c.relations.clone(),
            timeouts,
        )),
        access: Arc::new(AssetAccessService::new(
            c.assets.clone(),
            c.relations.clone(),
            c.caches.counters.clone(),
            timeouts,
        )),
        counters: Arc::new(CounterReconciler::new(
            c.caches.counters,
            c.assets.clone(),
            timeouts,
        )),
        ownership: Arc::new(OwnershipSweep::new(
            c.assets,
            c.relations,
            config.reconcile(),
            timeouts,
        )),
    }
}

/// Start the periodic reconciliation loops. An interval of zero disables a loop.
pub fn start_background_tasks(config: &Config, state: &AppState) -> Vec<JoinHandle<()>> {
    let reconcile = config.reconcile();
    let mut handles = Vec::new();

    if reconcile.counter_interval_secs > 0 {
        let every = Duration::from_secs(reconcile.counter_interval_secs);
        handles.push(state.counters.clone().start(every));
        tracing::info!(interval_secs = reconcile.counter_interval_secs, "Counter reconciliation enabled");
    }

    if reconcile.ownership_sweep_interval_secs > 0 {
        let every = Duration::from_secs(reconcile.ownership_sweep_interval_secs);
        handles.push(state.ownership.clone().start(every));
        tracing::info!(
            interval_secs = reconcile.ownership_sweep_interval_secs,
            "Ownership sweep enabled"
        );
    }

    handles
}
