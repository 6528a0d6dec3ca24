//! Application state shared by every handler.

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::{
    AssetAccessService, CompletionService, CounterReconciler, DeletionService, OwnershipSweep,
    UploadSessionService,
};

#[derive(Clone)]
pub struct AppState {
    /// Database pool for readiness checks. Absent when the record store is not Postgres.
    pub pool: Option<PgPool>,
    pub uploads: Arc<UploadSessionService>,
    pub completion: Arc<CompletionService>,
    pub deletion: Arc<DeletionService>,
    pub access: Arc<AssetAccessService>,
    pub counters: Arc<CounterReconciler>,
    pub ownership: Arc<OwnershipSweep>,
}
