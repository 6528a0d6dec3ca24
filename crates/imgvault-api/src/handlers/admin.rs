use std::sync::Arc;

use axum::{extract::State, Json};

use crate::error::{ErrorResponse, HttpAppError};
use crate::services::{ReconcileReport, SweepReport};
use crate::state::AppState;

/// Merge buffered access counts now instead of waiting for the next interval.
#[utoipa::path(
    post,
    path = "/internal/counters/reconcile",
    tag = "internal",
    responses(
        (status = 200, description = "Reconciliation summary", body = ReconcileReport),
        (status = 503, description = "Counter store unavailable", body = ErrorResponse)
    )
)]
pub async fn reconcile_counters(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReconcileReport>, HttpAppError> {
    Ok(Json(state.counters.reconcile().await?))
}

/// Repair unconfirmed owner grants now instead of waiting for the next interval.
#[utoipa::path(
    post,
    path = "/internal/ownership/sweep",
    tag = "internal",
    responses(
        (status = 200, description = "Sweep summary", body = SweepReport),
        (status = 503, description = "Record store unavailable", body = ErrorResponse)
    )
)]
pub async fn sweep_ownership(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SweepReport>, HttpAppError> {
    Ok(Json(state.ownership.sweep().await?))
}
