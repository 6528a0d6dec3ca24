use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct HealthCheckResponse {
    status: &'static str,
    database: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match &state.pool {
        None => "not_configured".to_string(),
        Some(pool) => {
            match tokio::time::timeout(CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await
            {
                Ok(Ok(_)) => "healthy".to_string(),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Database health check failed");
                    format!("unhealthy: {}", e)
                }
                Err(_) => {
                    tracing::error!("Database health check timed out");
                    "timeout".to_string()
                }
            }
        }
    };

    let healthy = database == "healthy" || database == "not_configured";
    let (code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (code, Json(HealthCheckResponse { status, database }))
}
