//! Route configuration and setup.

use crate::api_doc::ApiDoc;
use crate::constants::{API_PREFIX, INTERNAL_PREFIX};
use crate::handlers::{admin, assets, health, uploads};
use crate::state::AppState;
use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Json, Router,
};
use imgvault_core::Config;
use imgvault_infra::request_id_middleware;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

const HTTP_CONCURRENCY_LIMIT: usize = 10_000;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router {
    let cors = setup_cors(config);

    Router::new()
        .merge(image_routes())
        .merge(internal_routes())
        .route("/health", get(health::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}

fn image_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/images/uploads", API_PREFIX),
            post(uploads::create_uploads).delete(uploads::clear_uploads),
        )
        .route(
            &format!("{}/images/uploads/complete", API_PREFIX),
            post(uploads::complete_uploads),
        )
        .route(
            &format!("{}/images/batch-delete", API_PREFIX),
            post(assets::batch_delete),
        )
        .route(
            &format!("{}/images/{{id}}", API_PREFIX),
            delete(assets::delete_image),
        )
        .route(
            &format!("{}/access/images/{{id}}", API_PREFIX),
            get(assets::check_access),
        )
        .route(
            &format!("{}/images/{{id}}/{{variant}}", API_PREFIX),
            get(assets::redirect_to_variant),
        )
        .route(
            &format!("{}/images/{{id}}/{{variant}}/uri", API_PREFIX),
            get(assets::variant_uri),
        )
}

fn internal_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/counters/reconcile", INTERNAL_PREFIX),
            post(admin::reconcile_counters),
        )
        .route(
            &format!("{}/ownership/sweep", INTERNAL_PREFIX),
            post(admin::sweep_ownership),
        )
}

fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        // Credentialed requests carry the session cookie across origins.
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderName::from_static("x-session-id"),
                axum::http::HeaderName::from_static("x-user-id"),
            ])
            .allow_credentials(true)
    }
}
