use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    Json,
};
use imgvault_core::AppError;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::MessageResponse;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BatchDeleteRequest {
    #[validate(length(max = 100, message = "At most 100 images per request"))]
    pub image_ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VariantUriResponse {
    /// Path under the CDN root
    pub uri: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AccessQuery {
    /// Relation to test, e.g. `owner`
    pub relation: String,
    /// User id to test the relation for
    pub subject: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccessResponse {
    pub allowed: bool,
}

#[utoipa::path(
    delete,
    path = "/api/v0/images/{id}",
    tag = "images",
    params(("id" = String, Path, description = "Hosted image ID")),
    responses(
        (status = 200, description = "Image deleted", body = MessageResponse),
        (status = 502, description = "Hosting service unavailable", body = ErrorResponse),
        (status = 503, description = "Record store or relation service unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "delete_image"))]
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    state.deletion.delete(&id).await?;
    Ok(Json(MessageResponse::new("Image deleted")))
}

#[utoipa::path(
    post,
    path = "/api/v0/images/batch-delete",
    tag = "images",
    request_body = BatchDeleteRequest,
    responses(
        (status = 200, description = "Images deleted", body = MessageResponse),
        (status = 502, description = "Hosting service unavailable", body = ErrorResponse),
        (status = 503, description = "Record store or relation service unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(operation = "batch_delete", count = request.image_ids.len()))]
pub async fn batch_delete(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<BatchDeleteRequest>,
) -> Result<Json<MessageResponse>, HttpAppError> {
    state.deletion.delete_many(&request.image_ids).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} images deleted",
        request.image_ids.len()
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v0/images/{id}/{variant}",
    tag = "images",
    params(
        ("id" = String, Path, description = "Hosted image ID"),
        ("variant" = String, Path, description = "Variant name, e.g. public")
    ),
    responses(
        (status = 307, description = "Redirect to the variant's CDN path"),
        (status = 404, description = "Image or variant not found", body = ErrorResponse)
    )
)]
pub async fn redirect_to_variant(
    State(state): State<Arc<AppState>>,
    Path((id, variant)): Path<(String, String)>,
) -> Result<Redirect, HttpAppError> {
    let uri = state.access.asset_uri(&id, &variant).await?;
    Ok(Redirect::temporary(&uri))
}

#[utoipa::path(
    get,
    path = "/api/v0/images/{id}/{variant}/uri",
    tag = "images",
    params(
        ("id" = String, Path, description = "Hosted image ID"),
        ("variant" = String, Path, description = "Variant name, e.g. public")
    ),
    responses(
        (status = 200, description = "Variant CDN path", body = VariantUriResponse),
        (status = 404, description = "Image or variant not found", body = ErrorResponse)
    )
)]
pub async fn variant_uri(
    State(state): State<Arc<AppState>>,
    Path((id, variant)): Path<(String, String)>,
) -> Result<Json<VariantUriResponse>, HttpAppError> {
    let uri = state.access.asset_uri(&id, &variant).await?;
    Ok(Json(VariantUriResponse { uri }))
}

#[utoipa::path(
    get,
    path = "/api/v0/access/images/{id}",
    tag = "images",
    params(("id" = String, Path, description = "Hosted image ID"), AccessQuery),
    responses(
        (status = 200, description = "Whether the subject holds the relation", body = AccessResponse),
        (status = 400, description = "Missing relation or subject", body = ErrorResponse),
        (status = 503, description = "Relation service unavailable", body = ErrorResponse)
    )
)]
pub async fn check_access(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<AccessResponse>, HttpAppError> {
    if query.relation.trim().is_empty() || query.subject.trim().is_empty() {
        return Err(AppError::InvalidInput("relation and subject are required".to_string()).into());
    }

    let allowed = state
        .access
        .check_access(&id, &query.relation, &query.subject)
        .await?;
    Ok(Json(AccessResponse { allowed }))
}
