use std::sync::Arc;

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::IntoResponse,
    Json,
};
use imgvault_core::models::{AssetStatus, SignedUpload, UploadItem};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::MessageResponse;
use crate::constants::SESSION_COOKIE;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::extractors::{Caller, SessionKey};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BatchUploadRequest {
    /// At most 100 images per request
    #[validate(
        length(min = 1, max = 100, message = "Between 1 and 100 images per request"),
        nested
    )]
    pub images: Vec<UploadItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchUploadResponse {
    /// Key to present (cookie or header) when completing or clearing the session
    pub session_key: String,
    pub images: Vec<SignedUpload>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompleteUploadResponse {
    pub images: Vec<AssetStatus>,
}

fn session_cookie(key: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, key)
}

#[utoipa::path(
    post,
    path = "/api/v0/images/uploads",
    tag = "uploads",
    request_body = BatchUploadRequest,
    params(
        ("X-Session-Id" = Option<String>, Header, description = "Upload session key (alternative to the session_id cookie)")
    ),
    responses(
        (status = 200, description = "Upload URLs issued or replayed", body = BatchUploadResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Hosting service unavailable", body = ErrorResponse),
        (status = 503, description = "Session store unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, session, request), fields(operation = "batch_upload"))]
pub async fn create_uploads(
    State(state): State<Arc<AppState>>,
    session: SessionKey,
    ValidatedJson(request): ValidatedJson<BatchUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let session_key = session.0.unwrap_or_else(|| Uuid::new_v4().to_string());

    let session = state
        .uploads
        .batch_upload(&session_key, &request.images)
        .await?;

    Ok((
        [(SET_COOKIE, session_cookie(&session_key))],
        Json(BatchUploadResponse {
            session_key,
            images: session.uploads,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v0/images/uploads/complete",
    tag = "uploads",
    params(
        ("X-Session-Id" = Option<String>, Header, description = "Upload session key (alternative to the session_id cookie)"),
        ("X-User-Id" = String, Header, description = "Authenticated caller")
    ),
    responses(
        (status = 200, description = "Per-image completion status", body = CompleteUploadResponse),
        (status = 401, description = "Missing caller identity", body = ErrorResponse),
        (status = 404, description = "Upload session not found", body = ErrorResponse),
        (status = 502, description = "Hosting service unavailable", body = ErrorResponse),
        (status = 503, description = "Record store or relation service unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, caller, session), fields(operation = "complete_upload"))]
pub async fn complete_uploads(
    State(state): State<Arc<AppState>>,
    Caller(caller): Caller,
    session: SessionKey,
) -> Result<Json<CompleteUploadResponse>, HttpAppError> {
    let session_key = session.require()?;
    let images = state.completion.complete(&session_key, &caller).await?;
    Ok(Json(CompleteUploadResponse { images }))
}

#[utoipa::path(
    delete,
    path = "/api/v0/images/uploads",
    tag = "uploads",
    params(
        ("X-Session-Id" = Option<String>, Header, description = "Upload session key (alternative to the session_id cookie)")
    ),
    responses(
        (status = 200, description = "Session cleared", body = MessageResponse),
        (status = 503, description = "Session store unavailable", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, session), fields(operation = "clear_session"))]
pub async fn clear_uploads(
    State(state): State<Arc<AppState>>,
    session: SessionKey,
) -> Result<impl IntoResponse, HttpAppError> {
    if let Some(session_key) = session.0 {
        state.uploads.clear(&session_key).await?;
    }

    Ok((
        [(SET_COOKIE, format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE))],
        Json(MessageResponse::new("Upload session cleared")),
    ))
}
