//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; any `AppError`
//! converts with `?` and renders with a consistent status, body and log line.

use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use imgvault_core::{AppError, ErrorMetadata, LogLevel, Violation};
use serde::{de::DeserializeOwned, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether this error is recoverable (can be retried)
    pub recoverable: bool,
    /// Suggested action for the client (e.g., "Retry after a short delay")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
    /// Which store failed, when the error is a store failure
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

/// Wrapper type for AppError to implement IntoResponse
/// (orphan rules: IntoResponse and AppError both live in other crates)
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(AppError::from(err))
    }
}

/// Convert JSON body deserialization failures into a 400 with our ErrorResponse format.
impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

/// JSON body extractor that deserializes, then runs `validator` rules, and
/// answers 400 in the ErrorResponse format when either step fails.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(inner) = Json::<T>::from_request(req, state)
            .await
            .map_err(HttpAppError::from)?;
        inner.validate().map_err(AppError::from)?;
        Ok(ValidatedJson(inner))
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    let violation = error.violation().map(|v| v.kind);
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type, ?violation, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type, ?violation, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(
                error = %error,
                error_type,
                ?violation,
                details = %error.detailed_message(),
                "Request failed"
            );
        }
    }
}

fn is_production_env() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| env.to_lowercase() == "production" || env.to_lowercase() == "prod")
        .unwrap_or(false)
}

impl HttpAppError {
    fn body(&self, is_production: bool) -> ErrorResponse {
        let app_error = &self.0;
        let hide_details = is_production || app_error.is_sensitive();

        // The violation type is always reported; its cause chain only outside production.
        let violations = app_error
            .violation()
            .map(|mut v| {
                if is_production {
                    v.subject = String::new();
                    v.description = String::new();
                }
                v
            })
            .into_iter()
            .collect();

        ErrorResponse {
            error: app_error.client_message(),
            details: (!hide_details).then(|| app_error.detailed_message()),
            error_type: (!hide_details).then(|| app_error.error_type().to_string()),
            code: app_error.error_code().to_string(),
            recoverable: app_error.is_recoverable(),
            suggested_action: app_error.suggested_action().map(String::from),
            violations,
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(&self.0);

        (status, Json(self.body(is_production_env()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failure_carries_violation() {
        let err = HttpAppError(AppError::bulk_insert(
            "Failed to insert 2 image records",
            anyhow::anyhow!("duplicate key value violates unique constraint"),
        ));
        let body = err.body(false);

        assert_eq!(body.code, "BULK_INSERT_FAILED");
        assert!(body.recoverable);
        // Store failures are sensitive, so the error chain stays out of `details`.
        assert!(body.details.is_none());
        assert_eq!(body.violations.len(), 1);
        assert_eq!(body.violations[0].kind, "MEDIA_DB");
        assert_eq!(
            body.violations[0].subject,
            "duplicate key value violates unique constraint"
        );
    }

    #[test]
    fn test_production_hides_violation_chain() {
        let err = HttpAppError(AppError::external_store(
            "Failed to issue upload URLs",
            anyhow::anyhow!("connection refused"),
        ));
        let body = err.body(true);

        assert_eq!(body.violations[0].kind, "CLOUDFLARE");
        assert!(body.violations[0].subject.is_empty());
        assert!(body.violations[0].description.is_empty());
    }

    #[test]
    fn test_not_found_has_no_violation() {
        let body = HttpAppError(AppError::AssetNotFound("img-1".to_string())).body(false);
        assert_eq!(body.error, "Image not found");
        assert_eq!(body.code, "IMAGE_NOT_FOUND");
        assert!(body.details.is_some());

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("violations").is_none());
    }
}
