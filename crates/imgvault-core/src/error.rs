//! Error types module
//!
//! Every failure the upload lifecycle can surface is a variant of [`AppError`].
//! Variants that wrap a collaborator failure carry the cause as an
//! `anyhow::Error` source so the full chain survives up to the HTTP layer,
//! where it is rendered as a [`Violation`] descriptor.

use serde::Serialize;
use utoipa::ToSchema;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for retriable collaborator failures
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "BULK_INSERT_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Machine-readable description of which store failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Violation {
    /// Failing collaborator: SESSION, CLOUDFLARE, MEDIA_DB or RELATION
    #[serde(rename = "type")]
    pub kind: String,
    /// Root cause of the failure
    pub subject: String,
    /// Full error chain
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Upload session not found")]
    SessionNotFound,

    #[error("Hosting service failure: {message}")]
    ExternalStoreFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write upload session: {message}")]
    SessionWriteFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Session store failure: {message}")]
    SessionStoreFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Access counter store failure: {message}")]
    CounterStoreFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Bulk insert failed: {message}")]
    BulkInsertFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to delete image records: {message}")]
    StoreDeleteFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Image record query failed: {message}")]
    StoreQueryFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to create ownership grant: {message}")]
    GrantFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to delete grants: {message}")]
    GrantDeleteFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Access check failed: {message}")]
    GrantCheckFailed {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Image not found: {0}")]
    AssetNotFound(String),

    #[error("Variant '{variant}' not found for image {asset_id}")]
    VariantNotFound { asset_id: String, variant: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

// Stage constructors. The message names what was being attempted; the source
// is whatever the adapter returned.
impl AppError {
    pub fn external_store(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::ExternalStoreFailed {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn session_write(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::SessionWriteFailed {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn session_store(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::SessionStoreFailed {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn counter_store(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::CounterStoreFailed {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn bulk_insert(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::BulkInsertFailed {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn store_delete(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::StoreDeleteFailed {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn store_query(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::StoreQueryFailed {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn grant(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::GrantFailed {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn grant_delete(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::GrantDeleteFailed {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn grant_check(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::GrantCheckFailed {
            message: message.into(),
            source: source.into(),
        }
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::SessionNotFound => (
            404,
            "SESSION_NOT_FOUND",
            false,
            Some("Request upload URLs before completing the upload"),
            false,
            LogLevel::Debug,
        ),
        AppError::ExternalStoreFailed { .. } => (
            502,
            "HOSTING_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::SessionWriteFailed { .. } => (
            503,
            "SESSION_WRITE_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::SessionStoreFailed { .. } => (
            503,
            "SESSION_STORE_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::CounterStoreFailed { .. } => (
            503,
            "COUNTER_STORE_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::BulkInsertFailed { .. } => (
            503,
            "BULK_INSERT_FAILED",
            true,
            Some("Retry completing the upload"),
            true,
            LogLevel::Error,
        ),
        AppError::StoreDeleteFailed { .. } => (
            503,
            "STORE_DELETE_FAILED",
            true,
            Some("Retry the delete; completed steps are idempotent"),
            true,
            LogLevel::Error,
        ),
        AppError::StoreQueryFailed { .. } => (
            503,
            "STORE_QUERY_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::GrantFailed { .. } => (
            503,
            "GRANT_FAILED",
            true,
            Some("Retry completing the upload"),
            true,
            LogLevel::Error,
        ),
        AppError::GrantDeleteFailed { .. } => (
            503,
            "GRANT_DELETE_FAILED",
            true,
            Some("Retry the delete; completed steps are idempotent"),
            true,
            LogLevel::Error,
        ),
        AppError::GrantCheckFailed { .. } => (
            503,
            "GRANT_CHECK_FAILED",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Warn,
        ),
        AppError::AssetNotFound(_) => (
            404,
            "IMAGE_NOT_FOUND",
            false,
            Some("Verify the image ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::VariantNotFound { .. } => (
            404,
            "VARIANT_NOT_FOUND",
            false,
            Some("Use one of the variants returned on completion"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Authenticate before completing an upload"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::SessionNotFound => "SessionNotFound",
            AppError::ExternalStoreFailed { .. } => "ExternalStoreFailed",
            AppError::SessionWriteFailed { .. } => "SessionWriteFailed",
            AppError::SessionStoreFailed { .. } => "SessionStoreFailed",
            AppError::CounterStoreFailed { .. } => "CounterStoreFailed",
            AppError::BulkInsertFailed { .. } => "BulkInsertFailed",
            AppError::StoreDeleteFailed { .. } => "StoreDeleteFailed",
            AppError::StoreQueryFailed { .. } => "StoreQueryFailed",
            AppError::GrantFailed { .. } => "GrantFailed",
            AppError::GrantDeleteFailed { .. } => "GrantDeleteFailed",
            AppError::GrantCheckFailed { .. } => "GrantCheckFailed",
            AppError::AssetNotFound(_) => "AssetNotFound",
            AppError::VariantNotFound { .. } => "VariantNotFound",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Which collaborator a stage failure belongs to, if any.
    pub fn violation_type(&self) -> Option<&'static str> {
        match self {
            AppError::ExternalStoreFailed { .. } => Some("CLOUDFLARE"),
            AppError::SessionWriteFailed { .. }
            | AppError::SessionStoreFailed { .. }
            | AppError::CounterStoreFailed { .. } => Some("SESSION"),
            AppError::BulkInsertFailed { .. }
            | AppError::StoreDeleteFailed { .. }
            | AppError::StoreQueryFailed { .. } => Some("MEDIA_DB"),
            AppError::GrantFailed { .. }
            | AppError::GrantDeleteFailed { .. }
            | AppError::GrantCheckFailed { .. } => Some("RELATION"),
            _ => None,
        }
    }

    /// Deepest error in the source chain, rendered as text.
    pub fn root_cause(&self) -> String {
        use std::error::Error;

        let mut current: &dyn Error = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current.to_string()
    }

    /// Descriptor naming the failing collaborator, the root cause and the full chain.
    pub fn violation(&self) -> Option<Violation> {
        self.violation_type().map(|kind| Violation {
            kind: kind.to_string(),
            subject: self.root_cause(),
            description: self.detailed_message(),
        })
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::SessionNotFound => "Upload session not found".to_string(),
            AppError::ExternalStoreFailed { .. } => "Image hosting service unavailable".to_string(),
            AppError::SessionWriteFailed { .. } => "Failed to save upload session".to_string(),
            AppError::SessionStoreFailed { .. } => "Failed to access upload session".to_string(),
            AppError::CounterStoreFailed { .. } => "Failed to access counters".to_string(),
            AppError::BulkInsertFailed { .. } => "Failed to save images".to_string(),
            AppError::StoreDeleteFailed { .. } => "Failed to delete images".to_string(),
            AppError::StoreQueryFailed { .. } => "Failed to access images".to_string(),
            AppError::GrantFailed { .. } => "Failed to assign image ownership".to_string(),
            AppError::GrantDeleteFailed { .. } => "Failed to remove image permissions".to_string(),
            AppError::GrantCheckFailed { .. } => "Failed to check image permissions".to_string(),
            AppError::AssetNotFound(_) => "Image not found".to_string(),
            AppError::VariantNotFound { .. } => "Variant not found".to_string(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    #[test]
    fn test_error_metadata_session_not_found() {
        let err = AppError::SessionNotFound;
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "SESSION_NOT_FOUND");
        assert!(!err.is_recoverable());
        assert!(!err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert!(err.violation().is_none());
    }

    #[test]
    fn test_error_metadata_stage_failures_are_retriable() {
        let errors = [
            AppError::session_write("write", Refused),
            AppError::bulk_insert("insert", Refused),
            AppError::store_delete("delete", Refused),
            AppError::grant("grant", Refused),
            AppError::grant_delete("grant delete", Refused),
        ];
        for err in errors {
            assert_eq!(err.http_status_code(), 503, "{}", err.error_type());
            assert!(err.is_recoverable());
            assert!(err.is_sensitive());
        }
        assert_eq!(
            AppError::external_store("upload", Refused).http_status_code(),
            502
        );
    }

    #[test]
    fn test_variant_not_found_message() {
        let err = AppError::VariantNotFound {
            asset_id: "abc".to_string(),
            variant: "thumb".to_string(),
        };
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.client_message(), "Variant not found");
        assert!(err.to_string().contains("thumb"));
    }

    #[test]
    fn test_violation_carries_root_cause_and_chain() {
        let source = anyhow::Error::new(Refused).context("cloudflare direct upload");
        let err = AppError::external_store("issue upload url", source);

        let violation = err.violation().expect("stage failures carry a violation");
        assert_eq!(violation.kind, "CLOUDFLARE");
        assert_eq!(violation.subject, "connection refused");
        assert!(violation.description.contains("issue upload url"));
        assert!(violation.description.contains("Caused by: cloudflare direct upload"));
    }

    #[test]
    fn test_violation_types() {
        assert_eq!(
            AppError::session_store("get", Refused).violation_type(),
            Some("SESSION")
        );
        assert_eq!(
            AppError::store_query("find", Refused).violation_type(),
            Some("MEDIA_DB")
        );
        assert_eq!(
            AppError::grant_check("check", Refused).violation_type(),
            Some("RELATION")
        );
        assert_eq!(AppError::InvalidInput("x".into()).violation_type(), None);
    }
}
