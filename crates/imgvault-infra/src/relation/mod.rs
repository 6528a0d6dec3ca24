//! Authorization grants held by an external relation service.

mod keto;

use async_trait::async_trait;
use futures::future::try_join_all;
use imgvault_core::models::AuthorizationGrant;
use thiserror::Error;

pub use self::keto::KetoRelationClient;

#[derive(Debug, Error)]
pub enum RelationError {
    #[error("Relation service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Relation service returned {status}: {message}")]
    Api { status: u16, message: String },
}

pub type RelationResult<T> = Result<T, RelationError>;

#[async_trait]
pub trait RelationService: Send + Sync {
    /// Writing a grant that already exists succeeds.
    async fn add_grant(&self, grant: &AuthorizationGrant) -> RelationResult<()>;

    /// Writes grants concurrently and fails on the first error.
    async fn add_grants(&self, grants: &[AuthorizationGrant]) -> RelationResult<()> {
        try_join_all(grants.iter().map(|grant| self.add_grant(grant))).await?;
        Ok(())
    }

    /// Removes every grant on an object. Objects without grants succeed.
    async fn delete_object(&self, namespace: &str, object_id: &str) -> RelationResult<()>;

    async fn check(
        &self,
        namespace: &str,
        object_id: &str,
        relation: &str,
        subject_id: &str,
    ) -> RelationResult<bool>;
}
