use thiserror::Error;

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// An image with this hosting id is already persisted
    #[error("Duplicate image id: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Transaction failed: {0}")]
    Transaction(#[source] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
