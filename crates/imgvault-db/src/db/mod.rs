//! Database repositories for the data access layer
//!
//! `asset` holds the image record repository and the [`AssetStore`] trait the
//! orchestration layer depends on; `transaction` wraps multi-row writes.

pub mod asset;
pub mod error;
pub mod transaction;

pub use asset::{AssetRepository, AssetStore};
pub use error::{StoreError, StoreResult};
pub use transaction::TransactionGuard;
