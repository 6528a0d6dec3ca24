//! Upload lifecycle orchestration.
//!
//! Each service owns the collaborators it talks to as trait objects, so the
//! HTTP layer and the tests wire them the same way.

pub mod asset_access;
pub mod completion;
pub mod counter_reconciler;
pub mod deletion;
pub mod ownership_sweep;
pub mod upload_session;

pub use asset_access::AssetAccessService;
pub use completion::CompletionService;
pub use counter_reconciler::{CounterReconciler, ReconcileReport};
pub use deletion::DeletionService;
pub use ownership_sweep::{OwnershipSweep, SweepReport};
pub use upload_session::UploadSessionService;

use std::future::Future;
use std::time::Duration;

/// Runs one collaborator call under `limit`. An elapsed deadline is reported
/// as a failure of that call.
pub(crate) async fn bounded<T, E, F>(
    limit: Duration,
    operation: &'static str,
    call: F,
) -> Result<T, anyhow::Error>
where
    F: Future<Output = Result<T, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(anyhow::Error::from),
        Err(_) => Err(anyhow::anyhow!(
            "{} timed out after {}ms",
            operation,
            limit.as_millis()
        )),
    }
}
