use std::sync::Arc;

use imgvault_core::Config;

use crate::{
    CachedCredential, CloudflareBatchTokenIssuer, CloudflareImages, HostingError, HostingResult,
    HostingService, StaticCredential,
};

/// Create the hosting service described by the configuration
pub fn create_hosting_service(config: &Config) -> HostingResult<Arc<dyn HostingService>> {
    let hosting = config.hosting();

    let http = reqwest::Client::builder()
        .timeout(config.timeouts().hosting_call.max(config.timeouts().upload_batch))
        .build()
        .map_err(|e| HostingError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

    if hosting.use_batch_token {
        let issuer = CloudflareBatchTokenIssuer::new(
            http.clone(),
            &hosting.api_base,
            &hosting.account_id,
            &hosting.api_token,
        );
        tracing::info!(batch_api = %hosting.batch_api_base, "Using Cloudflare batch API");
        return Ok(Arc::new(CloudflareImages::batch(
            http,
            &hosting.batch_api_base,
            hosting.upload_expiry,
            Arc::new(CachedCredential::new(issuer)),
        )));
    }

    Ok(Arc::new(CloudflareImages::new(
        http,
        &hosting.api_base,
        &hosting.account_id,
        hosting.upload_expiry,
        Arc::new(StaticCredential::new(&hosting.api_token)),
    )))
}
