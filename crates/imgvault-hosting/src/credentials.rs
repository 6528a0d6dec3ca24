//! Bearer credentials for the hosting API.
//!
//! The batch API accepts short-lived tokens minted from the account token.
//! [`CachedCredential`] keeps the last issued token and only asks the issuer
//! for a new one once it is about to expire. Refreshes are serialized behind a
//! single async mutex so concurrent callers never mint two tokens at once.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::cloudflare::{into_result, Envelope};
use crate::traits::{HostingError, HostingResult};

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> HostingResult<String>;
}

/// The account API token, used as is.
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn bearer_token(&self) -> HostingResult<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints fresh short-lived tokens.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self) -> HostingResult<IssuedToken>;
}

pub struct CachedCredential<I> {
    issuer: I,
    refresh_margin: Duration,
    cached: Mutex<Option<IssuedToken>>,
}

impl<I: TokenIssuer> CachedCredential<I> {
    pub fn new(issuer: I) -> Self {
        Self::with_refresh_margin(issuer, Duration::seconds(30))
    }

    /// Tokens are refreshed once they are within `refresh_margin` of expiry.
    pub fn with_refresh_margin(issuer: I, refresh_margin: Duration) -> Self {
        Self {
            issuer,
            refresh_margin,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl<I: TokenIssuer> CredentialProvider for CachedCredential<I> {
    async fn bearer_token(&self) -> HostingResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Utc::now() + self.refresh_margin < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.issuer.issue().await?;
        tracing::debug!(expires_at = %fresh.expires_at, "Issued new hosting batch token");
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
struct BatchTokenResult {
    token: String,
    #[serde(rename = "expiresAt")]
    expires_at: DateTime<Utc>,
}

/// Issues batch tokens from `GET accounts/{account}/images/v1/batch_token`.
pub struct CloudflareBatchTokenIssuer {
    http: reqwest::Client,
    api_base: String,
    account_id: String,
    api_token: String,
}

impl CloudflareBatchTokenIssuer {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        account_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            account_id: account_id.into(),
            api_token: api_token.into(),
        }
    }
}

#[async_trait]
impl TokenIssuer for CloudflareBatchTokenIssuer {
    async fn issue(&self) -> HostingResult<IssuedToken> {
        let url = format!(
            "{}/accounts/{}/images/v1/batch_token",
            self.api_base, self.account_id
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let envelope: Envelope<BatchTokenResult> = Envelope::read(response).await?;
        let result = into_result(envelope)
            .map_err(|e| HostingError::Credential(format!("batch token request failed: {}", e)))?;

        Ok(IssuedToken {
            value: result.token,
            expires_at: result.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingIssuer {
        calls: Arc<AtomicUsize>,
        lifetime: Duration,
    }

    #[async_trait]
    impl TokenIssuer for CountingIssuer {
        async fn issue(&self) -> HostingResult<IssuedToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(IssuedToken {
                value: format!("token-{}", n),
                expires_at: Utc::now() + self.lifetime,
            })
        }
    }

    #[tokio::test]
    async fn test_cached_token_is_reused_until_expiry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let credential = CachedCredential::new(CountingIssuer {
            calls: calls.clone(),
            lifetime: Duration::hours(1),
        });

        assert_eq!(credential.bearer_token().await.unwrap(), "token-1");
        assert_eq!(credential.bearer_token().await.unwrap(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Every token expires inside the refresh margin.
        let credential = CachedCredential::new(CountingIssuer {
            calls: calls.clone(),
            lifetime: Duration::seconds(5),
        });

        assert_eq!(credential.bearer_token().await.unwrap(), "token-1");
        assert_eq!(credential.bearer_token().await.unwrap(), "token-2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        let credential = Arc::new(CachedCredential::new(CountingIssuer {
            calls: calls.clone(),
            lifetime: Duration::hours(1),
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let credential = credential.clone();
                tokio::spawn(async move { credential.bearer_token().await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "token-1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_batch_token_issuer_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/accounts/acct/images/v1/batch_token")
            .match_header("authorization", "Bearer api-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"success":true,"errors":[],"messages":[],
                    "result":{"token":"batch-abc","expiresAt":"2030-01-01T00:00:00Z"}}"#,
            )
            .create_async()
            .await;

        let issuer =
            CloudflareBatchTokenIssuer::new(reqwest::Client::new(), server.url(), "acct", "api-token");
        let token = issuer.issue().await.unwrap();

        assert_eq!(token.value, "batch-abc");
        assert_eq!(token.expires_at.to_rfc3339(), "2030-01-01T00:00:00+00:00");
        mock.assert_async().await;
    }
}
