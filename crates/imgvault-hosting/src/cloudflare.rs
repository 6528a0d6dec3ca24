//! Cloudflare Images implementation of [`HostingService`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use imgvault_core::models::{HostedAsset, SignedUpload};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::credentials::CredentialProvider;
use crate::traits::{HostingError, HostingResult, HostingService};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

/// Response envelope shared by every Cloudflare API call
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(skip)]
    status: u16,
}

impl<T: DeserializeOwned> Envelope<T> {
    pub(crate) async fn read(response: reqwest::Response) -> HostingResult<Self> {
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<Envelope<T>>(&body) {
            Ok(mut envelope) => {
                envelope.status = status.as_u16();
                Ok(envelope)
            }
            Err(_) if !status.is_success() => Err(HostingError::Api {
                status: status.as_u16(),
                message: body,
            }),
            Err(e) => Err(HostingError::InvalidResponse(e.to_string())),
        }
    }
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| match e.code {
            Some(code) => format!("{} ({})", e.message, code),
            None => e.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub(crate) fn into_result<T>(envelope: Envelope<T>) -> HostingResult<T> {
    if envelope.status == 404 {
        return Err(HostingError::NotFound(describe(&envelope.errors)));
    }
    if !envelope.success || !(200..300).contains(&envelope.status) {
        return Err(HostingError::Api {
            status: envelope.status,
            message: describe(&envelope.errors),
        });
    }
    envelope
        .result
        .ok_or_else(|| HostingError::InvalidResponse("response has no result".to_string()))
}

#[derive(Debug, Deserialize)]
struct DirectUploadResult {
    id: String,
    #[serde(rename = "uploadURL")]
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct ImageResult {
    id: String,
    #[serde(default)]
    filename: String,
    uploaded: DateTime<Utc>,
    #[serde(default)]
    meta: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    variants: Vec<String>,
}

impl From<ImageResult> for HostedAsset {
    fn from(image: ImageResult) -> Self {
        let meta = image
            .meta
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();

        HostedAsset {
            id: image.id,
            filename: image.filename,
            uploaded: image.uploaded,
            meta,
            variants: image.variants,
        }
    }
}

/// Where image endpoints live: under the account on the main API, or on the
/// batch API host (which identifies the account from the batch token).
#[derive(Debug, Clone)]
enum ImagesEndpoint {
    Account { api_base: String, account_id: String },
    Batch { batch_base: String },
}

impl ImagesEndpoint {
    /// Appends `segments` under the images root. Each segment is percent-encoded
    /// on its own, so a `/` or `..` inside one cannot leave the images root.
    fn url(&self, segments: &[&str]) -> HostingResult<Url> {
        let (base, root): (&str, Vec<&str>) = match self {
            ImagesEndpoint::Account {
                api_base,
                account_id,
            } => (
                api_base.as_str(),
                vec!["accounts", account_id.as_str(), "images"],
            ),
            ImagesEndpoint::Batch { batch_base } => (batch_base.as_str(), vec!["images"]),
        };

        let mut url = Url::parse(base).map_err(|e| {
            HostingError::ConfigError(format!("Invalid hosting API base {}: {}", base, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                HostingError::ConfigError(format!("Hosting API base {} cannot carry a path", base))
            })?
            .pop_if_empty()
            .extend(root)
            .extend(segments);
        Ok(url)
    }
}

pub struct CloudflareImages {
    http: reqwest::Client,
    endpoint: ImagesEndpoint,
    upload_expiry: Duration,
    credentials: Arc<dyn CredentialProvider>,
}

impl CloudflareImages {
    /// Talk to the account endpoints of the main API.
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        account_id: impl Into<String>,
        upload_expiry: Duration,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http,
            endpoint: ImagesEndpoint::Account {
                api_base: api_base.into().trim_end_matches('/').to_string(),
                account_id: account_id.into(),
            },
            upload_expiry,
            credentials,
        }
    }

    /// Talk to the batch API host. `credentials` should yield batch tokens.
    pub fn batch(
        http: reqwest::Client,
        batch_base: impl Into<String>,
        upload_expiry: Duration,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http,
            endpoint: ImagesEndpoint::Batch {
                batch_base: batch_base.into().trim_end_matches('/').to_string(),
            },
            upload_expiry,
            credentials,
        }
    }

    async fn token(&self) -> HostingResult<String> {
        self.credentials.bearer_token().await
    }

    fn image_url(&self, id: &str) -> HostingResult<Url> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(HostingError::InvalidId(id.to_string()));
        }
        self.endpoint.url(&["v1", id])
    }
}

#[async_trait]
impl HostingService for CloudflareImages {
    #[tracing::instrument(skip(self, metadata))]
    async fn issue_upload_url(
        &self,
        metadata: &BTreeMap<String, String>,
    ) -> HostingResult<SignedUpload> {
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|e| HostingError::InvalidResponse(e.to_string()))?;
        let expiry = chrono::Duration::from_std(self.upload_expiry)
            .map_err(|e| HostingError::ConfigError(e.to_string()))?;
        let expiry = (Utc::now() + expiry).to_rfc3339_opts(SecondsFormat::Secs, true);

        let form = reqwest::multipart::Form::new()
            .text("requireSignedURLs", "false")
            .text("expiry", expiry)
            .text("metadata", metadata_json);

        let response = self
            .http
            .post(self.endpoint.url(&["v2", "direct_upload"])?)
            .bearer_auth(self.token().await?)
            .multipart(form)
            .send()
            .await?;

        let result: DirectUploadResult = into_result(Envelope::read(response).await?)?;
        tracing::debug!(image_id = %result.id, "Issued direct upload URL");

        Ok(SignedUpload {
            image_id: result.id,
            upload_url: result.upload_url,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_asset(&self, id: &str) -> HostingResult<HostedAsset> {
        let response = self
            .http
            .get(self.image_url(id)?)
            .bearer_auth(self.token().await?)
            .send()
            .await?;

        let image: ImageResult = match into_result(Envelope::read(response).await?) {
            Err(HostingError::NotFound(_)) => return Err(HostingError::NotFound(id.to_string())),
            other => other?,
        };
        Ok(image.into())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_asset(&self, id: &str) -> HostingResult<()> {
        let response = self
            .http
            .delete(self.image_url(id)?)
            .bearer_auth(self.token().await?)
            .send()
            .await?;

        match into_result::<serde_json::Value>(Envelope::read(response).await?) {
            Ok(_) => Ok(()),
            Err(HostingError::NotFound(_)) => {
                tracing::debug!(image_id = %id, "Image already absent from hosting service");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
