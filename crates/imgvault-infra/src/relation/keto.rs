use async_trait::async_trait;
use imgvault_core::models::{AuthorizationGrant, NS_USER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{RelationError, RelationResult, RelationService};

#[derive(Debug, Serialize)]
struct SubjectSet<'a> {
    namespace: &'a str,
    object: &'a str,
    relation: &'a str,
}

#[derive(Debug, Serialize)]
struct RelationTupleBody<'a> {
    namespace: &'a str,
    object: &'a str,
    relation: &'a str,
    subject_set: SubjectSet<'a>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
}

/// Ory Keto client. Subjects are written as the subject set `User:{id}`.
#[derive(Clone)]
pub struct KetoRelationClient {
    http: reqwest::Client,
    read_url: String,
    write_url: String,
}

impl KetoRelationClient {
    pub fn new(
        http: reqwest::Client,
        read_url: impl Into<String>,
        write_url: impl Into<String>,
    ) -> Self {
        Self {
            http,
            read_url: read_url.into().trim_end_matches('/').to_string(),
            write_url: write_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn api_error(response: reqwest::Response) -> RelationError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        RelationError::Api { status, message }
    }
}

#[async_trait]
impl RelationService for KetoRelationClient {
    #[tracing::instrument(skip(self), fields(object = %grant.object_id, relation = grant.role.as_str()))]
    async fn add_grant(&self, grant: &AuthorizationGrant) -> RelationResult<()> {
        let body = RelationTupleBody {
            namespace: &grant.namespace,
            object: &grant.object_id,
            relation: grant.role.as_str(),
            subject_set: SubjectSet {
                namespace: NS_USER,
                object: &grant.subject_id,
                relation: "",
            },
        };

        let response = self
            .http
            .put(format!("{}/admin/relation-tuples", self.write_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_object(&self, namespace: &str, object_id: &str) -> RelationResult<()> {
        let response = self
            .http
            .delete(format!("{}/admin/relation-tuples", self.write_url))
            .query(&[("namespace", namespace), ("object", object_id)])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(Self::api_error(response).await)
    }

    #[tracing::instrument(skip(self))]
    async fn check(
        &self,
        namespace: &str,
        object_id: &str,
        relation: &str,
        subject_id: &str,
    ) -> RelationResult<bool> {
        let response = self
            .http
            .get(format!("{}/relation-tuples/check/openapi", self.read_url))
            .query(&[
                ("namespace", namespace),
                ("object", object_id),
                ("relation", relation),
                ("subject_set.namespace", NS_USER),
                ("subject_set.object", subject_id),
                ("subject_set.relation", ""),
            ])
            .send()
            .await?;

        // Older servers answer a denied check with 403.
        if response.status() == StatusCode::FORBIDDEN {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let body: CheckResponse = response.json().await?;
        Ok(body.allowed)
    }
}
