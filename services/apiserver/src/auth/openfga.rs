//! OpenFGA relationship-check client.
//!
//! # Purpose
//! Issues `POST /stores/{store_id}/check` requests and reports whether a
//! subject holds a relation on an object.
//!
//! # Error contract
//! - Transport failures (connect, timeout) map to [`CheckError::Unavailable`]:
//!   the engine could not be reached at all.
//! - Non-success HTTP statuses and undecodable bodies map to
//!   [`CheckError::Engine`]: the engine answered but could not decide.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CheckError {
    #[error("authorization engine unavailable: {0}")]
    Unavailable(String),
    #[error("authorization engine error: {0}")]
    Engine(String),
}

#[async_trait]
pub trait RelationshipChecker: Send + Sync {
    async fn check(&self, user: &str, relation: &str, object: &str) -> Result<bool, CheckError>;
}

#[derive(Debug, Serialize)]
struct TupleKey<'a> {
    user: &'a str,
    relation: &'a str,
    object: &'a str,
}

#[derive(Debug, Serialize)]
struct CheckRequest<'a> {
    tuple_key: TupleKey<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_model_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    #[serde(default)]
    allowed: bool,
}

#[derive(Debug, Clone)]
pub struct OpenFgaClient {
    client: reqwest::Client,
    api_url: String,
    store_id: String,
    authorization_model_id: Option<String>,
}

impl OpenFgaClient {
    pub fn new(
        api_url: &str,
        store_id: &str,
        authorization_model_id: Option<String>,
    ) -> Result<Self, CheckError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| CheckError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            store_id: store_id.to_string(),
            authorization_model_id,
        })
    }

    fn check_url(&self) -> String {
        format!("{}/stores/{}/check", self.api_url, self.store_id)
    }
}

#[async_trait]
impl RelationshipChecker for OpenFgaClient {
    async fn check(&self, user: &str, relation: &str, object: &str) -> Result<bool, CheckError> {
        let body = CheckRequest {
            tuple_key: TupleKey {
                user,
                relation,
                object,
            },
            authorization_model_id: self.authorization_model_id.as_deref(),
        };
        let response = self
            .client
            .post(self.check_url())
            .json(&body)
            .send()
            .await
            .map_err(|err| CheckError::Unavailable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CheckError::Engine(format!("check returned {status}: {text}")));
        }
        let decoded: CheckResponse = response
            .json()
            .await
            .map_err(|err| CheckError::Engine(format!("decode check response: {err}")))?;
        Ok(decoded.allowed)
    }
}
