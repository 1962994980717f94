//! Posting aggregator client
//!
//! All platforms are reached through a single aggregator HTTP API. One
//! normalized payload becomes one `POST {base_url}/posts` call, authenticated
//! with a bearer key. Non-2xx responses are reported with their status and the
//! raw response body; nothing is retried here.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{FanpostError, Result, UpstreamError};
use crate::platforms::Platform;
use crate::service::normalize::NormalizedPayload;

/// Successful aggregator response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// The created post's id, wherever the aggregator put it
    pub fn post_id(&self) -> Option<String> {
        let candidates = [
            self.body.get("id"),
            self.body.get("_id"),
            self.body.get("post").and_then(|p| p.get("id")),
            self.body.get("post").and_then(|p| p.get("_id")),
        ];
        candidates.into_iter().flatten().find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

/// An account connected to the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(alias = "_id")]
    pub id: String,
    pub platform: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_connected")]
    pub connected: bool,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

fn default_connected() -> bool {
    true
}

impl Account {
    /// The platform, if the aggregator reports one this library supports
    pub fn platform(&self) -> Option<Platform> {
        self.platform.parse().ok()
    }
}

#[derive(Debug, Deserialize)]
struct AccountList {
    #[serde(default)]
    accounts: Vec<Account>,
}

/// The single outbound call a platform dispatch makes
#[async_trait]
pub trait PostingApi: Send + Sync {
    async fn create_post(&self, payload: &NormalizedPayload) -> std::result::Result<UpstreamResponse, UpstreamError>;

    async fn list_accounts(&self) -> std::result::Result<Vec<Account>, UpstreamError>;
}

/// reqwest-backed aggregator client
pub struct AggregatorClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl AggregatorClient {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fanpost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FanpostError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api.base_url, config.api_key()?, config.api_timeout())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read_error(resp: reqwest::Response) -> UpstreamError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        UpstreamError::new(Some(status), body)
    }
}

#[async_trait]
impl PostingApi for AggregatorClient {
    async fn create_post(&self, payload: &NormalizedPayload) -> std::result::Result<UpstreamResponse, UpstreamError> {
        let url = self.endpoint("posts");
        debug!(url = %url, "Sending post to aggregator");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(payload)
            .send()
            .await
            .map_err(|e| UpstreamError::transport(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Self::read_error(resp).await);
        }

        let text = resp
            .text()
            .await
            .map_err(|e| UpstreamError::new(Some(status.as_u16()), format!("failed to read response: {}", e)))?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        Ok(UpstreamResponse::new(status.as_u16(), body))
    }

    async fn list_accounts(&self) -> std::result::Result<Vec<Account>, UpstreamError> {
        let url = self.endpoint("accounts");
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| UpstreamError::transport(format!("request to {} failed: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(Self::read_error(resp).await);
        }

        let status = resp.status().as_u16();
        let list: AccountList = resp
            .json()
            .await
            .map_err(|e| UpstreamError::new(Some(status), format!("unexpected accounts response: {}", e)))?;
        Ok(list.accounts)
    }
}
