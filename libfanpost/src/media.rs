//! Media location
//!
//! Platforms fetch media by URL, so a file on the local disk must be exposed
//! under a public address before it can be attached to a post. A
//! [`TunnelProvider`] supplies the public base URL, the file is expected under
//! `<base>/<upload_path>/<file name>`, and a [`ReachabilityProbe`] confirms the
//! URL actually answers before it is handed to the aggregator.
//!
//! Remote URLs are passed through untouched.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{MediaConfig, TunnelKind};
use crate::error::{ConfigError, FanpostError, ResolutionError, Result};
use crate::types::{MediaReference, MediaSource};

/// Source of the public base URL under which local media is served
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    async fn public_base_url(&self) -> std::result::Result<String, ResolutionError>;
}

/// Checks that a URL is fetchable from the outside
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// `Err` carries a short description of why the URL is not reachable
    async fn check(&self, url: &str) -> std::result::Result<(), String>;
}

/// Tunnel backed by a local ngrok agent
pub struct NgrokTunnel {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<TunnelInfo>,
}

#[derive(Debug, Deserialize)]
struct TunnelInfo {
    public_url: String,
    #[serde(default)]
    proto: String,
}

impl NgrokTunnel {
    pub fn new(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    fn pick(tunnels: &[TunnelInfo]) -> Option<&str> {
        tunnels
            .iter()
            .find(|t| t.proto == "https" || t.public_url.starts_with("https://"))
            .or_else(|| tunnels.first())
            .map(|t| t.public_url.as_str())
    }
}

#[async_trait]
impl TunnelProvider for NgrokTunnel {
    async fn public_base_url(&self) -> std::result::Result<String, ResolutionError> {
        let url = format!("{}/api/tunnels", self.api_url.trim_end_matches('/'));
        let unavailable = |reason: String| ResolutionError::TunnelUnavailable { reason };

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(format!("ngrok agent not reachable at {}: {}", url, e)))?;

        if !resp.status().is_success() {
            return Err(unavailable(format!(
                "ngrok agent returned {} for {}",
                resp.status(),
                url
            )));
        }

        let list: TunnelList = resp
            .json()
            .await
            .map_err(|e| unavailable(format!("unexpected ngrok agent response: {}", e)))?;

        Self::pick(&list.tunnels)
            .map(str::to_string)
            .ok_or_else(|| unavailable("ngrok agent has no active tunnels".to_string()))
    }
}

/// A fixed, already public base URL
#[derive(Debug, Clone)]
pub struct StaticBaseUrl(String);

impl StaticBaseUrl {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self(base_url.into())
    }
}

#[async_trait]
impl TunnelProvider for StaticBaseUrl {
    async fn public_base_url(&self) -> std::result::Result<String, ResolutionError> {
        Ok(self.0.clone())
    }
}

/// HEAD request probe, falling back to GET for servers that refuse HEAD
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn check(&self, url: &str) -> std::result::Result<(), String> {
        let mut status = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .status();

        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            status = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| e.to_string())?
                .status();
        }

        if status.is_success() {
            Ok(())
        } else {
            Err(format!("HTTP {}", status))
        }
    }
}

/// Resolves media references to public URLs
#[derive(Clone)]
pub struct MediaLocator {
    tunnel: Arc<dyn TunnelProvider>,
    probe: Arc<dyn ReachabilityProbe>,
    upload_path: String,
}

impl MediaLocator {
    pub fn new(
        tunnel: Arc<dyn TunnelProvider>,
        probe: Arc<dyn ReachabilityProbe>,
        upload_path: impl Into<String>,
    ) -> Self {
        Self {
            tunnel,
            probe,
            upload_path: upload_path.into(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.probe_timeout_secs))
            .build()
            .map_err(|e| FanpostError::Http(format!("Failed to build HTTP client: {}", e)))?;

        let tunnel: Arc<dyn TunnelProvider> = match config.tunnel {
            TunnelKind::Ngrok => Arc::new(NgrokTunnel::new(client.clone(), &config.ngrok_api_url)),
            TunnelKind::Static => {
                let base = config
                    .public_base_url
                    .clone()
                    .ok_or_else(|| ConfigError::MissingField("media.public_base_url".to_string()))?;
                Arc::new(StaticBaseUrl::new(base))
            }
        };

        Ok(Self::new(tunnel, Arc::new(HttpProbe::new(client)), &config.upload_path))
    }

    /// Resolve one reference to a publicly reachable URL
    ///
    /// A local reference is resolved at most once per successful attempt: the
    /// URL is cached on the reference and reused by later calls. Failed
    /// attempts leave the cache empty.
    pub async fn resolve(&self, media: &MediaReference) -> std::result::Result<String, ResolutionError> {
        match &media.source {
            MediaSource::Remote(url) => Ok(url.clone()),
            MediaSource::Local(path) => media
                .resolution_cache()
                .get_or_try_init(|| self.resolve_local(path))
                .await
                .cloned(),
        }
    }

    /// Resolve every reference in order, stopping at the first failure
    pub async fn resolve_all(&self, media: &[MediaReference]) -> std::result::Result<Vec<String>, ResolutionError> {
        let mut urls = Vec::with_capacity(media.len());
        for item in media {
            urls.push(self.resolve(item).await?);
        }
        Ok(urls)
    }

    async fn resolve_local(&self, path: &Path) -> std::result::Result<String, ResolutionError> {
        let not_found = || ResolutionError::MediaNotFound {
            path: path.to_path_buf(),
        };

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(not_found()),
        }
        let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(not_found)?;

        let base = self.tunnel.public_base_url().await?;
        let url = public_url_for(&base, &self.upload_path, file_name)?;

        if let Err(cause) = self.probe.check(&url).await {
            warn!(url = %url, cause = %cause, "Media URL is not reachable");
            return Err(ResolutionError::MediaUnreachable { url, cause });
        }

        debug!(path = %path.display(), url = %url, "Resolved local media");
        Ok(url)
    }
}

/// `<base>/<upload_path>/<file_name>`, with each segment percent-encoded
fn public_url_for(
    base: &str,
    upload_path: &str,
    file_name: &str,
) -> std::result::Result<String, ResolutionError> {
    let mut url = Url::parse(base).map_err(|e| ResolutionError::TunnelUnavailable {
        reason: format!("invalid public base URL '{}': {}", base, e),
    })?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ResolutionError::TunnelUnavailable {
                reason: format!("public base URL '{}' cannot carry a path", base),
            })?;
        segments.pop_if_empty();
        for segment in upload_path.split('/').filter(|s| !s.is_empty()) {
            segments.push(segment);
        }
        segments.push(file_name);
    }
    Ok(url.to_string())
}
