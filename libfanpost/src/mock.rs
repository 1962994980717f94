//! Configurable stand-ins for every external collaborator
//!
//! These mocks let the dispatcher, media locator and workflow service be
//! exercised without network access, credentials or AI providers. Each one
//! records how it was called so tests can assert on the interaction.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::sleep;

use crate::client::{Account, PostingApi, UpstreamResponse};
use crate::error::{GenerationError, ResolutionError, UpstreamError};
use crate::generation::{ContentGenerator, ImageGenerator};
use crate::media::{ReachabilityProbe, TunnelProvider};
use crate::platforms::Platform;
use crate::service::normalize::NormalizedPayload;

/// Aggregator that succeeds unless told otherwise per platform
///
/// Successful calls answer `{"id": "<platform>_post_<n>"}` where `n` counts
/// every call made so far.
#[derive(Default)]
pub struct MockPostingApi {
    failures: HashMap<Platform, UpstreamError>,
    delays: HashMap<Platform, Duration>,
    accounts: Vec<Account>,
    calls: Mutex<Vec<NormalizedPayload>>,
}

impl MockPostingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `status` with `body` for posts to `platform`
    pub fn fail_for(mut self, platform: Platform, status: u16, body: &str) -> Self {
        self.failures
            .insert(platform, UpstreamError::new(Some(status), body));
        self
    }

    /// Fail posts to `platform` as if the connection broke
    pub fn transport_failure_for(mut self, platform: Platform, message: &str) -> Self {
        self.failures
            .insert(platform, UpstreamError::transport(message));
        self
    }

    /// Wait before answering posts to `platform`
    pub fn with_delay(mut self, platform: Platform, delay: Duration) -> Self {
        self.delays.insert(platform, delay);
        self
    }

    pub fn with_accounts(mut self, accounts: Vec<Account>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Every payload received, in arrival order
    pub fn calls(&self) -> Vec<NormalizedPayload> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_for(&self, platform: Platform) -> Vec<NormalizedPayload> {
        self.calls()
            .into_iter()
            .filter(|p| p.platform() == Some(platform))
            .collect()
    }
}

#[async_trait]
impl PostingApi for MockPostingApi {
    async fn create_post(&self, payload: &NormalizedPayload) -> Result<UpstreamResponse, UpstreamError> {
        let platform = payload
            .platform()
            .ok_or_else(|| UpstreamError::new(Some(400), "payload has no platform"))?;

        let n = match self.calls.lock() {
            Ok(mut calls) => {
                calls.push(payload.clone());
                calls.len()
            }
            Err(_) => return Err(UpstreamError::transport("mock call log poisoned")),
        };

        if let Some(delay) = self.delays.get(&platform) {
            sleep(*delay).await;
        }

        match self.failures.get(&platform) {
            Some(error) => Err(error.clone()),
            None => Ok(UpstreamResponse::new(
                201,
                json!({ "id": format!("{}_post_{}", platform, n), "status": "published" }),
            )),
        }
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, UpstreamError> {
        Ok(self.accounts.clone())
    }
}

/// Tunnel with a fixed answer
pub struct MockTunnel {
    answer: Result<String, ResolutionError>,
    calls: AtomicUsize,
}

impl MockTunnel {
    pub fn new(base_url: &str) -> Self {
        Self {
            answer: Ok(base_url.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            answer: Err(ResolutionError::TunnelUnavailable {
                reason: reason.to_string(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelProvider for MockTunnel {
    async fn public_base_url(&self) -> Result<String, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

/// Probe that reports every URL reachable, or every URL unreachable
pub struct MockProbe {
    failure: Option<String>,
    checked: Mutex<Vec<String>>,
}

impl MockProbe {
    pub fn reachable() -> Self {
        Self {
            failure: None,
            checked: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable(cause: &str) -> Self {
        Self {
            failure: Some(cause.to_string()),
            checked: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.checked().len()
    }

    /// URLs probed so far
    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ReachabilityProbe for MockProbe {
    async fn check(&self, url: &str) -> Result<(), String> {
        if let Ok(mut checked) = self.checked.lock() {
            checked.push(url.to_string());
        }
        match &self.failure {
            Some(cause) => Err(cause.clone()),
            None => Ok(()),
        }
    }
}

/// Content generator returning canned variants
pub struct MockContentGenerator {
    answer: Result<BTreeMap<Platform, Vec<String>>, GenerationError>,
    topics: Mutex<Vec<String>>,
}

impl MockContentGenerator {
    pub fn new(variants: BTreeMap<Platform, Vec<String>>) -> Self {
        Self {
            answer: Ok(variants),
            topics: Mutex::new(Vec::new()),
        }
    }

    /// Two numbered variants per requested platform
    pub fn numbered() -> Self {
        let variants = Platform::ALL
            .into_iter()
            .map(|p| {
                (
                    p,
                    vec![
                        format!("{} variant 1", p.display_name()),
                        format!("{} variant 2", p.display_name()),
                    ],
                )
            })
            .collect();
        Self::new(variants)
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(GenerationError::Provider(message.to_string())),
            topics: Mutex::new(Vec::new()),
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ContentGenerator for MockContentGenerator {
    async fn generate(
        &self,
        topic: &str,
        platforms: &[Platform],
    ) -> Result<BTreeMap<Platform, Vec<String>>, GenerationError> {
        if let Ok(mut topics) = self.topics.lock() {
            topics.push(topic.to_string());
        }
        let variants = self.answer.clone()?;
        Ok(variants
            .into_iter()
            .filter(|(p, _)| platforms.contains(p))
            .collect())
    }
}

/// Image generator returning a fixed path, or nothing
pub struct MockImageGenerator {
    path: Option<PathBuf>,
}

impl MockImageGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn none() -> Self {
        Self { path: None }
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate_image(&self, _topic: &str) -> Result<Option<PathBuf>, GenerationError> {
        Ok(self.path.clone())
    }
}
