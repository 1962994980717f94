//! Multi-platform dispatch
//!
//! Each target platform runs through its own small state machine:
//!
//! 1. validating: rule violations end the dispatch, no network call is made
//! 2. resolving: every media reference must become a reachable public URL
//! 3. normalizing: the aggregator body is built for the platform
//! 4. calling: exactly one `create_post` call
//!
//! Platforms are dispatched concurrently and independently; one platform's
//! failure never affects another. Failed calls are not retried.
//!
//! When a deadline is set, platforms still in flight when it passes are
//! reported as [`DispatchFailure::Timeout`] while completed results are kept.
//! A timed-out call may still have reached the aggregator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::events::{DispatchStage, Event, EventBus};
use super::normalize::normalize;
use super::validation::validate_for;
use crate::client::PostingApi;
use crate::error::DispatchFailure;
use crate::media::MediaLocator;
use crate::platforms::Platform;
use crate::types::{PostRequest, PublishReport, PublishResult};

#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn PostingApi>,
    locator: MediaLocator,
    events: EventBus,
    accounts: BTreeMap<Platform, String>,
    timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn PostingApi>, locator: MediaLocator) -> Self {
        Self {
            api,
            locator,
            events: EventBus::default(),
            accounts: BTreeMap::new(),
            timeout: None,
        }
    }

    /// Aggregator account to target per platform
    pub fn with_accounts(mut self, accounts: BTreeMap<Platform, String>) -> Self {
        self.accounts = accounts;
        self
    }

    /// Default deadline applied by [`Dispatcher::publish`]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Publish to every platform of the request
    ///
    /// Never fails as a whole: each platform gets exactly one entry in the
    /// report, success or failure.
    pub async fn publish(&self, request: &PostRequest) -> PublishReport {
        self.run(request, self.timeout).await
    }

    /// Publish with an explicit deadline, overriding any configured one
    ///
    /// # Arguments
    ///
    /// * `request` - The post and its target platforms
    /// * `timeout` - Time allowed for the whole publish, measured from the call
    ///
    /// # Returns
    ///
    /// A report with one entry per platform. Platforms still in flight when
    /// the deadline passes are reported as [`DispatchFailure::Timeout`];
    /// results that completed in time are kept.
    pub async fn publish_with_timeout(&self, request: &PostRequest, timeout: Duration) -> PublishReport {
        self.run(request, Some(timeout)).await
    }

    async fn run(&self, request: &PostRequest, timeout: Option<Duration>) -> PublishReport {
        info!(
            request_id = %request.id,
            platforms = ?request.platforms,
            media_count = request.media.len(),
            "Starting dispatch"
        );
        self.events.emit(Event::DispatchStarted {
            request_id: request.id.clone(),
            platforms: request.platforms.clone(),
        });

        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let futures = request.platforms.iter().map(|&platform| async move {
            let result = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, self.dispatch_one(request, platform))
                    .await
                    .unwrap_or_else(|_| {
                        warn!(request_id = %request.id, platform = %platform, "Dispatch timed out");
                        PublishResult::failed(platform, DispatchFailure::Timeout)
                    }),
                None => self.dispatch_one(request, platform).await,
            };
            self.events.emit(Event::PlatformFinished {
                request_id: request.id.clone(),
                result: result.clone(),
            });
            result
        });

        let report: PublishReport = join_all(futures).await.into_iter().collect();

        let succeeded = report.succeeded_count();
        let failed = report.len() - succeeded;
        info!(request_id = %request.id, succeeded, failed, "Dispatch finished");
        self.events.emit(Event::DispatchFinished {
            request_id: request.id.clone(),
            succeeded,
            failed,
        });

        report
    }

    fn enter(&self, request: &PostRequest, platform: Platform, stage: DispatchStage) {
        debug!(request_id = %request.id, platform = %platform, stage = %stage, "Entering stage");
        self.events.emit(Event::StageEntered {
            request_id: request.id.clone(),
            platform,
            stage,
        });
    }

    async fn dispatch_one(&self, request: &PostRequest, platform: Platform) -> PublishResult {
        let started = Instant::now();

        self.enter(request, platform, DispatchStage::Validating);
        let report = validate_for(platform, &request.content, &request.media, &request.options);
        for warning in &report.warnings {
            debug!(platform = %platform, warning = %warning, "Validation warning");
        }
        if !report.valid {
            warn!(platform = %platform, errors = ?report.messages(), "Validation failed");
            return PublishResult::failed(platform, DispatchFailure::Validation(report.errors));
        }

        if !request.media.is_empty() {
            self.enter(request, platform, DispatchStage::Resolving);
            if let Err(e) = self.locator.resolve_all(&request.media).await {
                warn!(platform = %platform, error = %e, "Media resolution failed");
                return PublishResult::failed(platform, DispatchFailure::Resolution(e));
            }
        }

        self.enter(request, platform, DispatchStage::Normalizing);
        let mut payload = match normalize(platform, &request.content, &request.media, &request.options) {
            Ok(payload) => payload,
            Err(e) => {
                // Resolution succeeded for every item, so this should be unreachable
                error!(platform = %platform, error = %e, "Normalization failed after resolution");
                return PublishResult::failed(platform, DispatchFailure::Normalization(e));
            }
        };
        if !payload.dropped_options.is_empty() {
            debug!(platform = %platform, dropped = ?payload.dropped_options, "Ignoring options");
        }
        if let Some(account_id) = self.accounts.get(&platform) {
            payload = payload.with_account_id(account_id.as_str());
        }

        self.enter(request, platform, DispatchStage::Calling);
        info!(
            platform = %platform,
            content_length = payload.content.chars().count(),
            media_count = payload.media_items.len(),
            "Posting to platform"
        );

        match self.api.create_post(&payload).await {
            Ok(response) => {
                let post_id = response.post_id();
                info!(
                    platform = %platform,
                    post_id = post_id.as_deref().unwrap_or("unknown"),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Posted successfully"
                );
                PublishResult::succeeded(platform, post_id, response.body)
            }
            Err(e) => {
                warn!(
                    platform = %platform,
                    status = ?e.status,
                    error = %e,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Posting failed"
                );
                PublishResult::failed(platform, DispatchFailure::Upstream(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{UpstreamError, ValidationError};
    use crate::mock::{MockPostingApi, MockProbe, MockTunnel};
    use crate::types::{MediaReference, PlatformOptions, PublishOutcome};

    fn dispatcher(api: Arc<MockPostingApi>) -> Dispatcher {
        let locator = MediaLocator::new(
            Arc::new(MockTunnel::new("https://abc.ngrok.app")),
            Arc::new(MockProbe::reachable()),
            "static/uploads",
        );
        Dispatcher::new(api, locator)
    }

    #[tokio::test]
    async fn test_single_platform_success() {
        let api = Arc::new(MockPostingApi::new());
        let request = PostRequest::new("Hello from fanpost", &["x"]).unwrap();

        let report = dispatcher(api.clone()).publish(&request).await;

        assert!(report.all_succeeded());
        assert_eq!(report.get(Platform::X).unwrap().post_id(), Some("x_post_1"));
        assert_eq!(api.calls().len(), 1);
        assert_eq!(api.calls()[0].content, "Hello from fanpost");
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_call() {
        let api = Arc::new(MockPostingApi::new());
        let request = PostRequest::new("a".repeat(281), &["x"]).unwrap();

        let report = dispatcher(api.clone()).publish(&request).await;

        let result = report.get(Platform::X).unwrap();
        assert_eq!(
            result.outcome,
            PublishOutcome::Failed(DispatchFailure::Validation(vec![
                ValidationError::ContentTooLong {
                    actual: 281,
                    limit: 280
                }
            ]))
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_account_id_is_injected() {
        let api = Arc::new(MockPostingApi::new());
        let accounts = BTreeMap::from([(Platform::LinkedIn, "acc_li".to_string())]);
        let request = PostRequest::new("Professional update", &["linkedin", "x"]).unwrap();

        dispatcher(api.clone()).with_accounts(accounts).publish(&request).await;

        let calls = api.calls();
        let linkedin = calls.iter().find(|p| p.platform() == Some(Platform::LinkedIn)).unwrap();
        let x = calls.iter().find(|p| p.platform() == Some(Platform::X)).unwrap();
        assert_eq!(linkedin.platforms[0].account_id.as_deref(), Some("acc_li"));
        assert_eq!(x.platforms[0].account_id, None);
    }

    #[tokio::test]
    async fn test_upstream_failure_keeps_status_and_body() {
        let api = Arc::new(MockPostingApi::new().fail_for(Platform::X, 401, "Invalid API key"));
        let request = PostRequest::new("hi", &["x"]).unwrap();

        let report = dispatcher(api).publish(&request).await;
        let failure = report.get(Platform::X).unwrap().failure().unwrap().clone();

        assert_eq!(
            failure,
            DispatchFailure::Upstream(UpstreamError::new(Some(401), "Invalid API key"))
        );
    }

    #[tokio::test]
    async fn test_events_follow_stages() {
        let api = Arc::new(MockPostingApi::new());
        let dispatcher = dispatcher(api);
        let mut receiver = dispatcher.events().subscribe();
        let request = PostRequest::new("hi", &["x"])
            .unwrap()
            .with_media(MediaReference::remote("https://cdn.example.com/a.png"));

        dispatcher.publish(&request).await;

        let mut stages = Vec::new();
        let mut finished = false;
        while let Ok(event) = receiver.try_recv() {
            match event {
                Event::StageEntered { stage, .. } => stages.push(stage),
                Event::DispatchFinished { succeeded, failed, .. } => {
                    assert_eq!((succeeded, failed), (1, 0));
                    finished = true;
                }
                _ => {}
            }
        }
        assert_eq!(
            stages,
            vec![
                DispatchStage::Validating,
                DispatchStage::Resolving,
                DispatchStage::Normalizing,
                DispatchStage::Calling
            ]
        );
        assert!(finished);
    }

    #[tokio::test]
    async fn test_empty_platform_list_gives_empty_report() {
        let api = Arc::new(MockPostingApi::new());
        let request = PostRequest::for_platforms("hi", vec![]);
        let report = dispatcher(api.clone()).publish(&request).await;
        assert!(report.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_completed_results() {
        let api = Arc::new(
            MockPostingApi::new().with_delay(Platform::LinkedIn, Duration::from_secs(60)),
        );
        let request = PostRequest::new("hi", &["x", "linkedin"]).unwrap();

        let report = dispatcher(api)
            .publish_with_timeout(&request, Duration::from_secs(5))
            .await;

        assert!(report.get(Platform::X).unwrap().is_success());
        assert_eq!(
            report.get(Platform::LinkedIn).unwrap().failure(),
            Some(&DispatchFailure::Timeout)
        );
    }

    #[tokio::test]
    async fn test_unknown_options_do_not_fail_dispatch() {
        let api = Arc::new(MockPostingApi::new());
        let options = PlatformOptions::new().with(Platform::X, "flair", "news");
        let request = PostRequest::new("hi", &["x"]).unwrap().with_options(options);

        let report = dispatcher(api).publish(&request).await;
        assert!(report.all_succeeded());
    }
}
