//! Service layer for Fanpost
//!
//! `FanpostService` is the entry point used by front ends. It wires the
//! aggregator client, the media locator and the event bus into a
//! [`Dispatcher`], and hands out the validation and workflow services.
//!
//! - `validation`: per-platform rule checks
//! - `normalize`: aggregator payload construction
//! - `dispatch`: concurrent multi-platform publishing
//! - `workflow`: generate, select and publish content
//! - `events`: progress event distribution
//!
//! # Example
//!
//! ```no_run
//! use libfanpost::service::FanpostService;
//! use libfanpost::{Config, PostRequest};
//!
//! # async fn example() -> libfanpost::Result<()> {
//! let service = FanpostService::from_config(Config::load()?)?;
//!
//! let request = PostRequest::new("Hello from fanpost!", &["x", "linkedin"])?;
//! let report = service.dispatcher().publish(&request).await;
//!
//! for (platform, result) in &report.results {
//!     println!("{}: {:?}", platform, result.outcome);
//! }
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod events;
pub mod normalize;
pub mod validation;
pub mod workflow;

use std::sync::Arc;

pub use self::dispatch::Dispatcher;
pub use self::validation::{ValidationReport, ValidationService};
pub use self::workflow::WorkflowService;

use self::events::{EventBus, EventReceiver};
use crate::client::{AggregatorClient, PostingApi};
use crate::generation::{ContentGenerator, ImageGenerator};
use crate::media::MediaLocator;
use crate::workflow::WorkflowStore;
use crate::{Config, Result};

pub struct FanpostService {
    api: Arc<dyn PostingApi>,
    dispatcher: Dispatcher,
    validation: ValidationService,
    workflows: Arc<WorkflowStore>,
    event_bus: EventBus,
}

impl FanpostService {
    /// Build the real HTTP-backed service from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or an HTTP client cannot
    /// be built.
    pub fn from_config(config: Config) -> Result<Self> {
        let api: Arc<dyn PostingApi> = Arc::new(AggregatorClient::from_config(&config)?);
        let locator = MediaLocator::from_config(&config.media)?;
        let service = Self::from_parts(api, locator);
        let dispatcher = service
            .dispatcher
            .clone()
            .with_accounts(config.account_ids())
            .with_timeout(config.dispatch_timeout());
        Ok(Self { dispatcher, ..service })
    }

    /// Assemble a service from explicit collaborators
    pub fn from_parts(api: Arc<dyn PostingApi>, locator: MediaLocator) -> Self {
        let event_bus = EventBus::default();
        let dispatcher = Dispatcher::new(Arc::clone(&api), locator).with_events(event_bus.clone());

        Self {
            api,
            dispatcher,
            validation: ValidationService::new(),
            workflows: Arc::new(WorkflowStore::new()),
            event_bus,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn validation(&self) -> &ValidationService {
        &self.validation
    }

    pub fn api(&self) -> &Arc<dyn PostingApi> {
        &self.api
    }

    pub fn workflows(&self) -> &Arc<WorkflowStore> {
        &self.workflows
    }

    /// A workflow service sharing this service's store and dispatcher
    pub fn workflow_service(
        &self,
        content: Arc<dyn ContentGenerator>,
        images: Option<Arc<dyn ImageGenerator>>,
    ) -> WorkflowService {
        let service = WorkflowService::new(Arc::clone(&self.workflows), content, self.dispatcher.clone());
        match images {
            Some(images) => service.with_image_generator(images),
            None => service,
        }
    }

    /// Progress events from every dispatch made through this service
    pub fn subscribe(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockContentGenerator, MockPostingApi, MockProbe, MockTunnel};
    use crate::platforms::Platform;
    use crate::types::{PlatformOptions, PostRequest};
    use events::Event;

    fn service(api: Arc<MockPostingApi>) -> FanpostService {
        let locator = MediaLocator::new(
            Arc::new(MockTunnel::new("https://abc.ngrok.app")),
            Arc::new(MockProbe::reachable()),
            "static/uploads",
        );
        FanpostService::from_parts(api, locator)
    }

    #[tokio::test]
    async fn test_subscribers_see_dispatch_events() {
        let service = service(Arc::new(MockPostingApi::new()));
        let mut events = service.subscribe();

        let request = PostRequest::new("hello", &["x"]).unwrap();
        service.dispatcher().publish(&request).await;

        let first = events.recv().await.unwrap();
        assert!(matches!(first, Event::DispatchStarted { .. }));
        assert_eq!(first.request_id(), request.id);
    }

    #[tokio::test]
    async fn test_workflow_service_shares_store() {
        let service = service(Arc::new(MockPostingApi::new()));
        let workflows = service.workflow_service(Arc::new(MockContentGenerator::numbered()), None);

        let id = workflows.start("topic", vec![Platform::X]).await.unwrap();
        assert_eq!(service.workflows().ids().await, vec![id]);

        workflows.publish(id, PlatformOptions::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_accounts_through_api() {
        let service = service(Arc::new(MockPostingApi::new()));
        assert!(service.api().list_accounts().await.unwrap().is_empty());
    }

    #[test]
    #[serial_test::serial]
    fn test_from_config_requires_api_key() {
        std::env::remove_var(crate::config::API_KEY_ENV);
        assert!(FanpostService::from_config(Config::default()).is_err());
    }
}
