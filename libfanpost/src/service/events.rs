//! Dispatch progress events
//!
//! An in-process broadcast bus. The dispatcher emits an event as each platform
//! moves through its stages; any number of subscribers (CLI progress output,
//! logs, tests) can listen. Emitting never blocks: with no subscribers the
//! event is dropped, and a lagging subscriber loses its oldest events.
//!
//! ```
//! use libfanpost::service::events::{Event, EventBus};
//! use libfanpost::Platform;
//!
//! # async fn example() {
//! let bus = EventBus::new(64);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(Event::DispatchStarted {
//!     request_id: "abc123".to_string(),
//!     platforms: vec![Platform::X],
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::platforms::Platform;
use crate::types::PublishResult;

pub type EventReceiver = broadcast::Receiver<Event>;

/// Default per-subscriber buffer
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// `capacity` is how many events a subscriber may fall behind before
    /// it starts missing the oldest ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Stage of a single platform dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStage {
    Validating,
    Resolving,
    Normalizing,
    Calling,
}

impl std::fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DispatchStage::Validating => "validating",
            DispatchStage::Resolving => "resolving",
            DispatchStage::Normalizing => "normalizing",
            DispatchStage::Calling => "calling",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    DispatchStarted {
        request_id: String,
        platforms: Vec<Platform>,
    },

    StageEntered {
        request_id: String,
        platform: Platform,
        stage: DispatchStage,
    },

    /// Terminal state for one platform
    PlatformFinished {
        request_id: String,
        result: PublishResult,
    },

    DispatchFinished {
        request_id: String,
        succeeded: usize,
        failed: usize,
    },
}

impl Event {
    pub fn request_id(&self) -> &str {
        match self {
            Event::DispatchStarted { request_id, .. }
            | Event::StageEntered { request_id, .. }
            | Event::PlatformFinished { request_id, .. }
            | Event::DispatchFinished { request_id, .. } => request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchFailure;

    #[tokio::test]
    async fn test_event_emission_and_subscription() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        let event = Event::DispatchStarted {
            request_id: "req1".to_string(),
            platforms: vec![Platform::X, Platform::Reddit],
        };
        bus.emit(event.clone());

        assert_eq!(receiver.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_the_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(Event::StageEntered {
            request_id: "req1".to_string(),
            platform: Platform::LinkedIn,
            stage: DispatchStage::Calling,
        });

        assert_eq!(first.recv().await.unwrap().request_id(), "req1");
        assert_eq!(second.recv().await.unwrap().request_id(), "req1");
    }

    #[test]
    fn test_emit_without_subscribers_does_not_fail() {
        let bus = EventBus::default();
        bus.emit(Event::DispatchFinished {
            request_id: "req1".to_string(),
            succeeded: 0,
            failed: 1,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_loses_oldest_events() {
        let bus = EventBus::new(2);
        let mut receiver = bus.subscribe();

        for i in 0..4 {
            bus.emit(Event::DispatchFinished {
                request_id: format!("req{}", i),
                succeeded: i,
                failed: 0,
            });
        }

        assert!(matches!(
            receiver.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(receiver.recv().await.unwrap().request_id(), "req2");
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::PlatformFinished {
            request_id: "req1".to_string(),
            result: PublishResult::failed(Platform::Instagram, DispatchFailure::Timeout),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "platform_finished");
        assert_eq!(json["result"]["platform"], "instagram");

        let stage = serde_json::to_value(DispatchStage::Normalizing).unwrap();
        assert_eq!(stage, "normalizing");
    }
}
