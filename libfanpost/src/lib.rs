//! Fanpost - multi-platform social publishing through a posting aggregator
//!
//! This library validates a post against per-platform rules, makes local media
//! publicly reachable, normalizes the post into the aggregator's payload shape
//! and fans it out to every requested platform, reporting a result per platform.

pub mod client;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod media;
pub mod platforms;
pub mod service;
pub mod types;
pub mod workflow;

// Mock collaborators are available for all builds (not just tests) to support integration tests
pub mod mock;

// Re-export commonly used types
pub use config::Config;
pub use error::{FanpostError, Result};
pub use platforms::{Platform, PlatformRule};
pub use types::{
    MediaKind, MediaReference, PlatformOptions, PostRequest, PublishOutcome, PublishReport,
    PublishResult,
};
