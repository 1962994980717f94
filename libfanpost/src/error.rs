//! Error types for Fanpost
//!
//! Usage errors (an unknown platform name) and infrastructure errors travel as
//! `FanpostError`. Business-rule failures for a single platform (validation,
//! media resolution, upstream rejection) are plain data carried inside
//! [`DispatchFailure`] so a multi-platform publish can report partial success.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::platforms::Platform;
use crate::types::MediaKind;
use crate::workflow::WorkflowStatus;

pub type Result<T> = std::result::Result<T, FanpostError>;

#[derive(Error, Debug)]
pub enum FanpostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Content generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl FanpostError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            FanpostError::InvalidInput(_) | FanpostError::UnsupportedPlatform(_) => 3,
            FanpostError::Upstream(e) if e.is_auth_failure() => 2,
            FanpostError::Upstream(_) => 1,
            FanpostError::Config(_) => 1,
            FanpostError::Workflow(_) => 1,
            FanpostError::Generation(_) => 1,
            FanpostError::Http(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// A post that breaks one of a platform's rules
///
/// These are recoverable and are shown to the end user verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Content length ({actual} characters) exceeds the {limit} character limit")]
    ContentTooLong { actual: usize, limit: usize },

    #[error("At least one media file is required")]
    MediaRequired,

    #[error("Too many media files ({actual}); at most {limit} allowed")]
    TooManyMedia { actual: usize, limit: usize },

    #[error("Media item {index} has unsupported type {media_kind}")]
    UnsupportedMediaType { index: usize, media_kind: MediaKind },

    #[error("Missing required option: {field}")]
    MissingRequiredField { field: String },

    #[error("Title is required")]
    TitleRequired,

    #[error("Title length ({actual} characters) exceeds the {limit} character limit")]
    TitleTooLong { actual: usize, limit: usize },
}

/// Failure to turn a media reference into a reachable public URL
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionError {
    #[error("Media file not found: {}", .path.display())]
    MediaNotFound { path: PathBuf },

    #[error("Tunnel unavailable: {reason}")]
    TunnelUnavailable { reason: String },

    #[error("Media unreachable at {url}: {cause}")]
    MediaUnreachable { url: String, cause: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizeError {
    #[error("Media item {index} ({}) has not been resolved to a public URL", .path.display())]
    UnresolvedMedia { index: usize, path: PathBuf },
}

/// Non-2xx response or transport failure from the posting aggregator
///
/// `status` is `None` when no HTTP response was received at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamError {
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, Some(401) | Some(403))
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for UpstreamError {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Content generator returned no variants for {platform}")]
    Empty { platform: Platform },

    #[error("Provider error: {0}")]
    Provider(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(Uuid),

    #[error("No content variants recorded for {platform}")]
    NoVariants { platform: Platform },

    #[error("Variant {index} out of range for {platform} ({available} available)")]
    VariantOutOfRange {
        platform: Platform,
        index: usize,
        available: usize,
    },

    #[error("Workflow is {status}, not ready to publish")]
    NotReady { status: WorkflowStatus },

    #[error("Nothing selected to publish")]
    NothingSelected,
}

/// Why a single platform dispatch ended in failure
///
/// Each variant corresponds to the stage of the dispatch that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchFailure {
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Media resolution failed: {0}")]
    Resolution(ResolutionError),

    #[error("Payload normalization failed: {0}")]
    Normalization(NormalizeError),

    #[error("Posting failed: {0}")]
    Upstream(UpstreamError),

    #[error("Timed out before the platform dispatch completed")]
    Timeout,
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = FanpostError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_unsupported_platform() {
        let error = FanpostError::UnsupportedPlatform("myspace".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = FanpostError::Upstream(UpstreamError::new(Some(401), "Invalid API key"));
        assert_eq!(error.exit_code(), 2);

        let error = FanpostError::Upstream(UpstreamError::new(Some(403), "Forbidden"));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_upstream_error() {
        let error = FanpostError::Upstream(UpstreamError::new(Some(500), "boom"));
        assert_eq!(error.exit_code(), 1);

        let error = FanpostError::Upstream(UpstreamError::transport("connection refused"));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_config_error() {
        let error = FanpostError::Config(ConfigError::MissingField("api.api_key".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_upstream_error_display_with_status() {
        let error = UpstreamError::new(Some(500), "Internal server error");
        assert_eq!(error.to_string(), "500 Internal server error");
    }

    #[test]
    fn test_upstream_error_display_without_status() {
        let error = UpstreamError::transport("request failed: connection refused");
        assert_eq!(error.to_string(), "request failed: connection refused");
    }

    #[test]
    fn test_validation_error_messages_carry_numbers() {
        let error = ValidationError::ContentTooLong {
            actual: 281,
            limit: 280,
        };
        let message = error.to_string();
        assert!(message.contains("281"));
        assert!(message.contains("280"));
    }

    #[test]
    fn test_dispatch_failure_joins_validation_errors() {
        let failure = DispatchFailure::Validation(vec![
            ValidationError::MediaRequired,
            ValidationError::MissingRequiredField {
                field: "board_id".to_string(),
            },
        ]);
        assert_eq!(
            failure.to_string(),
            "Validation failed: At least one media file is required; Missing required option: board_id"
        );
    }

    #[test]
    fn test_dispatch_failure_upstream_message() {
        let failure = DispatchFailure::Upstream(UpstreamError::new(Some(500), "oops"));
        assert_eq!(failure.to_string(), "Posting failed: 500 oops");
    }

    #[test]
    fn test_error_conversion_from_workflow_error() {
        let id = Uuid::new_v4();
        let error: FanpostError = WorkflowError::NotFound(id).into();
        match error {
            FanpostError::Workflow(WorkflowError::NotFound(found)) => assert_eq!(found, id),
            _ => panic!("Expected FanpostError::Workflow"),
        }
    }

    #[test]
    fn test_dispatch_failure_serializes_with_kind_tag() {
        let failure = DispatchFailure::Resolution(ResolutionError::TunnelUnavailable {
            reason: "no tunnels".to_string(),
        });
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "resolution");
        assert_eq!(json["detail"]["kind"], "tunnel_unavailable");
        assert_eq!(json["detail"]["reason"], "no tunnels");
    }
}
