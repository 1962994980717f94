//! Core types for Fanpost

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::error::{DispatchFailure, FanpostError, Result};
use crate::platforms::Platform;

// ============================================================================
// Media
// ============================================================================

/// Kind of a media file, detected from its extension or MIME type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Jpeg,
    Png,
    Gif,
    WebP,
    Mp4,
    Mov,
    Unknown,
}

impl MediaKind {
    /// Parse MIME type from a MIME string (e.g., "image/jpeg")
    pub fn from_mime_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Self::Jpeg,
            "image/png" => Self::Png,
            "image/gif" => Self::Gif,
            "image/webp" => Self::WebP,
            "video/mp4" => Self::Mp4,
            "video/quicktime" => Self::Mov,
            _ => Self::Unknown,
        }
    }

    /// Detect media kind from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "webp" => Self::WebP,
            "mp4" => Self::Mp4,
            "mov" => Self::Mov,
            _ => Self::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Detect media kind from the path component of a URL
    ///
    /// Query strings and fragments are ignored.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let last_segment = path.rsplit('/').next().unwrap_or(path);
        match last_segment.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => Self::Unknown,
        }
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Mp4 => "video/mp4",
            Self::Mov => "video/quicktime",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Mp4 | Self::Mov)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a media file lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MediaSource {
    /// A file on the local disk that must be exposed through a tunnel
    Local(PathBuf),
    /// A URL that is already publicly reachable
    Remote(String),
}

/// A media file attached to a post
///
/// Local files carry a resolution cache: the first successful resolution to a
/// public URL is stored and reused by every platform dispatch of the owning
/// request. Failed resolutions are not cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaReference {
    pub source: MediaSource,
    pub kind: MediaKind,
    #[serde(skip)]
    resolved: OnceCell<String>,
}

impl MediaReference {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = MediaKind::from_path(&path);
        Self {
            source: MediaSource::Local(path),
            kind,
            resolved: OnceCell::new(),
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = MediaKind::from_url(&url);
        Self {
            source: MediaSource::Remote(url),
            kind,
            resolved: OnceCell::new(),
        }
    }

    /// Build a reference from user input: http(s) URLs are remote, anything else is a path
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Self::remote(trimmed)
        } else {
            Self::local(trimmed)
        }
    }

    /// Override the detected kind (e.g. when the MIME type is known)
    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, MediaSource::Local(_))
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            MediaSource::Local(path) => Some(path),
            MediaSource::Remote(_) => None,
        }
    }

    /// The publicly reachable URL, if known without any network I/O
    pub fn public_url(&self) -> Option<&str> {
        match &self.source {
            MediaSource::Remote(url) => Some(url),
            MediaSource::Local(_) => self.resolved.get().map(String::as_str),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.public_url().is_some()
    }

    pub(crate) fn resolution_cache(&self) -> &OnceCell<String> {
        &self.resolved
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Per-platform option bag (e.g. `reddit.subreddit`, `x.hashtags`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformOptions(BTreeMap<Platform, BTreeMap<String, Value>>);

impl PlatformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, platform: Platform, key: impl Into<String>, value: impl Into<Value>) {
        self.0
            .entry(platform)
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn with(mut self, platform: Platform, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(platform, key, value);
        self
    }

    pub fn for_platform(&self, platform: Platform) -> Option<&BTreeMap<String, Value>> {
        self.0.get(&platform)
    }

    pub fn get(&self, platform: Platform, key: &str) -> Option<&Value> {
        self.0.get(&platform).and_then(|opts| opts.get(key))
    }

    /// A string option, trimmed; blank strings count as absent
    pub fn get_str(&self, platform: Platform, key: &str) -> Option<&str> {
        self.get(platform, key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Apply a `platform.key=value` assignment as given on the command line
    pub fn parse_assignment(&mut self, assignment: &str) -> Result<()> {
        let (target, value) = assignment.split_once('=').ok_or_else(|| {
            FanpostError::InvalidInput(format!(
                "Option '{}' must look like platform.key=value",
                assignment
            ))
        })?;
        let (platform, key) = target.split_once('.').ok_or_else(|| {
            FanpostError::InvalidInput(format!(
                "Option '{}' must name a platform, e.g. reddit.subreddit=rust",
                assignment
            ))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(FanpostError::InvalidInput(format!(
                "Option '{}' has an empty key",
                assignment
            )));
        }
        let platform: Platform = platform.parse()?;
        self.set(platform, key, value.trim());
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single logical post to publish on one or more platforms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRequest {
    pub id: String,
    pub content: String,
    pub media: Vec<MediaReference>,
    pub options: PlatformOptions,
    pub platforms: Vec<Platform>,
}

impl PostRequest {
    /// Create a request from platform names
    ///
    /// # Errors
    ///
    /// Returns `FanpostError::UnsupportedPlatform` for an unknown name and
    /// `FanpostError::InvalidInput` when no platform is given.
    pub fn new<S: AsRef<str>>(content: impl Into<String>, platform_names: &[S]) -> Result<Self> {
        let platforms = platform_names
            .iter()
            .map(|name| name.as_ref().parse::<Platform>())
            .collect::<Result<Vec<_>>>()?;
        if platforms.is_empty() {
            return Err(FanpostError::InvalidInput(
                "At least one platform must be selected".to_string(),
            ));
        }
        Ok(Self::for_platforms(content, platforms))
    }

    pub fn for_platforms(content: impl Into<String>, platforms: Vec<Platform>) -> Self {
        let mut unique = Vec::with_capacity(platforms.len());
        for platform in platforms {
            if !unique.contains(&platform) {
                unique.push(platform);
            }
        }
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            media: Vec::new(),
            options: PlatformOptions::default(),
            platforms: unique,
        }
    }

    pub fn with_media(mut self, media: MediaReference) -> Self {
        self.media.push(media);
        self
    }

    pub fn with_options(mut self, options: PlatformOptions) -> Self {
        self.options = options;
        self
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Succeeded {
        post_id: Option<String>,
        response: Value,
    },
    Failed(DispatchFailure),
}

/// Final result of publishing one request to one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    pub platform: Platform,
    pub outcome: PublishOutcome,
    pub completed_at: DateTime<Utc>,
}

impl PublishResult {
    pub fn succeeded(platform: Platform, post_id: Option<String>, response: Value) -> Self {
        Self {
            platform,
            outcome: PublishOutcome::Succeeded { post_id, response },
            completed_at: Utc::now(),
        }
    }

    pub fn failed(platform: Platform, failure: DispatchFailure) -> Self {
        Self {
            platform,
            outcome: PublishOutcome::Failed(failure),
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PublishOutcome::Succeeded { .. })
    }

    pub fn post_id(&self) -> Option<&str> {
        match &self.outcome {
            PublishOutcome::Succeeded { post_id, .. } => post_id.as_deref(),
            PublishOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&DispatchFailure> {
        match &self.outcome {
            PublishOutcome::Succeeded { .. } => None,
            PublishOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.failure().map(|f| f.to_string())
    }
}

/// Results of one publish call, keyed by platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishReport {
    pub results: BTreeMap<Platform, PublishResult>,
}

impl PublishReport {
    pub fn insert(&mut self, result: PublishResult) {
        self.results.insert(result.platform, result);
    }

    pub fn merge(&mut self, other: PublishReport) {
        self.results.extend(other.results);
    }

    pub fn get(&self, platform: Platform) -> Option<&PublishResult> {
        self.results.get(&platform)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        !self.results.is_empty() && self.results.values().all(PublishResult::is_success)
    }

    pub fn any_succeeded(&self) -> bool {
        self.results.values().any(PublishResult::is_success)
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.values().filter(|r| r.is_success()).count()
    }

    pub fn failed_platforms(&self) -> Vec<Platform> {
        self.results
            .values()
            .filter(|r| !r.is_success())
            .map(|r| r.platform)
            .collect()
    }
}

impl FromIterator<PublishResult> for PublishReport {
    fn from_iter<I: IntoIterator<Item = PublishResult>>(iter: I) -> Self {
        let mut report = PublishReport::default();
        for result in iter {
            report.insert(result);
        }
        report
    }
}
