//! Payload normalization
//!
//! Turns a generic post into the aggregator's request body for one platform.
//! Normalization is pure: it reads its inputs, never performs I/O, and two
//! calls with the same inputs produce byte-identical JSON.
//!
//! The body shape is:
//!
//! ```json
//! {
//!   "content": "...",
//!   "platforms": [{"platform": "reddit", "accountId": "...", "platformSpecificData": {...}}],
//!   "mediaItems": [{"type": "image", "url": "https://..."}]
//! }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::NormalizeError;
use crate::platforms::Platform;
use crate::types::{MediaReference, PlatformOptions};

/// Default Reddit title length when no title option is given
const REDDIT_DEFAULT_TITLE_CHARS: usize = 200;
/// Default Pinterest title length when no title option is given
const PINTEREST_DEFAULT_TITLE_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPayload {
    pub content: String,
    pub platforms: Vec<PlatformTarget>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_items: Vec<MediaItem>,
    /// Option keys that have no meaning for the target platform
    #[serde(skip)]
    pub dropped_options: Vec<String>,
}

impl NormalizedPayload {
    /// Target a specific aggregator account on every platform entry
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        for target in &mut self.platforms {
            target.account_id = Some(account_id.clone());
        }
        self
    }

    pub fn platform(&self) -> Option<Platform> {
        self.platforms.first().map(|t| t.platform)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTarget {
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub platform_specific_data: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaItemType {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub item_type: MediaItemType,
    pub url: String,
}

/// Build the aggregator body for `platform`
///
/// # Errors
///
/// Returns `NormalizeError::UnresolvedMedia` if a local media reference has
/// not been resolved to a public URL yet.
pub fn normalize(
    platform: Platform,
    content: &str,
    media: &[MediaReference],
    options: &PlatformOptions,
) -> Result<NormalizedPayload, NormalizeError> {
    let media_items = media_items(media)?;
    let limit = platform.rule().max_content_length;
    let opts = PlatformOpts { platform, options };

    let mut data = Map::new();
    let mut dropped_options = Vec::new();

    let known: &[&str] = match platform {
        Platform::X => &["hashtags", "mentions"],
        Platform::Instagram | Platform::Facebook => &["hashtags", "location"],
        Platform::LinkedIn => &["hashtags", "mentions", "article_url", "visibility"],
        Platform::Reddit => &["subreddit", "title", "url", "flair"],
        Platform::Pinterest => &["board_id", "title", "link", "hashtags", "keywords"],
    };
    if let Some(given) = options.for_platform(platform) {
        dropped_options.extend(given.keys().filter(|k| !known.contains(&k.as_str())).cloned());
    }

    let content = match platform {
        Platform::X => {
            let mut text = content.trim().to_string();
            let hashtags = opts.list("hashtags");
            if !hashtags.is_empty() {
                text = fit(text.clone(), format!("{} {}", text, tag_string('#', &hashtags)), limit);
            }
            let mentions = opts.list("mentions");
            if !mentions.is_empty() {
                text = fit(text.clone(), format!("{} {}", tag_string('@', &mentions), text), limit);
            }
            text
        }
        Platform::Instagram | Platform::Facebook => {
            let mut text = content.to_string();
            let hashtags = opts.list("hashtags");
            if !hashtags.is_empty() {
                text = fit(text.clone(), format!("{}\n\n{}", text, tag_string('#', &hashtags)), limit);
            }
            if let Some(location) = opts.text("location") {
                text = fit(text.clone(), format!("{}\n📍 {}", text, location), limit);
            }
            text.trim().to_string()
        }
        Platform::LinkedIn => {
            let mut text = content.to_string();
            let hashtags = opts.list("hashtags");
            if !hashtags.is_empty() {
                text = fit(text.clone(), format!("{}\n\n{}", text, tag_string('#', &hashtags)), limit);
            }
            let mentions = opts.list("mentions");
            if !mentions.is_empty() {
                text = fit(text.clone(), format!("{}\n\n{}", text, tag_string('@', &mentions)), limit);
            }
            if let Some(article) = opts.text("article_url") {
                text = fit(text.clone(), format!("{}\n\nRead more: {}", text, article), limit);
            }
            if let Some(visibility) = opts.text("visibility") {
                data.insert("visibility".to_string(), Value::from(visibility.to_uppercase()));
            }
            text.trim().to_string()
        }
        Platform::Reddit => {
            if let Some(subreddit) = opts.text("subreddit") {
                data.insert("subreddit".to_string(), Value::from(subreddit_name(subreddit)));
            }
            if let Some(title) = effective_title(platform, content, options) {
                data.insert("title".to_string(), Value::from(title));
            }
            if let Some(url) = opts.text("url") {
                data.insert("url".to_string(), Value::from(url));
            }
            if let Some(flair) = opts.text("flair") {
                data.insert("flairId".to_string(), Value::from(flair));
            }
            content.trim().to_string()
        }
        Platform::Pinterest => {
            if let Some(board) = opts.text("board_id") {
                data.insert("boardId".to_string(), Value::from(board));
            }
            if let Some(title) = effective_title(platform, content, options) {
                data.insert("title".to_string(), Value::from(title));
            }
            if let Some(link) = opts.text("link") {
                data.insert("link".to_string(), Value::from(link));
            }
            let mut text = content.to_string();
            let hashtags = opts.list("hashtags");
            if !hashtags.is_empty() {
                text = fit(text.clone(), format!("{}\n\n{}", text, tag_string('#', &hashtags)), limit);
            }
            let keywords = opts.list("keywords");
            if !keywords.is_empty() {
                text = fit(text.clone(), format!("{}\n\n{}", text, keywords.join(" ")), limit);
            }
            text.trim().to_string()
        }
    };

    Ok(NormalizedPayload {
        content,
        platforms: vec![PlatformTarget {
            platform,
            account_id: None,
            platform_specific_data: data,
        }],
        media_items,
        dropped_options,
    })
}

fn media_items(media: &[MediaReference]) -> Result<Vec<MediaItem>, NormalizeError> {
    media
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let url = item.public_url().ok_or_else(|| NormalizeError::UnresolvedMedia {
                index,
                path: item.local_path().map(|p| p.to_path_buf()).unwrap_or_default(),
            })?;
            Ok(MediaItem {
                item_type: if item.kind.is_video() {
                    MediaItemType::Video
                } else {
                    MediaItemType::Image
                },
                url: url.to_string(),
            })
        })
        .collect()
}

/// Option lookups scoped to one platform
struct PlatformOpts<'a> {
    platform: Platform,
    options: &'a PlatformOptions,
}

impl<'a> PlatformOpts<'a> {
    fn text(&self, key: &str) -> Option<&'a str> {
        self.options.get_str(self.platform, key)
    }

    /// A list option, given either as a JSON array or a comma/space separated string
    fn list(&self, key: &str) -> Vec<String> {
        let raw: Vec<&str> = match self.options.get(self.platform, key) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            Some(Value::String(s)) => s.split([',', ' ']).collect(),
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(|s| s.trim().trim_start_matches(['#', '@']))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn tag_string(prefix: char, tags: &[String]) -> String {
    tags.iter()
        .map(|t| format!("{}{}", prefix, t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keep `candidate` only if it stays within the platform limit
fn fit(current: String, candidate: String, limit: usize) -> String {
    if candidate.chars().count() <= limit {
        candidate
    } else {
        current
    }
}

/// The title sent for `platform`: the `title` option, else the start of the content
///
/// `None` for platforms without titles.
pub(crate) fn effective_title(platform: Platform, content: &str, options: &PlatformOptions) -> Option<String> {
    let default_chars = match platform {
        Platform::Reddit => REDDIT_DEFAULT_TITLE_CHARS,
        Platform::Pinterest => PINTEREST_DEFAULT_TITLE_CHARS,
        _ => return None,
    };
    let title = options
        .get_str(platform, "title")
        .map(str::to_string)
        .unwrap_or_else(|| first_chars(content.trim(), default_chars));
    Some(title)
}

fn first_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

fn subreddit_name(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('/')
        .trim_start_matches("r/")
        .trim()
        .to_string()
}
