//! Per-platform posting rules

use serde::Serialize;

use super::Platform;
use crate::types::MediaKind;

/// Static constraints a post must satisfy before it is sent to a platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformRule {
    pub platform: Platform,
    /// Maximum content length in characters (not bytes)
    pub max_content_length: usize,
    pub media_required: bool,
    pub max_media_count: usize,
    pub allowed_media_types: &'static [MediaKind],
    /// Option keys that must be present and non-empty
    pub required_fields: &'static [&'static str],
    /// Limit for an explicit `title` option, where the platform has titles
    pub max_title_length: Option<usize>,
}

impl PlatformRule {
    pub fn allows(&self, kind: MediaKind) -> bool {
        self.allowed_media_types.contains(&kind)
    }
}

const ALL_MEDIA: &[MediaKind] = &[
    MediaKind::Jpeg,
    MediaKind::Png,
    MediaKind::Gif,
    MediaKind::WebP,
    MediaKind::Mp4,
    MediaKind::Mov,
];

static X_RULE: PlatformRule = PlatformRule {
    platform: Platform::X,
    max_content_length: 280,
    media_required: false,
    max_media_count: 4,
    allowed_media_types: ALL_MEDIA,
    required_fields: &[],
    max_title_length: None,
};

static INSTAGRAM_RULE: PlatformRule = PlatformRule {
    platform: Platform::Instagram,
    max_content_length: 2200,
    media_required: true,
    max_media_count: 10,
    allowed_media_types: &[MediaKind::Jpeg, MediaKind::Png],
    required_fields: &[],
    max_title_length: None,
};

static FACEBOOK_RULE: PlatformRule = PlatformRule {
    platform: Platform::Facebook,
    max_content_length: 63206,
    media_required: false,
    max_media_count: 50,
    allowed_media_types: ALL_MEDIA,
    required_fields: &[],
    max_title_length: None,
};

static LINKEDIN_RULE: PlatformRule = PlatformRule {
    platform: Platform::LinkedIn,
    max_content_length: 3000,
    media_required: false,
    max_media_count: 9,
    allowed_media_types: &[MediaKind::Jpeg, MediaKind::Png, MediaKind::Gif, MediaKind::Mp4],
    required_fields: &[],
    max_title_length: None,
};

static REDDIT_RULE: PlatformRule = PlatformRule {
    platform: Platform::Reddit,
    max_content_length: 40000,
    media_required: false,
    max_media_count: 20,
    allowed_media_types: &[
        MediaKind::Jpeg,
        MediaKind::Png,
        MediaKind::Gif,
        MediaKind::WebP,
        MediaKind::Mp4,
    ],
    required_fields: &["subreddit"],
    max_title_length: Some(300),
};

static PINTEREST_RULE: PlatformRule = PlatformRule {
    platform: Platform::Pinterest,
    max_content_length: 500,
    media_required: true,
    max_media_count: 5,
    allowed_media_types: &[MediaKind::Jpeg, MediaKind::Png, MediaKind::WebP],
    required_fields: &["board_id"],
    max_title_length: Some(100),
};

pub fn rule_for(platform: Platform) -> &'static PlatformRule {
    match platform {
        Platform::X => &X_RULE,
        Platform::Instagram => &INSTAGRAM_RULE,
        Platform::Facebook => &FACEBOOK_RULE,
        Platform::LinkedIn => &LINKEDIN_RULE,
        Platform::Reddit => &REDDIT_RULE,
        Platform::Pinterest => &PINTEREST_RULE,
    }
}
