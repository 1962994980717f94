//! Content validation service
//!
//! Checks a candidate post against the static rule of each target platform:
//! character limits, media presence, media count and type, required options
//! and title length. Every violation is collected rather than stopping at the
//! first one, and the outcome is returned as data. The only error is a usage
//! error for a platform name that is not supported.

use std::collections::BTreeMap;

use serde::Serialize;

use super::normalize::effective_title;
use crate::error::{Result, ValidationError};
use crate::platforms::{Platform, PlatformRule};
use crate::types::{MediaReference, PlatformOptions};

/// Content longer than this on X gets an engagement warning
const X_WARN_LENGTH: usize = 200;
/// Facebook posts shorter than this get a warning
const FACEBOOK_SHORT_LENGTH: usize = 10;
/// LinkedIn posts shorter than this get a warning
const LINKEDIN_SHORT_LENGTH: usize = 50;

/// Validation result for a single platform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub platform: Platform,
    /// Whether content is valid for this platform
    pub valid: bool,
    /// Rule violations, in the order the checks run
    pub errors: Vec<ValidationError>,
    /// Non-blocking advice
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Human-readable error messages
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

/// Validate a post for a platform given by name
///
/// # Errors
///
/// Returns `FanpostError::UnsupportedPlatform` if `platform` is not a known
/// platform name. Rule violations are reported in the returned report.
pub fn validate(
    platform: &str,
    content: &str,
    media: &[MediaReference],
    options: &PlatformOptions,
) -> Result<ValidationReport> {
    let platform: Platform = platform.parse()?;
    Ok(validate_for(platform, content, media, options))
}

/// Validate a post for a platform
pub fn validate_for(
    platform: Platform,
    content: &str,
    media: &[MediaReference],
    options: &PlatformOptions,
) -> ValidationReport {
    let rule = platform.rule();
    let mut errors = Vec::new();

    let char_count = content.chars().count();
    if char_count > rule.max_content_length {
        errors.push(ValidationError::ContentTooLong {
            actual: char_count,
            limit: rule.max_content_length,
        });
    }

    if rule.media_required && media.is_empty() {
        errors.push(ValidationError::MediaRequired);
    }

    if media.len() > rule.max_media_count {
        errors.push(ValidationError::TooManyMedia {
            actual: media.len(),
            limit: rule.max_media_count,
        });
    }

    for (index, item) in media.iter().enumerate() {
        if !rule.allows(item.kind) {
            errors.push(ValidationError::UnsupportedMediaType {
                index,
                media_kind: item.kind,
            });
        }
    }

    check_options(rule, content, options, &mut errors);

    ValidationReport {
        platform,
        valid: errors.is_empty(),
        errors,
        warnings: warnings_for(platform, char_count),
    }
}

fn check_options(
    rule: &PlatformRule,
    content: &str,
    options: &PlatformOptions,
    errors: &mut Vec<ValidationError>,
) {
    for field in rule.required_fields {
        if options.get_str(rule.platform, field).is_none() {
            errors.push(ValidationError::MissingRequiredField {
                field: (*field).to_string(),
            });
        }
    }

    if rule.max_title_length.is_some() {
        let title = effective_title(rule.platform, content, options).unwrap_or_default();
        if title.trim().is_empty() {
            errors.push(ValidationError::TitleRequired);
        }
    }

    if let (Some(limit), Some(title)) = (rule.max_title_length, options.get_str(rule.platform, "title")) {
        let actual = title.chars().count();
        if actual > limit {
            errors.push(ValidationError::TitleTooLong { actual, limit });
        }
    }
}

fn warnings_for(platform: Platform, char_count: usize) -> Vec<String> {
    let mut warnings = Vec::new();
    match platform {
        Platform::X if char_count > X_WARN_LENGTH => {
            warnings.push("Post is quite long, consider shortening for better engagement".to_string());
        }
        Platform::Facebook if char_count < FACEBOOK_SHORT_LENGTH => {
            warnings.push("Post content is very short, consider adding more context".to_string());
        }
        Platform::LinkedIn if char_count < LINKEDIN_SHORT_LENGTH => {
            warnings.push("LinkedIn posts perform better with more substantial content".to_string());
        }
        _ => {}
    }
    warnings
}

/// Service for validating one post against several platforms
///
/// # Example
///
/// ```
/// use libfanpost::service::validation::{ValidationRequest, ValidationService};
///
/// let service = ValidationService::new();
/// let request = ValidationRequest::new("Hello world!", &["x", "instagram"]).unwrap();
///
/// let response = service.validate(&request);
/// assert!(!response.valid); // instagram needs media
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidationService;

/// Request to validate content for specific platforms
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub content: String,
    pub platforms: Vec<Platform>,
    pub media: Vec<MediaReference>,
    pub options: PlatformOptions,
}

impl ValidationRequest {
    pub fn new<S: AsRef<str>>(content: impl Into<String>, platforms: &[S]) -> Result<Self> {
        let platforms = platforms
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<Platform>>>()?;
        Ok(Self {
            content: content.into(),
            platforms,
            media: Vec::new(),
            options: PlatformOptions::default(),
        })
    }
}

/// Response containing validation results
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResponse {
    /// Whether content is valid for all requested platforms
    pub valid: bool,
    pub results: Vec<ValidationReport>,
}

impl ValidationService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, request: &ValidationRequest) -> ValidationResponse {
        let results: Vec<ValidationReport> = request
            .platforms
            .iter()
            .map(|platform| validate_for(*platform, &request.content, &request.media, &request.options))
            .collect();

        ValidationResponse {
            valid: results.iter().all(|r| r.valid),
            results,
        }
    }

    /// Check if content is valid for all specified platforms
    pub fn is_valid(&self, content: &str, platforms: &[Platform]) -> bool {
        platforms
            .iter()
            .all(|p| validate_for(*p, content, &[], &PlatformOptions::default()).valid)
    }

    pub fn rules_for(&self, platforms: &[Platform]) -> Vec<&'static PlatformRule> {
        platforms.iter().map(|p| p.rule()).collect()
    }

    /// Character limits for the given platforms
    pub fn limits(&self, platforms: &[Platform]) -> BTreeMap<Platform, usize> {
        platforms
            .iter()
            .map(|p| (*p, p.rule().max_content_length))
            .collect()
    }
}
