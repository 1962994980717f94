//! Supported publishing platforms
//!
//! Every platform the aggregator can post to is a variant of [`Platform`].
//! Platform-specific behavior is data, not code: each variant maps to a static
//! [`PlatformRule`] consulted by validation, and to a match arm in the payload
//! normalizer.
//!
//! # Examples
//!
//! ```
//! use libfanpost::platforms::Platform;
//!
//! let platform: Platform = "Twitter".parse().unwrap();
//! assert_eq!(platform, Platform::X);
//! assert_eq!(platform.rule().max_content_length, 280);
//! assert!("myspace".parse::<Platform>().is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FanpostError;

pub mod rules;

pub use rules::PlatformRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "twitter")]
    X,
    Instagram,
    Facebook,
    LinkedIn,
    Reddit,
    Pinterest,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::X,
        Platform::Instagram,
        Platform::Facebook,
        Platform::LinkedIn,
        Platform::Reddit,
        Platform::Pinterest,
    ];

    /// Lowercase identifier used by the aggregator API
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::X => "x",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::LinkedIn => "linkedin",
            Platform::Reddit => "reddit",
            Platform::Pinterest => "pinterest",
        }
    }

    /// Human-readable name for messages
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::X => "X",
            Platform::Instagram => "Instagram",
            Platform::Facebook => "Facebook",
            Platform::LinkedIn => "LinkedIn",
            Platform::Reddit => "Reddit",
            Platform::Pinterest => "Pinterest",
        }
    }

    pub fn rule(&self) -> &'static PlatformRule {
        rules::rule_for(*self)
    }

    /// Parse a comma-separated platform list, skipping blanks and duplicates
    ///
    /// Fails on the first name that is not a supported platform.
    pub fn parse_list(list: &str) -> Result<Vec<Platform>, FanpostError> {
        let mut platforms = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let platform: Platform = name.parse()?;
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        Ok(platforms)
    }
}

impl FromStr for Platform {
    type Err = FanpostError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x" | "twitter" => Ok(Platform::X),
            "instagram" => Ok(Platform::Instagram),
            "facebook" => Ok(Platform::Facebook),
            "linkedin" => Ok(Platform::LinkedIn),
            "reddit" => Ok(Platform::Reddit),
            "pinterest" => Ok(Platform::Pinterest),
            _ => Err(FanpostError::UnsupportedPlatform(s.to_string())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("LinkedIn".parse::<Platform>().unwrap(), Platform::LinkedIn);
        assert_eq!("INSTAGRAM".parse::<Platform>().unwrap(), Platform::Instagram);
        assert_eq!(" reddit ".parse::<Platform>().unwrap(), Platform::Reddit);
    }

    #[test]
    fn test_twitter_alias() {
        assert_eq!("twitter".parse::<Platform>().unwrap(), Platform::X);
        let parsed: Platform = serde_json::from_str("\"twitter\"").unwrap();
        assert_eq!(parsed, Platform::X);
    }

    #[test]
    fn test_unsupported_platform() {
        let err = "tiktok".parse::<Platform>().unwrap_err();
        assert!(matches!(err, FanpostError::UnsupportedPlatform(ref name) if name == "tiktok"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_round_trip_through_as_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
            assert_eq!(platform.to_string(), platform.as_str());
        }
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Platform::LinkedIn).unwrap(), "\"linkedin\"");
        assert_eq!(serde_json::to_string(&Platform::X).unwrap(), "\"x\"");
    }

    #[test]
    fn test_parse_list_dedups_and_skips_blanks() {
        let platforms = Platform::parse_list("x, twitter,,linkedin").unwrap();
        assert_eq!(platforms, vec![Platform::X, Platform::LinkedIn]);
    }

    #[test]
    fn test_parse_list_rejects_unknown() {
        assert!(Platform::parse_list("x,friendster").is_err());
    }
}
