//! Content and image generation seams
//!
//! The generators themselves are external AI services; this module only
//! defines what the rest of the library expects from them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::platforms::Platform;

/// Produces candidate post texts for each platform
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        platforms: &[Platform],
    ) -> Result<BTreeMap<Platform, Vec<String>>, GenerationError>;
}

/// Produces an image for a topic, stored as a local file
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// `Ok(None)` means the generator chose not to produce an image
    async fn generate_image(&self, topic: &str) -> Result<Option<PathBuf>, GenerationError>;
}

/// Keep only the requested platforms and require at least one non-blank variant for each
pub fn check_variants(
    platforms: &[Platform],
    mut variants: BTreeMap<Platform, Vec<String>>,
) -> Result<BTreeMap<Platform, Vec<String>>, GenerationError> {
    let mut checked = BTreeMap::new();
    for &platform in platforms {
        let texts: Vec<String> = variants
            .remove(&platform)
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            return Err(GenerationError::Empty { platform });
        }
        checked.insert(platform, texts);
    }
    Ok(checked)
}
