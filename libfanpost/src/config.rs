//! Configuration management for Fanpost
//!
//! Configuration is a TOML file found at `$FANPOST_CONFIG` or
//! `<config dir>/fanpost/config.toml`. Every section is optional; a missing
//! file yields the defaults. The aggregator API key may come from the file or
//! from `FANPOST_API_KEY`, which takes precedence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::platforms::Platform;

pub const CONFIG_PATH_ENV: &str = "FANPOST_CONFIG";
pub const API_KEY_ENV: &str = "FANPOST_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://getlate.dev/api/v1";
pub const DEFAULT_UPLOAD_PATH: &str = "static/uploads";
pub const DEFAULT_NGROK_API_URL: &str = "http://localhost:4040";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Posting aggregator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
    /// Platform name to aggregator account id
    #[serde(default)]
    pub accounts: BTreeMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_api_timeout(),
            accounts: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelKind {
    /// Ask the local ngrok agent for its public URL
    #[default]
    Ngrok,
    /// Use `public_base_url` as-is
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// URL path under which local media files are served
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    #[serde(default)]
    pub tunnel: TunnelKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,
    #[serde(default = "default_ngrok_api_url")]
    pub ngrok_api_url: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            upload_path: default_upload_path(),
            tunnel: TunnelKind::default(),
            public_base_url: None,
            ngrok_api_url: default_ngrok_api_url(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Deadline for a whole multi-platform publish
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            platforms: default_platforms(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_timeout() -> u64 {
    30
}

fn default_upload_path() -> String {
    DEFAULT_UPLOAD_PATH.to_string()
}

fn default_ngrok_api_url() -> String {
    DEFAULT_NGROK_API_URL.to_string()
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_platforms() -> Vec<String> {
    vec!["x".to_string()]
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Load from the default location, or use defaults if no file exists
    pub fn load_or_default() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        for name in self.api.accounts.keys() {
            name.parse::<Platform>().map_err(|_| ConfigError::InvalidValue {
                field: format!("api.accounts.{}", name),
                reason: "not a supported platform".to_string(),
            })?;
        }
        for name in &self.defaults.platforms {
            name.parse::<Platform>().map_err(|_| ConfigError::InvalidValue {
                field: "defaults.platforms".to_string(),
                reason: format!("'{}' is not a supported platform", name),
            })?;
        }
        if self.media.tunnel == TunnelKind::Static && self.media.public_base_url.is_none() {
            return Err(ConfigError::MissingField("media.public_base_url".to_string()).into());
        }
        Ok(())
    }

    /// The aggregator API key; `FANPOST_API_KEY` wins over the file
    pub fn api_key(&self) -> Result<SecretString> {
        let key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api.api_key.clone().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| ConfigError::MissingField("api.api_key".to_string()))?;
        Ok(SecretString::from(key))
    }

    /// Aggregator account id per platform
    pub fn account_ids(&self) -> BTreeMap<Platform, String> {
        self.api
            .accounts
            .iter()
            .filter_map(|(name, id)| name.parse().ok().map(|p| (p, id.clone())))
            .collect()
    }

    pub fn default_platforms(&self) -> Vec<Platform> {
        self.defaults
            .platforms
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatch.timeout_secs.map(Duration::from_secs)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("fanpost").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FanpostError;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
[api]
base_url = "https://api.example.com/v1"
api_key = "file-key"
timeout_secs = 10

[api.accounts]
x = "acc_x"
twitter_typo = "ignored"

[media]
upload_path = "media/public"
tunnel = "static"
public_base_url = "https://media.example.com"
probe_timeout_secs = 2

[dispatch]
timeout_secs = 60

[defaults]
platforms = ["x", "linkedin"]
"#;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.media.upload_path, "static/uploads");
        assert_eq!(config.media.tunnel, TunnelKind::Ngrok);
        assert_eq!(config.media.ngrok_api_url, DEFAULT_NGROK_API_URL);
        assert_eq!(config.dispatch_timeout(), None);
        assert_eq!(config.default_platforms(), vec![Platform::X]);
    }

    #[test]
    fn test_unknown_account_platform_is_rejected() {
        let err = Config::from_toml(FULL_CONFIG).unwrap_err();
        match err {
            FanpostError::Config(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "api.accounts.twitter_typo");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_full_config() {
        let toml = FULL_CONFIG.replace("twitter_typo = \"ignored\"\n", "");
        let config = Config::from_toml(&toml).unwrap();

        assert_eq!(config.api.base_url, "https://api.example.com/v1");
        assert_eq!(config.api_timeout(), Duration::from_secs(10));
        assert_eq!(config.media.tunnel, TunnelKind::Static);
        assert_eq!(
            config.media.public_base_url.as_deref(),
            Some("https://media.example.com")
        );
        assert_eq!(config.dispatch_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(
            config.default_platforms(),
            vec![Platform::X, Platform::LinkedIn]
        );
        assert_eq!(
            config.account_ids().get(&Platform::X).map(String::as_str),
            Some("acc_x")
        );
    }

    #[test]
    fn test_static_tunnel_requires_base_url() {
        let err = Config::from_toml("[media]\ntunnel = \"static\"\n").unwrap_err();
        assert!(matches!(
            err,
            FanpostError::Config(ConfigError::MissingField(ref f)) if f == "media.public_base_url"
        ));
    }

    #[test]
    fn test_bad_default_platform() {
        let err = Config::from_toml("[defaults]\nplatforms = [\"myspace\"]\n").unwrap_err();
        assert!(matches!(err, FanpostError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_error() {
        let err = Config::from_toml("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, FanpostError::Config(ConfigError::ParseError(_))));
    }

    #[test]
    #[serial]
    fn test_api_key_env_overrides_file() {
        let config = Config::from_toml("[api]\napi_key = \"file-key\"\n").unwrap();

        std::env::remove_var(API_KEY_ENV);
        assert_eq!(config.api_key().unwrap().expose_secret(), "file-key");

        std::env::set_var(API_KEY_ENV, "env-key");
        assert_eq!(config.api_key().unwrap().expose_secret(), "env-key");
        std::env::remove_var(API_KEY_ENV);
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        std::env::remove_var(API_KEY_ENV);
        let config = Config::default();
        let err = config.api_key().unwrap_err();
        assert!(matches!(
            err,
            FanpostError::Config(ConfigError::MissingField(ref f)) if f == "api.api_key"
        ));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let config = Config::from_toml("[api]\napi_key = \"secret\"\n").unwrap();
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }

    #[test]
    #[serial]
    fn test_load_from_env_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[dispatch]\ntimeout_secs = 5").unwrap();

        std::env::set_var(CONFIG_PATH_ENV, file.path());
        let config = Config::load().unwrap();
        std::env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(config.dispatch.timeout_secs, Some(5));
    }

    #[test]
    #[serial]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var(CONFIG_PATH_ENV, dir.path().join("missing.toml"));
        let config = Config::load_or_default().unwrap();
        std::env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_expands_tilde() {
        std::env::set_var(CONFIG_PATH_ENV, "~/fanpost-test.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var(CONFIG_PATH_ENV);

        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("fanpost-test.toml"));
    }
}
