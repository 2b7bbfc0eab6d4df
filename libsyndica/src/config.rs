//! Configuration management for Syndica

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub signer: SignerConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    pub facebook: Option<FacebookConfig>,
    pub instagram: Option<InstagramConfig>,
    pub pinterest: Option<PinterestConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

/// Blob-store signing material for hydrating storage references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Base URL the signed URLs are served from.
    pub endpoint: String,
    /// Shared HMAC key, base64-encoded.
    pub key: String,
    /// How long signed URLs stay valid.
    #[serde(default = "default_url_ttl_secs")]
    pub url_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Status allow-list for due-post selection (at most 10 values).
    #[serde(default = "default_publish_statuses")]
    pub statuses: Vec<String>,
    /// Selection window length, `[now - window, now]`.
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    /// Seconds between readiness-poll attempts.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Attempt budget per readiness poll.
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            statuses: default_publish_statuses(),
            window_minutes: default_window_minutes(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_max_attempts: default_poll_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookConfig {
    #[serde(default = "default_graph_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    #[serde(default = "default_graph_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinterestConfig {
    #[serde(default = "default_pinterest_api_url")]
    pub api_url: String,
    pub app_id: String,
    pub app_secret: String,
}

fn default_url_ttl_secs() -> u64 {
    3600
}

fn default_publish_statuses() -> Vec<String> {
    vec!["Uploaded".to_string()]
}

fn default_window_minutes() -> i64 {
    15
}

fn default_poll_interval_secs() -> u64 {
    3
}

fn default_poll_max_attempts() -> u32 {
    20
}

fn default_graph_api_url() -> String {
    "https://graph.facebook.com/v24.0".to_string()
}

fn default_pinterest_api_url() -> String {
    "https://api.pinterest.com/v5".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            store: StoreConfig {
                path: "~/.local/share/syndica/posts.db".to_string(),
            },
            signer: SignerConfig {
                endpoint: "https://storage.googleapis.com".to_string(),
                key: String::new(),
                url_ttl_secs: default_url_ttl_secs(),
            },
            publish: PublishConfig::default(),
            facebook: Some(FacebookConfig {
                api_url: default_graph_api_url(),
            }),
            instagram: Some(InstagramConfig {
                api_url: default_graph_api_url(),
            }),
            pinterest: None,
        }
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("SYNDICA_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("syndica").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [store]
            path = ":memory:"

            [signer]
            endpoint = "https://storage.example.com"
            key = "c2VjcmV0"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.store.path, ":memory:");
        assert_eq!(config.signer.url_ttl_secs, 3600);
        assert_eq!(config.publish.statuses, vec!["Uploaded"]);
        assert_eq!(config.publish.window_minutes, 15);
        assert_eq!(config.publish.poll_max_attempts, 20);
        assert!(config.pinterest.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [store]
            path = "/tmp/syndica.db"

            [signer]
            endpoint = "https://storage.example.com"
            key = "c2VjcmV0"
            url_ttl_secs = 600

            [publish]
            statuses = ["Uploaded", "Scheduled"]
            window_minutes = 30
            poll_interval_secs = 1
            poll_max_attempts = 5

            [facebook]

            [instagram]
            api_url = "https://graph.facebook.com/v23.0"

            [pinterest]
            app_id = "app"
            app_secret = "secret"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.publish.statuses.len(), 2);
        assert_eq!(config.publish.poll_interval_secs, 1);
        assert_eq!(
            config.facebook.unwrap().api_url,
            "https://graph.facebook.com/v24.0"
        );
        assert_eq!(
            config.instagram.unwrap().api_url,
            "https://graph.facebook.com/v23.0"
        );
        let pinterest = config.pinterest.unwrap();
        assert_eq!(pinterest.api_url, "https://api.pinterest.com/v5");
        assert_eq!(pinterest.app_id, "app");
    }

    #[test]
    #[serial_test::serial]
    fn test_config_path_env_override() {
        std::env::set_var("SYNDICA_CONFIG", "/tmp/syndica-test/config.toml");
        let path = resolve_config_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/syndica-test/config.toml"));
        std::env::remove_var("SYNDICA_CONFIG");

        let default_path = resolve_config_path().unwrap();
        assert!(default_path.ends_with("syndica/config.toml"));
    }

    #[test]
    fn test_default_config_has_sane_publish_settings() {
        let config = Config::default_config();
        assert_eq!(config.publish.statuses, vec!["Uploaded"]);
        assert!(config.facebook.is_some());
        assert!(config.pinterest.is_none());
    }
}
