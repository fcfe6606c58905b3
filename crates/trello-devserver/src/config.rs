//! Configuration types and loading logic.

use std::path::PathBuf;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

/// Top-level server configuration.
///
/// Every field has a default, so the binary runs with no config file at all.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub trello: TrelloConfig,

    #[serde(default)]
    pub avatar: AvatarConfig,

    /// Log level filter (e.g. "info", "debug", "trello_devserver=debug,info").
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listen address, static file root, and browser launch behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Directory static files are served from.
    #[serde(default = "default_static_root")]
    pub static_root: PathBuf,

    /// Page opened in the browser on startup, relative to the static root.
    #[serde(default = "default_test_page")]
    pub test_page: String,

    #[serde(default = "default_true")]
    pub open_browser: bool,
}

/// Trello REST API upstream (the `/api/trello/` prefix).
#[derive(Debug, Clone, Deserialize)]
pub struct TrelloConfig {
    #[serde(default = "default_trello_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Avatar host upstream (the `/api/avatar/` prefix).
#[derive(Debug, Clone, Deserialize)]
pub struct AvatarConfig {
    #[serde(default = "default_avatar_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_static_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_test_page() -> String {
    "test.html".to_string()
}

fn default_true() -> bool {
    true
}

fn default_trello_base_url() -> String {
    "https://api.trello.com".to_string()
}

fn default_avatar_base_url() -> String {
    "https://trello-members.s3.amazonaws.com/".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            static_root: default_static_root(),
            test_page: default_test_page(),
            open_browser: default_true(),
        }
    }
}

impl Default for TrelloConfig {
    fn default() -> Self {
        Self {
            base_url: default_trello_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            base_url: default_avatar_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from TOML file and environment variables.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (TRELLO_DEV_ prefix, __ for nesting)
    /// 2. TOML config file
    /// 3. Defaults
    pub fn load(config_path: &str) -> anyhow::Result<Self> {
        let config: ProxyConfig = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TRELLO_DEV_").split("__"))
            .extract()?;

        Ok(config)
    }
}
