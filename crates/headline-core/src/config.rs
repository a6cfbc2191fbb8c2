use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::backoff::BackoffPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Cache directory holding feeds.json, news.html and the IPC socket
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Pause between fetch cycles in seconds
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// HTTP proxy URL for feed fetching (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// Delay after the first consecutive failure of a feed
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,
    /// Upper bound for the per-feed retry delay
    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            request_timeout_secs: default_timeout(),
            proxy_url: None,
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Entries shown per feed section
    #[serde(default = "default_max_entries")]
    pub max_entries_per_feed: usize,
    /// Page title
    #[serde(default = "default_title")]
    pub title: String,
    /// Page meta description
    #[serde(default = "default_description")]
    pub description: String,
    /// Literal strings removed from every entry description
    #[serde(default = "default_boilerplate")]
    pub boilerplate: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_entries_per_feed: default_max_entries(),
            title: default_title(),
            description: default_description(),
            boilerplate: default_boilerplate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Enable enrichment providers (each still needs its credential)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-provider time budget in seconds
    #[serde(default = "default_enrich_timeout")]
    pub timeout_secs: u64,
    /// Crypto tickers quoted by the markets provider
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            timeout_secs: default_enrich_timeout(),
            tickers: default_tickers(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("headline")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    600 // 10 minutes
}

fn default_timeout() -> u64 {
    30
}

fn default_backoff_base() -> u64 {
    60
}

fn default_backoff_max() -> u64 {
    14400 // 4 hours
}

fn default_max_entries() -> usize {
    10
}

fn default_title() -> String {
    "News".to_string()
}

fn default_description() -> String {
    "Read the news".to_string()
}

fn default_boilerplate() -> Vec<String> {
    vec!["© 2024 TechCrunch. All rights reserved. For personal use only.".to_string()]
}

fn default_enrich_timeout() -> u64 {
    10
}

fn default_tickers() -> Vec<String> {
    ["BTC", "BNB", "ETH", "SOL"].iter().map(|t| t.to_string()).collect()
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file or return defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path, defaulting when it is missing
    pub fn load_from(config_path: &std::path::Path) -> crate::Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.sync.refresh_interval_secs == 0 {
            return Err(crate::Error::Config(
                "sync.refresh_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.sync.backoff_base_secs == 0 || self.sync.backoff_max_secs < self.sync.backoff_base_secs {
            return Err(crate::Error::Config(
                "sync.backoff_base_secs must be > 0 and <= sync.backoff_max_secs".to_string(),
            ));
        }
        if self.render.max_entries_per_feed == 0 {
            return Err(crate::Error::Config(
                "render.max_entries_per_feed must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the configuration file path
    /// Always uses ~/.config/headline/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("headline")
            .join("config.toml")
    }

    /// Get the cache directory (with tilde expansion)
    pub fn cache_dir(&self) -> PathBuf {
        expand_tilde(&self.general.cache_dir)
    }

    /// Get the Unix socket path for IPC
    pub fn socket_path(&self) -> PathBuf {
        self.cache_dir().join("headline.sock")
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.sync.refresh_interval_secs)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_secs(self.sync.backoff_base_secs),
            Duration::from_secs(self.sync.backoff_max_secs),
        )
    }
}
