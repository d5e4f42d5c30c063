use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides `api.api_key`
pub const API_KEY_ENV: &str = "NEWSAPI_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Remote article-search API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Search endpoint (NewsAPI `everything`)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Comma separated list of source domains
    #[serde(default = "default_domains")]
    pub domains: String,
    /// Sort order sent as `sortBy`
    #[serde(default = "default_sort_by")]
    pub sort_by: String,
    /// API key; `NEWSAPI_KEY` takes precedence when set
    #[serde(default)]
    pub api_key: Option<String>,
    /// Articles per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            domains: default_domains(),
            sort_by: default_sort_by(),
            api_key: None,
            page_size: default_page_size(),
        }
    }
}

impl ApiConfig {
    /// Resolve the API key, preferring the environment over the config file
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// SQLite file in the data directory
    Sqlite,
    /// Process memory only, lost on exit
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: CacheBackend,
    /// Key holding the last successful feed result
    #[serde(default = "default_cache_key")]
    pub key: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            key: default_cache_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Request timeout in seconds; unset means requests may wait indefinitely
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// HTTP proxy URL (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// Largest response body accepted, in bytes
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: None,
            proxy_url: None,
            max_response_bytes: default_max_response_bytes(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("newsfeed")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_endpoint() -> String {
    "https://newsapi.org/v2/everything".to_string()
}

fn default_domains() -> String {
    "techcrunch.com".to_string()
}

fn default_sort_by() -> String {
    "publishedAt".to_string()
}

fn default_page_size() -> u32 {
    10
}

fn default_cache_backend() -> CacheBackend {
    CacheBackend::Sqlite
}

fn default_cache_key() -> String {
    crate::feed::FEED_CACHE_KEY.to_string()
}

fn default_max_response_bytes() -> usize {
    5 * 1024 * 1024
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
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self) -> crate::Result<()> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Render configuration as pretty TOML
    pub fn to_toml(&self) -> crate::Result<String> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Get the configuration file path
    /// Always uses ~/.config/newsfeed/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("newsfeed")
            .join("config.toml")
    }

    /// Get the cache database file path
    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("newsfeed.db")
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}
