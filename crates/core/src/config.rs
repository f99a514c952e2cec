//! Config file parsing for `~/.config/bokelai/config.toml`.
//!
//! Every field has a default, so a missing or partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::COVER_CACHE_FILE;
use crate::error::ConfigError;

pub const DEFAULT_DETAIL_URL: &str = "https://www.books.com.tw/products/{id}";
pub const DEFAULT_QUERY_URL: &str = "https://search.books.com.tw/search/query/key/{query}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Detail page template; `{id}` is replaced by the book id.
    #[serde(default = "default_detail_url")]
    pub detail_url: String,
    /// Search page template; `{query}` is replaced by the encoded query.
    #[serde(default = "default_query_url")]
    pub query_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Inserted between title and author names in free-text searches.
    #[serde(default)]
    pub query_separator: String,
}

fn default_detail_url() -> String {
    DEFAULT_DETAIL_URL.to_string()
}
fn default_query_url() -> String {
    DEFAULT_QUERY_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("Mozilla/5.0 (compatible; bokelai-metadata/", env!("CARGO_PKG_VERSION"), ")").to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            detail_url: default_detail_url(),
            query_url: default_query_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            query_separator: String::new(),
        }
    }
}

impl SourceConfig {
    /// Per-request timeout; zero means the default.
    pub fn timeout(&self) -> Duration {
        match self.timeout_secs {
            0 => Duration::from_secs(default_timeout_secs()),
            secs => Duration::from_secs(secs),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding the cover URL cache; platform cache dir when unset.
    pub dir: Option<String>,
}

impl CacheConfig {
    pub fn cover_cache_path(&self) -> Option<PathBuf> {
        let dir = match &self.dir {
            Some(d) => PathBuf::from(d),
            None => dirs::cache_dir()?.join("bokelai"),
        };
        Some(dir.join(COVER_CACHE_FILE))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

/// Load config from the default path. Falls back to defaults if it is missing or unreadable.
pub fn load_config() -> AppConfig {
    let Some(path) = config_path() else {
        return AppConfig::default();
    };
    match load_config_from(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "using default config");
            AppConfig::default()
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

pub fn save_config_to(cfg: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("bokelai");
        p.push("config.toml");
        p
    })
}

/// Set a dotted key such as `source.timeout_secs`.
pub fn set_config_key(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    let parts: Vec<&str> = key.splitn(2, '.').collect();
    match parts.as_slice() {
        ["source", sub] => match *sub {
            "detail_url" if value.contains("{id}") => cfg.source.detail_url = value.to_string(),
            "query_url" if value.contains("{query}") => cfg.source.query_url = value.to_string(),
            "detail_url" | "query_url" => return Err(invalid()),
            "timeout_secs" => {
                cfg.source.timeout_secs = value.parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(invalid)?
            }
            "user_agent" => cfg.source.user_agent = value.to_string(),
            "query_separator" => cfg.source.query_separator = value.to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        },
        ["cache", "dir"] => cfg.cache.dir = Some(value.to_string()),
        ["log", "level"] => cfg.log.level = value.to_string(),
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
}
