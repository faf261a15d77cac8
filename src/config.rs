//! TOML-based configuration system.
//!
//! Declares the search engines, bookmark keywords and history the dispatcher
//! works with, plus the suggestion settings. Every struct implements
//! `Default`, so a missing or partial config file still yields a usable
//! setup (Google, DuckDuckGo and Wikipedia engines, no keywords).
//!
//! ## Config file search order
//!
//! 1. `SURISEARCH_CONFIG` environment variable (explicit override)
//! 2. Next to the executable (`<exe_dir>/config.toml`)
//! 3. Platform config directory (`%APPDATA%\SuriSearch\config.toml` on Windows)
//! 4. Current working directory (`./config.toml`)
//! 5. No file found → `Config::default()`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::history::HistoryEntry;
use crate::keywords::KeywordRecord;

// ─────────────────────────────────────────────────────────────────────────────
// Config structs
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub engines: Vec<EngineConfig>,
    pub keywords: Vec<KeywordConfig>,
    pub history: Vec<HistoryEntry>,
}

/// Default search and suggestion behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Alias prefixed to plain text when searching by default. Empty = none.
    pub default_engine: String,
    /// Engines queried for suggestions when none is named.
    pub suggest_engines: Vec<String>,
    /// Per-request suggestion timeout in milliseconds. 0 = wait forever.
    pub suggest_timeout_ms: u64,
    /// User-agent for suggestion requests. Empty = reqwest default.
    pub user_agent: String,
}

/// One installed search engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub name: String,
    pub alias: Option<String>,
    pub description: String,
    pub icon: Option<String>,
    /// Search URL with a `%s` placeholder.
    pub search_url: String,
    pub post_data: Option<String>,
    /// JSON suggestion URL with a `%s` placeholder.
    pub suggest_url: Option<String>,
}

/// One bookmark with a keyword.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    pub keyword: String,
    pub url: String,
    pub title: String,
    pub post_data: Option<String>,
    /// Charset remembered for `url`.
    pub charset: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Default impls
// ─────────────────────────────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            engines: default_engines(),
            keywords: Vec::new(),
            history: Vec::new(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_engine: "google".to_string(),
            suggest_engines: vec!["google".to_string()],
            suggest_timeout_ms: 0,
            user_agent: String::new(),
        }
    }
}

fn default_engines() -> Vec<EngineConfig> {
    vec![
        EngineConfig {
            name: "Google".to_string(),
            description: "Google".to_string(),
            search_url: "https://www.google.com/search?q=%s".to_string(),
            suggest_url: Some(
                "https://www.google.com/complete/search?client=firefox&q=%s".to_string(),
            ),
            ..EngineConfig::default()
        },
        EngineConfig {
            name: "DuckDuckGo".to_string(),
            description: "DuckDuckGo".to_string(),
            search_url: "https://duckduckgo.com/?q=%s".to_string(),
            suggest_url: Some("https://duckduckgo.com/ac/?q=%s&type=list".to_string()),
            ..EngineConfig::default()
        },
        EngineConfig {
            name: "Wikipedia (en)".to_string(),
            description: "Wikipedia, the Free Encyclopedia".to_string(),
            search_url: "https://en.wikipedia.org/wiki/Special:Search?search=%s".to_string(),
            ..EngineConfig::default()
        },
    ]
}

impl SearchConfig {
    pub fn suggest_timeout(&self) -> Option<Duration> {
        (self.suggest_timeout_ms > 0).then(|| Duration::from_millis(self.suggest_timeout_ms))
    }
}

impl KeywordConfig {
    pub fn to_record(&self) -> KeywordRecord {
        KeywordRecord {
            keyword: self.keyword.clone(),
            url: self.url.clone(),
            title: self.title.clone(),
            post_data: self.post_data.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config loading and saving
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Loads configuration from a TOML file. Never panics — returns defaults
    /// if no file is found or if parsing fails.
    pub fn load() -> Self {
        match find_config_path() {
            Some(path) => match Self::from_path(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "Configuration loaded");
                    config
                }
                Err(e) => {
                    warn!(error = %e, "Invalid config, using defaults");
                    Config::default()
                }
            },
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        }
    }

    /// Reads and validates one config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects entries that could never resolve.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(engine) = self.engines.iter().find(|e| e.search_url.trim().is_empty()) {
            return Err(ConfigError::EmptyTemplate {
                name: engine.name.clone(),
            });
        }
        if let Some(keyword) = self.keywords.iter().find(|k| k.url.trim().is_empty()) {
            return Err(ConfigError::EmptyKeywordUrl {
                keyword: keyword.keyword.clone(),
            });
        }
        Ok(())
    }

    /// Saves configuration to the platform config directory.
    /// Creates the directory if it doesn't exist.
    pub fn save(&self) -> io::Result<()> {
        let path = save_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(&path, content)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

/// Searches for a config file in the standard locations.
fn find_config_path() -> Option<PathBuf> {
    // 1. Explicit env var override
    if let Ok(path) = std::env::var("SURISEARCH_CONFIG") {
        let p = PathBuf::from(path);
        if p.is_file() {
            return Some(p);
        }
    }

    // 2. Next to the executable
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // 3. Platform config directory
    if let Some(dir) = platform_config_dir() {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // 4. Current working directory
    let p = PathBuf::from("config.toml");
    if p.is_file() {
        return Some(p);
    }

    None
}

/// Returns the platform-specific save path for the config file.
fn save_path() -> PathBuf {
    platform_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("config.toml")
}

/// Returns the platform config directory without adding a dependency.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join("SuriSearch"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|h| format!("{h}/.config")))
            .map(|dir| PathBuf::from(dir).join("surisearch"))
    }
}
