use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{self, CACHE_FILE_NAME};
use crate::recent::MAX_RECENT_SEARCHES;
use crate::remote::DEFAULT_RECORD_TYPE;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_DIR_NAME: &str = "craftbook";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub status: StatusConfig,
}

/// Where the remote catalog and the shared key-value store live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Record type queried from the catalog database
    pub record_type: String,
    /// JSON export of catalog records (empty = `<data_dir>/records.json`)
    pub records_path: Option<String>,
    /// Records returned per page
    pub page_size: usize,
    /// Shared key-value file (empty = `<data_dir>/kv.json`)
    pub kv_path: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            record_type: DEFAULT_RECORD_TYPE.to_string(),
            records_path: None,
            page_size: 100,
            kv_path: None,
        }
    }
}

/// Fetch and reconciliation behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Attempts per page, first try included
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub retry_delay_secs: u64,
    /// Prune favorites even when some records could not be decoded
    pub prune_on_partial_fetch: bool,
    /// Fetch the catalog as soon as the service starts
    pub sync_on_start: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 3,
            prune_on_partial_fetch: false,
            sync_on_start: true,
        }
    }
}

/// Local snapshot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Data directory (empty = platform data dir)
    pub data_dir: Option<String>,
    pub file_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            file_name: CACHE_FILE_NAME.to_string(),
        }
    }
}

/// Transient status and history settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Seconds before a status message is dismissed
    pub dismiss_after_secs: u64,
    /// Recent searches to remember (at most 5)
    pub max_recent_searches: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            dismiss_after_secs: 5,
            max_recent_searches: MAX_RECENT_SEARCHES,
        }
    }
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR_NAME);

        fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from `path`, writing defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path).context("Failed to read config file")?;

            let config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;

            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Generate example config content for documentation
    pub fn example_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Directory holding the cache, preferences and default remote files
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.cache.data_dir {
            Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => cache::default_data_dir(),
        }
    }

    pub fn records_path(&self) -> Result<PathBuf> {
        match &self.remote.records_path {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(self.data_dir()?.join("records.json")),
        }
    }

    pub fn kv_path(&self) -> Result<PathBuf> {
        match &self.remote.kv_path {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Ok(self.data_dir()?.join("kv.json")),
        }
    }
}
