//! Configuration management for imgrake.
//!
//! Configuration is loaded from the platform config directory with defaults
//! for every value, so a missing file is not an error.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::types::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for imgrake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Keyword list, storage root and progress log locations
    pub storage: StorageConfig,

    /// Canonical image shape and encoding
    pub image: ImageConfig,

    /// Crawler worker pools and HTTP behavior
    pub crawl: CrawlConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Normalization settings
    pub normalize: NormalizeConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.imgrake.imgrake/config.toml
    /// - Linux: ~/.config/imgrake/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\imgrake\config\config.toml
    ///
    /// Falls back to ~/.imgrake/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "imgrake", "imgrake")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".imgrake").join("config.toml")
            })
    }

    /// Resolved storage root (with ~ expansion).
    pub fn storage_root(&self) -> PathBuf {
        expand(&self.storage.root)
    }

    /// Resolved keyword list path (with ~ expansion).
    pub fn keyword_list(&self) -> PathBuf {
        expand(&self.storage.keyword_list)
    }

    /// Resolved progress log path (with ~ expansion).
    pub fn progress_log(&self) -> PathBuf {
        expand(&self.storage.progress_log)
    }

    /// Worker pool sizes for the acquisition stage.
    pub fn workers(&self) -> WorkerConfig {
        WorkerConfig {
            discovery: self.crawl.feeder_threads,
            extraction: self.crawl.parser_threads,
            download: self.crawl.downloader_threads,
            queue_size: self.crawl.queue_size,
        }
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(&path_str);
    PathBuf::from(expanded.into_owned())
}
