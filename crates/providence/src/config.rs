//! Configuration management for providence.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::feed::{
    AssetFetcher, DirectoryAssetFetcher, HttpAssetFetcher, NoiseSpec, UnavailableAssetFetcher,
};
use crate::player::PlaybackSettings;
use crate::profile::ProfileStore;
use crate::script::Script;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "providence";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `PROVIDENCE_`)
/// 2. TOML config file at `~/.config/providence/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// System switches.
    pub system: SystemConfig,
    /// Playback configuration.
    pub playback: PlaybackConfig,
    /// Camera feed configuration.
    pub feed: FeedConfig,
}

/// System-level switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Master switch. When off, `run` reports standby and plays nothing.
    pub active: bool,
    /// Identifier shown in the status banner.
    pub system_id: String,
}

/// Playback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Number of ticks per run.
    pub tick_count: u32,
    /// Delay between ticks in milliseconds. Zero disables sleeping.
    pub tick_delay_ms: u64,
    /// Number of log entries kept on screen.
    pub log_capacity: usize,
    /// RNG seed for reproducible jitter and noise.
    pub seed: Option<u64>,
    /// Script file. Defaults to the built-in narrative.
    pub script_path: Option<PathBuf>,
    /// Profile roster file. Defaults to the built-in roster.
    pub profiles_path: Option<PathBuf>,
}

/// Where placeholder images come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetSource {
    /// No source; reveal windows always show the buffering frame.
    #[default]
    None,
    /// Files under `asset_dir`.
    Directory,
    /// HTTP GET against `asset_url`.
    Http,
}

/// Camera feed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Noise frame width in pixels.
    pub width: u32,
    /// Noise frame height in pixels.
    pub height: u32,
    /// Noise channel values are drawn from `0..noise_ceiling`.
    pub noise_ceiling: u8,
    /// Placeholder image source.
    pub asset_source: AssetSource,
    /// Directory for [`AssetSource::Directory`].
    pub asset_dir: Option<PathBuf>,
    /// URL template for [`AssetSource::Http`]. `{key}` is replaced by the asset key.
    pub asset_url: Option<String>,
    /// HTTP timeout in milliseconds.
    pub fetch_timeout_ms: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            active: true,
            system_id: "PRV-2025-X".to_string(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_count: 100,
            tick_delay_ms: 100,
            log_capacity: 7,
            seed: None,
            script_path: None,
            profiles_path: None,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            width: 400,
            height: 300,
            noise_ceiling: 50,
            asset_source: AssetSource::None,
            asset_dir: None,
            asset_url: None,
            fetch_timeout_ms: 3_000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("PROVIDENCE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.playback.tick_count == 0 {
            return Err(Error::config("tick_count must be greater than 0"));
        }

        if self.playback.log_capacity == 0 {
            return Err(Error::config("log_capacity must be greater than 0"));
        }

        if self.feed.width == 0 || self.feed.height == 0 {
            return Err(Error::config(format!(
                "frame dimensions must be non-zero (got {}x{})",
                self.feed.width, self.feed.height
            )));
        }

        if self.feed.noise_ceiling == 0 {
            return Err(Error::config("noise_ceiling must be greater than 0"));
        }

        match self.feed.asset_source {
            AssetSource::Directory if self.feed.asset_dir.is_none() => {
                return Err(Error::config("asset_source = \"directory\" requires asset_dir"));
            }
            AssetSource::Http if self.feed.asset_url.is_none() => {
                return Err(Error::config("asset_source = \"http\" requires asset_url"));
            }
            _ => {}
        }

        Ok(())
    }

    /// Get the tick delay as a Duration.
    #[must_use]
    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.playback.tick_delay_ms)
    }

    /// Get the fetch timeout as a Duration.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.feed.fetch_timeout_ms)
    }

    /// Noise frame shape.
    #[must_use]
    pub fn noise_spec(&self) -> NoiseSpec {
        NoiseSpec {
            width: self.feed.width,
            height: self.feed.height,
            ceiling: self.feed.noise_ceiling,
        }
    }

    /// Player settings derived from this configuration.
    #[must_use]
    pub fn playback_settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            tick_count: self.playback.tick_count,
            tick_delay: self.tick_delay(),
            log_capacity: self.playback.log_capacity,
            seed: self.playback.seed,
            noise: self.noise_spec(),
        }
    }

    /// Load the configured script, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured script file cannot be loaded.
    pub fn script(&self) -> Result<Script> {
        match &self.playback.script_path {
            Some(path) => Script::load(path),
            None => Ok(Script::demo()),
        }
    }

    /// Load the configured profile roster, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured roster file cannot be loaded.
    pub fn profiles(&self) -> Result<ProfileStore> {
        match &self.playback.profiles_path {
            Some(path) => ProfileStore::load(path),
            None => Ok(ProfileStore::demo()),
        }
    }

    /// Build the configured asset fetcher.
    #[must_use]
    pub fn asset_fetcher(&self) -> Arc<dyn AssetFetcher> {
        match (self.feed.asset_source, &self.feed.asset_dir, &self.feed.asset_url) {
            (AssetSource::Directory, Some(dir), _) => Arc::new(DirectoryAssetFetcher::new(dir)),
            (AssetSource::Http, _, Some(url)) => {
                Arc::new(HttpAssetFetcher::new(url.clone(), self.fetch_timeout()))
            }
            _ => Arc::new(UnavailableAssetFetcher),
        }
    }
}
