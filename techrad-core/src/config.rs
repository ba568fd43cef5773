use anyhow::{Context, Result, anyhow};
use chrono::TimeDelta;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{bridge::BridgeOptions, location::LocationOptions, model::Position};

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "TECHRAD_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Weather provider credentials and endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    /// Example: "https://api.openweathermap.org/data/2.5"
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Cached readings younger than this are sent as-is on startup.
    pub freshness_minutes: i64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { freshness_minutes: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub timeout_secs: u64,
    pub maximum_age_secs: u64,
    /// Fixed host position; without it the host has no position source.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Default for LocationConfig {
    fn default() -> Self {
        let defaults = LocationOptions::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            maximum_age_secs: defaults.maximum_age.as_secs(),
            latitude: None,
            longitude: None,
        }
    }
}

/// Host configuration stored on disk.
///
/// Example TOML:
/// [provider]
/// api_key = "..."
///
/// [location]
/// latitude = 52.52
/// longitude = 13.40
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub refresh: RefreshConfig,
    pub location: LocationConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_file_path()?)
    }

    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Default location of the durable key/value store.
    pub fn storage_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("storage.json"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "techrad", "techrad")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// API key from the environment if set, otherwise from the file.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_with_override(std::env::var(API_KEY_ENV).ok())
    }

    pub fn api_key_with_override(&self, env_value: Option<String>) -> Option<String> {
        env_value
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.provider.api_key.clone())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.provider.api_key = Some(api_key);
    }

    pub fn base_url(&self) -> &str {
        self.provider.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn fixed_position(&self) -> Option<Position> {
        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
            _ => None,
        }
    }

    pub fn set_fixed_position(&mut self, position: Option<Position>) {
        self.location.latitude = position.map(|p| p.latitude);
        self.location.longitude = position.map(|p| p.longitude);
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            freshness: TimeDelta::try_minutes(self.refresh.freshness_minutes)
                .unwrap_or_else(|| TimeDelta::minutes(RefreshConfig::default().freshness_minutes)),
            location: LocationOptions {
                timeout: Duration::from_secs(self.location.timeout_secs),
                maximum_age: Duration::from_secs(self.location.maximum_age_secs),
            },
        }
    }
}
