//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment
use crate::session::SessionSettings;
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Progress notifications are capped at 4 per second by default.
const DEFAULT_NOTIFY_INTERVAL_MS: u64 = 250;
const MAX_NOTIFY_INTERVAL_MS: u64 = 10_000;

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "exarch")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("exarch.toml"))
}

/// Export naming knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Fallback archive-name prefix when the selection has no display name.
    pub app_name: String,
    /// Extension of the produced archive container.
    pub extension: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            app_name: "exarch".to_string(),
            extension: "zip".to_string(),
        }
    }
}

/// Progress delivery tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Minimum milliseconds between in-progress notifications.
    pub notify_interval_ms: u64,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            notify_interval_ms: DEFAULT_NOTIFY_INTERVAL_MS,
        }
    }
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub export: ExportSettings,
    pub progress: ProgressSettings,
}

impl AppConfig {
    /// Validates bounds and rejects unusable values.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.export.app_name.trim().is_empty(),
            "Invalid config: export.app_name must not be empty"
        );
        ensure!(
            !self.export.extension.trim().is_empty(),
            "Invalid config: export.extension must not be empty"
        );
        ensure!(
            self.progress.notify_interval_ms <= MAX_NOTIFY_INTERVAL_MS,
            "Invalid config: progress.notify_interval_ms must be <= {MAX_NOTIFY_INTERVAL_MS}"
        );
        Ok(())
    }

    /// Session settings derived from this configuration.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            app_name: self.export.app_name.clone(),
            archive_extension: self.export.extension.clone(),
            notify_interval: Duration::from_millis(self.progress.notify_interval_ms),
        }
    }
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<AppConfig> {
    let path = config_path();

    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("EXARCH_").split("_"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;

    Ok(config)
}
