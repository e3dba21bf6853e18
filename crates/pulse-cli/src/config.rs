//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
///
/// The day-count defaults describe daily activity windows with a seven-day
/// churn horizon; `pulse run` flags override them per invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Behavior label that counts as activity.
    pub behavior: String,
    pub active_window: i64,
    pub retention_base_period: i64,
    pub retention_target_period: i64,
    pub churn_threshold: i64,
    pub return_churn_period: i64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("pulse.db"),
            behavior: "login".to_string(),
            active_window: 1,
            retention_base_period: 1,
            retention_target_period: 1,
            churn_threshold: 7,
            return_churn_period: 7,
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (PULSE_*)
        figment = figment.merge(Env::prefixed("PULSE_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for pulse.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pulse"))
}

/// Returns the platform-specific data directory for pulse.
///
/// On Linux: `~/.local/share/pulse`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("pulse"))
}
