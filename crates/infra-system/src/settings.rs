// File and environment backed settings
// Layered lookup: built-in defaults, then the user's config.toml, then
// QUOTAWATCH_* environment variables. Values are snapshotted at load.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{debug, warn};

use quotawatch_core::port::settings::SettingsProvider;
use quotawatch_core::{AppError, Result};

/// Inclusive clamp bounds for the warning threshold percent
const WARNING_THRESHOLD_MIN: u8 = 50;
const WARNING_THRESHOLD_MAX: u8 = 99;

#[derive(Debug, Clone, Deserialize)]
struct SettingsData {
    refresh_interval_secs: u64,
    power_aware_enabled: bool,
    reduce_on_battery: bool,
    notifications_enabled: bool,
    warning_enabled: bool,
    capacity_full_enabled: bool,
    reset_complete_enabled: bool,
    warning_threshold: u8,
}

impl Default for SettingsData {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
            power_aware_enabled: true,
            reduce_on_battery: true,
            notifications_enabled: true,
            warning_enabled: true,
            capacity_full_enabled: true,
            reset_complete_enabled: true,
            warning_threshold: 80,
        }
    }
}

/// Settings provider backed by `config.toml` and the process environment.
pub struct FileSettings {
    data: Mutex<SettingsData>,
}

impl FileSettings {
    /// Load from the default user config location plus `QUOTAWATCH_*` vars.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load with an explicit (optional) config file path.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let defaults = SettingsData::default();

        let mut builder = Config::builder()
            .set_default("refresh_interval_secs", defaults.refresh_interval_secs)
            .and_then(|b| b.set_default("power_aware_enabled", defaults.power_aware_enabled))
            .and_then(|b| b.set_default("reduce_on_battery", defaults.reduce_on_battery))
            .and_then(|b| b.set_default("notifications_enabled", defaults.notifications_enabled))
            .and_then(|b| b.set_default("warning_enabled", defaults.warning_enabled))
            .and_then(|b| b.set_default("capacity_full_enabled", defaults.capacity_full_enabled))
            .and_then(|b| b.set_default("reset_complete_enabled", defaults.reset_complete_enabled))
            .and_then(|b| b.set_default("warning_threshold", defaults.warning_threshold as i64))
            .map_err(config_error)?;

        if let Some(path) = config_path {
            debug!(path = %path.display(), "Loading settings file");
            builder = builder.add_source(File::from(path).required(false));
        }

        let config = builder
            .add_source(Environment::with_prefix("QUOTAWATCH"))
            .build()
            .map_err(config_error)?;

        let mut data: SettingsData = config
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("invalid settings: {}", e)))?;
        data.warning_threshold = clamp_threshold(data.warning_threshold);

        Ok(Self {
            data: Mutex::new(data),
        })
    }

    /// Re-read the config sources, keeping the current values on failure.
    pub fn reload(&self) -> Result<()> {
        let fresh = Self::load()?;
        let fresh = fresh.data.into_inner().unwrap();
        *self.data.lock().unwrap() = fresh;
        Ok(())
    }
}

fn config_error(e: config::ConfigError) -> AppError {
    AppError::Config(e.to_string())
}

fn clamp_threshold(value: u8) -> u8 {
    if !(WARNING_THRESHOLD_MIN..=WARNING_THRESHOLD_MAX).contains(&value) {
        warn!(
            value = value,
            "warning_threshold out of range, clamping to {}-{}",
            WARNING_THRESHOLD_MIN,
            WARNING_THRESHOLD_MAX
        );
    }
    value.clamp(WARNING_THRESHOLD_MIN, WARNING_THRESHOLD_MAX)
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "quotawatch", "Quotawatch")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl SettingsProvider for FileSettings {
    fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.data.lock().unwrap().refresh_interval_secs)
    }

    fn power_aware_enabled(&self) -> bool {
        self.data.lock().unwrap().power_aware_enabled
    }

    fn reduce_on_battery(&self) -> bool {
        self.data.lock().unwrap().reduce_on_battery
    }

    fn notifications_enabled(&self) -> bool {
        self.data.lock().unwrap().notifications_enabled
    }

    fn warning_enabled(&self) -> bool {
        self.data.lock().unwrap().warning_enabled
    }

    fn capacity_full_enabled(&self) -> bool {
        self.data.lock().unwrap().capacity_full_enabled
    }

    fn reset_complete_enabled(&self) -> bool {
        self.data.lock().unwrap().reset_complete_enabled
    }

    fn warning_threshold(&self) -> u8 {
        self.data.lock().unwrap().warning_threshold
    }
}
