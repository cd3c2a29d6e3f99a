use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::platform::OsVersion;
use crate::schedule::{DailyWindow, ScheduleTemplate};
use crate::store::StoreSettings;

/// Example configuration written by `app-limiter init`
pub const EXAMPLE_CONFIG: &str = r#"# App Limiter configuration

[storage]
# Directory holding the persisted selections (defaults to a platform location)
# dir = "/var/lib/app-limiter"

[platform]
# Directory the shield and monitoring documents are written to
# managed_dir = "/etc/app-limiter/managed"
# Refuse to run on hosts older than this version
# minimum_version = "16.0"
# Version reported by this host, required when minimum_version is set
# os_version = "16.2"

[schedule]
activity = "daily"
event = "encouraged"
start = "15:08"
end = "16:08"
repeats = false
threshold_secs = 60
# Keep monitoring running even when nothing is selected
monitor_empty_selection = false

[services]
timeout_secs = 10

[logging]
level = "info"
"#;

/// App limiter configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LimiterConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where selections are persisted
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Host platform settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlatformConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub managed_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_version: Option<OsVersion>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<OsVersion>,
}

/// Monitoring schedule settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_activity")]
    pub activity: String,

    #[serde(default = "default_event")]
    pub event: String,

    /// Window start, "HH:MM"
    #[serde(default = "default_start")]
    pub start: String,

    /// Window end, "HH:MM"
    #[serde(default = "default_end")]
    pub end: String,

    #[serde(default)]
    pub repeats: bool,

    #[serde(default = "default_threshold_secs")]
    pub threshold_secs: u64,

    #[serde(default)]
    pub monitor_empty_selection: bool,
}

/// OS service call settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_activity() -> String {
    "daily".to_string()
}

fn default_event() -> String {
    "encouraged".to_string()
}

fn default_start() -> String {
    "15:08".to_string()
}

fn default_end() -> String {
    "16:08".to_string()
}

fn default_threshold_secs() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            activity: default_activity(),
            event: default_event(),
            start: default_start(),
            end: default_end(),
            repeats: false,
            threshold_secs: default_threshold_secs(),
            monitor_empty_selection: false,
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ScheduleConfig {
    /// Parse the configured window and threshold
    pub fn template(&self) -> Result<ScheduleTemplate> {
        let start = parse_time_of_day(&self.start).context("Invalid schedule start")?;
        let end = parse_time_of_day(&self.end).context("Invalid schedule end")?;

        Ok(ScheduleTemplate {
            activity: self.activity.clone(),
            event: self.event.clone(),
            window: DailyWindow {
                start,
                end,
                repeats: self.repeats,
            },
            threshold: Duration::from_secs(self.threshold_secs),
        })
    }
}

impl LimiterConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: LimiterConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        crate::storage::atomic_write(path, content.as_bytes())
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let template = self.schedule.template()?;

        if template.window.start >= template.window.end {
            anyhow::bail!(
                "Schedule start ({}) must be before end ({})",
                self.schedule.start,
                self.schedule.end
            );
        }

        if self.schedule.activity.trim().is_empty() {
            anyhow::bail!("Schedule activity name cannot be empty");
        }

        if self.schedule.event.trim().is_empty() {
            anyhow::bail!("Schedule event name cannot be empty");
        }

        if self.schedule.threshold_secs == 0 {
            anyhow::bail!("Usage threshold must be at least 1 second");
        }

        if self.services.timeout_secs == 0 {
            anyhow::bail!("Service timeout must be at least 1 second");
        }

        if self.platform.minimum_version.is_some() && self.platform.os_version.is_none() {
            tracing::warn!("minimum_version is set without os_version; the host will be treated as unsupported");
        }

        Ok(())
    }

    /// Settings for the restriction policy store
    pub fn store_settings(&self) -> Result<StoreSettings> {
        Ok(StoreSettings {
            template: self.schedule.template()?,
            service_timeout: Duration::from_secs(self.services.timeout_secs),
            monitor_empty_selection: self.schedule.monitor_empty_selection,
        })
    }

    /// Resolve the storage directory
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage.dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::platform::default_storage_dir(),
        }
    }

    /// Resolve the managed settings directory
    pub fn managed_dir(&self) -> Result<PathBuf> {
        match &self.platform.managed_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::platform::default_managed_dir(),
        }
    }
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("Expected HH:MM, got '{}'", value))
}

/// Get the platform-specific config file path
pub fn get_config_path() -> Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        Ok(PathBuf::from("/etc/app-limiter/app-limiter.toml"))
    }

    #[cfg(target_os = "macos")]
    {
        Ok(PathBuf::from(
            "/Library/Application Support/app-limiter/app-limiter.toml",
        ))
    }

    #[cfg(target_os = "windows")]
    {
        let mut path = PathBuf::from(
            std::env::var("ProgramData")
                .unwrap_or_else(|_| "C:\\ProgramData".to_string()),
        );
        path.push("app-limiter");
        path.push("app-limiter.toml");
        Ok(path)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        anyhow::bail!("Unsupported operating system");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_parses_to_defaults() {
        let config: LimiterConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        config.validate().unwrap();

        let template = config.schedule.template().unwrap();
        assert_eq!(template, ScheduleTemplate::default());
        assert_eq!(config.services.timeout_secs, 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.storage.dir.is_none());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: LimiterConfig = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.schedule.threshold_secs, 60);
        assert!(!config.schedule.monitor_empty_selection);
    }

    #[test]
    fn platform_versions_parse() {
        let config: LimiterConfig = toml::from_str(
            r#"
            [platform]
            minimum_version = "16.0"
            os_version = "17.1"
            "#,
        )
        .unwrap();
        assert_eq!(config.platform.minimum_version, Some(OsVersion::new(16, 0)));
        assert_eq!(config.platform.os_version, Some(OsVersion::new(17, 1)));
    }

    #[test]
    fn rejects_inverted_window() {
        let mut config = LimiterConfig::default();
        config.schedule.start = "17:00".to_string();
        config.schedule.end = "09:00".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_time() {
        let mut config = LimiterConfig::default();
        config.schedule.start = "3pm".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_threshold_and_timeout() {
        let mut config = LimiterConfig::default();
        config.schedule.threshold_secs = 0;
        assert!(config.validate().is_err());

        let mut config = LimiterConfig::default();
        config.services.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn store_settings_follow_config() {
        let mut config = LimiterConfig::default();
        config.services.timeout_secs = 3;
        config.schedule.monitor_empty_selection = true;
        config.schedule.threshold_secs = 120;

        let settings = config.store_settings().unwrap();
        assert_eq!(settings.service_timeout, Duration::from_secs(3));
        assert!(settings.monitor_empty_selection);
        assert_eq!(settings.template.threshold, Duration::from_secs(120));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("app-limiter.toml");

        let mut config = LimiterConfig::default();
        config.storage.dir = Some(temp.path().join("state"));
        config.schedule.start = "08:30".to_string();
        config.save(&path).unwrap();

        let loaded = LimiterConfig::load(&path).unwrap();
        assert_eq!(loaded.storage.dir, config.storage.dir);
        assert_eq!(loaded.schedule.start, "08:30");
        assert_eq!(loaded.storage_dir().unwrap(), temp.path().join("state"));
    }

    #[test]
    fn load_or_default_without_file() {
        let temp = tempfile::tempdir().unwrap();
        let config = LimiterConfig::load_or_default(&temp.path().join("missing.toml")).unwrap();
        assert_eq!(config.schedule.activity, "daily");
    }
}
