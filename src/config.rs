//! Agent settings.
//!
//! A small JSON file under the user config directory. The pipeline only
//! reads these flags; mutating them is the settings UI's job (external
//! to this core).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How browser activity is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityPreference {
    /// Report the full URL.
    FullUrl,
    /// Report only the host (domain).
    Domain,
}

/// Agent settings, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whether the "today" total is shown in the status bar.
    pub status_bar_enabled: bool,

    /// Whether the update coordinator may check for updates.
    pub auto_update_enabled: bool,

    /// Domain-vs-full-URL preference for browser entities.
    pub entity_preference: EntityPreference,

    /// Verbose logging.
    pub debug: bool,

    /// Mirror logs to a file under the config directory.
    pub log_to_file: bool,

    /// Override for the collector binary path. Defaults to
    /// `~/.wakatime/wakatime-cli`.
    pub cli_path: Option<PathBuf>,

    /// Per-app monitoring toggles, keyed by catalog id (or executable
    /// base name for apps the catalog does not know).
    #[serde(default)]
    pub monitored_apps: HashMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            status_bar_enabled: true,
            auto_update_enabled: true,
            entity_preference: EntityPreference::FullUrl,
            debug: false,
            log_to_file: false,
            cli_path: None,
            monitored_apps: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from the default location, or defaults when the
    /// file does not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::settings_path();
        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let settings: Settings = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::settings_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Path to the settings file.
    pub fn settings_path() -> PathBuf {
        config_dir().join("settings.json")
    }

    /// Path to the log file used when `log_to_file` is set.
    pub fn log_path() -> PathBuf {
        config_dir().join("waka-agent.log")
    }

    /// Resolved collector binary path.
    pub fn resolve_cli_path(&self) -> PathBuf {
        if let Some(path) = &self.cli_path {
            return path.clone();
        }
        let cli = if cfg!(windows) {
            "wakatime-cli.exe"
        } else {
            "wakatime-cli"
        };
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wakatime")
            .join(cli)
    }
}

/// Directory holding the settings file and app catalog.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("waka-agent")
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.status_bar_enabled);
        assert!(settings.auto_update_enabled);
        assert_eq!(settings.entity_preference, EntityPreference::FullUrl);
        assert!(!settings.debug);
        assert!(settings.monitored_apps.is_empty());
    }

    #[test]
    fn test_cli_path_override_wins() {
        let settings = Settings {
            cli_path: Some(PathBuf::from("/opt/wakatime/wakatime-cli")),
            ..Settings::default()
        };
        assert_eq!(
            settings.resolve_cli_path(),
            PathBuf::from("/opt/wakatime/wakatime-cli")
        );
    }

    #[test]
    fn test_settings_round_trip_json() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entity_preference, settings.entity_preference);
        assert_eq!(back.status_bar_enabled, settings.status_bar_enabled);
    }
}
