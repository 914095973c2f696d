use crate::collaborators::PreferenceStore;
use crate::error::{CoreError, Result};
use crate::undo::UndoTiming;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CastawayConfig {
    #[serde(default)]
    pub undo: UndoConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoConfig {
    /// How long the "marked as played" message stays on screen
    #[serde(default = "default_feedback_window_ms")]
    pub feedback_window_ms: u64,
    /// Cleanup deadline as a percentage of the feedback window
    #[serde(default = "default_safety_margin_percent")]
    pub safety_margin_percent: u32,
}

const fn default_feedback_window_ms() -> u64 {
    2750
}

const fn default_safety_margin_percent() -> u32 {
    105
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            feedback_window_ms: default_feedback_window_ms(),
            safety_margin_percent: default_safety_margin_percent(),
        }
    }
}

impl UndoConfig {
    #[must_use]
    pub const fn timing(&self) -> UndoTiming {
        UndoTiming {
            feedback_window: Duration::from_millis(self.feedback_window_ms),
            safety_margin_percent: self.safety_margin_percent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Delete downloads once they have been played to the end
    #[serde(default)]
    pub auto_delete: bool,
    /// Playback within this many seconds of the end counts as finished
    #[serde(default = "default_smart_mark_as_played_secs")]
    pub smart_mark_as_played_secs: u64,
}

const fn default_smart_mark_as_played_secs() -> u64 {
    30
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            auto_delete: false,
            smart_mark_as_played_secs: default_smart_mark_as_played_secs(),
        }
    }
}

impl PreferenceStore for PlaybackConfig {
    fn auto_delete_on_completion(&self) -> bool {
        self.auto_delete
    }

    fn smart_mark_as_played_secs(&self) -> u64 {
        self.smart_mark_as_played_secs
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Sync service, e.g. "gpodder" or "nextcloud"
    #[serde(default)]
    pub provider: String,
}

impl SyncConfig {
    /// Whether episode actions should be queued for a sync service
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.enabled && !self.provider.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a file in the config directory
    #[serde(default)]
    pub enabled: bool,
}

impl CastawayConfig {
    /// Get the config file path (~/.config/castaway/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from the default location, writing a template on first run
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after creating the template, or an
    /// error if the file cannot be read, parsed or validated.
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_at(&Self::config_path())
    }

    /// Load config from `config_path`, writing a template if it does not exist
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigNotFound`] after creating the template, or an
    /// error if the file cannot be read, parsed or validated.
    pub fn load_or_create_at(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(config_path, CONFIG_TEMPLATE)?;

            return Err(CoreError::ConfigNotFound {
                path: config_path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(config_path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate config from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or a value is out of range.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.undo.feedback_window_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "undo.feedback_window_ms must be greater than 0".to_string(),
            });
        }
        if self.undo.safety_margin_percent < 100 {
            return Err(CoreError::ConfigInvalid {
                message: format!(
                    "undo.safety_margin_percent must be at least 100, got {}",
                    self.undo.safety_margin_percent
                ),
            });
        }
        if self.sync.enabled && self.sync.provider.trim().is_empty() {
            tracing::warn!("Sync is enabled but no provider is configured; episode actions will not be queued");
        }
        Ok(())
    }
}

const CONFIG_TEMPLATE: &str = r#"# Castaway Configuration
# ~/.config/castaway/config.toml

[undo]
# How long the undo message stays visible, in milliseconds
feedback_window_ms = 2750
# Cleanup runs this percentage of the window after the change (>= 100)
safety_margin_percent = 105

[playback]
# Delete downloaded files once an episode has been played to the end
auto_delete = false
# Playback within this many seconds of the end counts as finished
smart_mark_as_played_secs = 30

[sync]
# Queue play/new episode actions for a sync service
enabled = false
# "gpodder" or "nextcloud"
provider = ""

[logging]
# Also write logs to ~/.config/castaway/castaway.log
enabled = false
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = CastawayConfig::from_toml(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.undo.feedback_window_ms, 2750);
        assert_eq!(config.undo.safety_margin_percent, 105);
        assert!(!config.playback.auto_delete);
        assert_eq!(config.playback.smart_mark_as_played_secs, 30);
        assert!(!config.sync.is_connected());
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CastawayConfig::from_toml("").unwrap();
        assert_eq!(config.undo.timing(), UndoTiming::default());
    }

    #[test]
    fn test_sync_requires_provider() {
        let config = CastawayConfig::from_toml("[sync]\nenabled = true\n").unwrap();
        assert!(!config.sync.is_connected());

        let config = CastawayConfig::from_toml("[sync]\nenabled = true\nprovider = \"gpodder\"\n").unwrap();
        assert!(config.sync.is_connected());
    }

    #[test]
    fn test_rejects_short_margin() {
        let err = CastawayConfig::from_toml("[undo]\nsafety_margin_percent = 90\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = CastawayConfig::from_toml("[undo]\nfeedback_window_ms = 0\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_parse_error() {
        let err = CastawayConfig::from_toml("[undo\n").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParseError(_)));
    }

    #[test]
    fn test_playback_config_as_preferences() {
        let config = CastawayConfig::from_toml("[playback]\nauto_delete = true\nsmart_mark_as_played_secs = 10\n").unwrap();
        assert!(config.playback.auto_delete_on_completion());
        assert_eq!(config.playback.smart_mark_as_played_secs(), 10);
    }

    #[test]
    fn test_load_or_create_writes_template() {
        let dir = std::env::temp_dir().join(format!("castaway-config-{}", std::process::id()));
        let path = dir.join("config.toml");
        let _ = fs::remove_dir_all(&dir);

        let err = CastawayConfig::load_or_create_at(&path).unwrap_err();
        assert!(matches!(err, CoreError::ConfigNotFound { .. }));
        assert!(path.exists());

        let config = CastawayConfig::load_or_create_at(&path).unwrap();
        assert_eq!(config.undo.feedback_window_ms, 2750);

        let _ = fs::remove_dir_all(&dir);
    }
}
