//! Application settings.
//!
//! Settings live in TOML next to the configs directory:
//!
//! - Linux: `~/.config/KeyLoop/settings.toml`
//! - macOS: `~/Library/Application Support/KeyLoop/settings.toml`
//! - Windows: `%APPDATA%\KeyLoop\settings.toml`
//!
//! `KEYLOOP_CONFIG_DIR` replaces the base directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backend::hotkeys::{Hotkey, DEFAULT_START, DEFAULT_STOP};
use crate::error::{Error, Result};
use crate::models::DEFAULT_DELAY;

/// Environment variable overriding the settings directory.
pub const CONFIG_DIR_ENV: &str = "KEYLOOP_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    pub start: String,
    pub stop: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            start: DEFAULT_START.to_string(),
            stop: DEFAULT_STOP.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where named configs are kept. Defaults to `<settings dir>/configs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configs_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Pause between passes, in milliseconds.
    pub pass_pause_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { pass_pause_ms: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Delay given to newly recorded events, in seconds.
    pub default_delay: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            default_delay: DEFAULT_DELAY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub hotkeys: HotkeyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

impl Settings {
    /// Base directory for settings and configs.
    pub fn config_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Settings("failed to determine config directory".into()))?
            .join("KeyLoop");
        Ok(dir)
    }

    pub fn settings_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("settings.toml"))
    }

    /// Loads settings from the default location, falling back to defaults when
    /// no file exists yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| Error::Settings(format!("{}: {e}", path.display())))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_file_path()?)
    }

    /// Writes through a temp file and a rename.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Settings(format!("failed to serialize settings: {e}")))?;

        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.hotkeys.start.parse::<Hotkey>()?;
        self.hotkeys.stop.parse::<Hotkey>()?;
        if !self.recorder.default_delay.is_finite() || self.recorder.default_delay <= 0.0 {
            return Err(Error::Settings(format!(
                "recorder.default_delay must be positive, got {}",
                self.recorder.default_delay
            )));
        }
        Ok(())
    }

    /// Directory of named configs.
    pub fn configs_dir(&self) -> Result<PathBuf> {
        match &self.storage.configs_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("configs")),
        }
    }

    pub fn pass_pause(&self) -> Duration {
        Duration::from_millis(self.playback.pass_pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.hotkeys.start, "F7");
        assert_eq!(settings.hotkeys.stop, "F8");
        assert_eq!(settings.pass_pause(), Duration::from_millis(200));
        assert_eq!(settings.recorder.default_delay, 0.1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&temp_dir.path().join("settings.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.hotkeys.start = "ctrl+f9".into();
        settings.storage.configs_dir = Some(temp_dir.path().join("macros"));
        settings.playback.pass_pause_ms = 50;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.configs_dir().unwrap(), temp_dir.path().join("macros"));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "[hotkeys]\nstart = \"f5\"\nstop = \"f6\"\n").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.hotkeys.start, "f5");
        assert_eq!(settings.playback, PlaybackConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = Settings::default();
        settings.hotkeys.stop = "".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.recorder.default_delay = 0.0;
        assert!(settings.validate().is_err());

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "[playback]\npass_pause_ms = \"soon\"\n").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(Error::Settings(_))));
    }
}
