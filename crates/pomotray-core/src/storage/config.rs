//! TOML-based application configuration.
//!
//! Holds everything that is static for a run:
//! - Store backend and document references
//! - Default settings used when the store has none
//! - State colors and Home Assistant webhooks
//! - Sound assets, playlists, habit name
//! - Countdown granularity and effect delays
//!
//! Configuration is stored at `~/.config/pomotray/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;
use crate::settings::{Settings, StoreRefs};
use crate::timer::StateStyles;

/// Which [`crate::storage::PersistenceStore`] to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Firebase when `FIREBASE_DB_URL` is set, local SQLite otherwise.
    Auto,
    Firebase,
    Local,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default)]
    pub refs: StoreRefs,
}

/// Sound assets played on transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundConfig {
    /// Played when a work block starts.
    #[serde(default)]
    pub start: Option<String>,
    /// Played when a work block ends.
    #[serde(default)]
    pub pause: Option<String>,
    /// Player program override (`paplay`/`afplay` by default).
    #[serde(default)]
    pub player: Option<String>,
}

/// Playlists and Spotify endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub work_playlist: String,
    /// Empty means "pause playback" during breaks.
    #[serde(default)]
    pub pause_playlist: String,
    #[serde(default = "default_spotify_api")]
    pub spotify_api_base: String,
    #[serde(default = "default_spotify_accounts")]
    pub spotify_accounts_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitConfig {
    #[serde(default = "default_habit_name")]
    pub name: String,
    #[serde(default = "default_checkin_value")]
    pub checkin_value: u32,
    #[serde(default = "default_ticktick_api")]
    pub api_base: String,
}

/// How a countdown minute is subdivided for cancellation polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_polls_per_minute")]
    pub polls_per_minute: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayConfig {
    #[serde(default = "default_hide_windows_ms")]
    pub hide_windows_ms: u64,
    #[serde(default = "default_pause_playlist_ms")]
    pub pause_playlist_ms: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomotray/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub default_settings: Settings,
    #[serde(default)]
    pub states: StateStyles,
    #[serde(default)]
    pub sounds: SoundConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub habit: HabitConfig,
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default)]
    pub delays: DelayConfig,
}

// Default functions
fn default_app_name() -> String {
    "Pomotray".into()
}
fn default_backend() -> StoreBackend {
    StoreBackend::Auto
}
fn default_spotify_api() -> String {
    "https://api.spotify.com".into()
}
fn default_spotify_accounts() -> String {
    "https://accounts.spotify.com".into()
}
fn default_habit_name() -> String {
    "Deep Work".into()
}
fn default_checkin_value() -> u32 {
    2
}
fn default_ticktick_api() -> String {
    "https://api.ticktick.com".into()
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_polls_per_minute() -> u32 {
    600
}
fn default_hide_windows_ms() -> u64 {
    500
}
fn default_pause_playlist_ms() -> u64 {
    1000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            refs: StoreRefs::default(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            work_playlist: String::new(),
            pause_playlist: String::new(),
            spotify_api_base: default_spotify_api(),
            spotify_accounts_base: default_spotify_accounts(),
        }
    }
}

impl Default for HabitConfig {
    fn default() -> Self {
        Self {
            name: default_habit_name(),
            checkin_value: default_checkin_value(),
            api_base: default_ticktick_api(),
        }
    }
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            polls_per_minute: default_polls_per_minute(),
        }
    }
}

impl CountdownConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            hide_windows_ms: default_hide_windows_ms(),
            pause_playlist_ms: default_pause_playlist_ms(),
        }
    }
}

impl DelayConfig {
    /// All delays zero.
    pub fn none() -> Self {
        Self {
            hide_windows_ms: 0,
            pause_playlist_ms: 0,
        }
    }

    pub fn hide_windows(&self) -> Duration {
        Duration::from_millis(self.hide_windows_ms)
    }

    pub fn pause_playlist(&self) -> Duration {
        Duration::from_millis(self.pause_playlist_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            store: StoreConfig::default(),
            default_settings: Settings::default(),
            states: StateStyles::default(),
            sounds: SoundConfig::default(),
            media: MediaConfig::default(),
            habit: HabitConfig::default(),
            countdown: CountdownConfig::default(),
            delays: DelayConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key in memory. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
