//! User settings persisted in the store, and their startup loading.
//!
//! Settings live as one JSON object under [`StoreRefs::settings`]; the key
//! names are shared with other clients of the same store, hence the renames.
//! Cumulative work time lives under `{time_done}/{YYYY-MM-DD}/time_worked`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::storage::PersistenceStore;

pub const TIME_WORKED_KEY: &str = "time_worked";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub work_timer: u32,
    pub pause_timer: u32,
    pub daily_work_time_goal: u32,
    pub step_size: u32,
    #[serde(rename = "VOLUME")]
    pub volume: u32,
    #[serde(rename = "Hide Windows")]
    pub hide_windows: bool,
    #[serde(rename = "Spotify")]
    pub spotify: bool,
    #[serde(rename = "Home Assistant")]
    pub home_assistant: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_timer: 25,
            pause_timer: 5,
            daily_work_time_goal: 240,
            step_size: 5,
            volume: 50,
            hide_windows: false,
            spotify: false,
            home_assistant: false,
        }
    }
}

impl Settings {
    /// Clamp every numeric field into its valid range.
    pub fn normalized(mut self) -> Self {
        self.work_timer = clamp_duration(self.work_timer);
        self.pause_timer = clamp_duration(self.pause_timer);
        self.daily_work_time_goal = self.daily_work_time_goal.clamp(1, 1440);
        self.step_size = self.step_size.clamp(1, 60);
        self.volume = self.volume.min(100);
        self
    }

    pub fn feature(&self, feature: Feature) -> bool {
        match feature {
            Feature::HideWindows => self.hide_windows,
            Feature::Spotify => self.spotify,
            Feature::HomeAssistant => self.home_assistant,
        }
    }

    pub fn set_feature(&mut self, feature: Feature, enabled: bool) {
        match feature {
            Feature::HideWindows => self.hide_windows = enabled,
            Feature::Spotify => self.spotify = enabled,
            Feature::HomeAssistant => self.home_assistant = enabled,
        }
    }

    pub fn duration(&self, kind: TimerKind) -> u32 {
        match kind {
            TimerKind::Work => self.work_timer,
            TimerKind::Pause => self.pause_timer,
        }
    }

    pub fn set_duration(&mut self, kind: TimerKind, minutes: u32) {
        let minutes = clamp_duration(minutes);
        match kind {
            TimerKind::Work => self.work_timer = minutes,
            TimerKind::Pause => self.pause_timer = minutes,
        }
    }
}

pub const MIN_DURATION: u32 = 1;
pub const MAX_DURATION: u32 = 180;

pub fn clamp_duration(minutes: u32) -> u32 {
    minutes.clamp(MIN_DURATION, MAX_DURATION)
}

/// Optional behaviours the user toggles from the tray menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    HideWindows,
    Spotify,
    HomeAssistant,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::HideWindows, Feature::Spotify, Feature::HomeAssistant];

    /// Key in the persisted settings object; doubles as the menu label.
    pub fn key(&self) -> &'static str {
        match self {
            Feature::HideWindows => "Hide Windows",
            Feature::Spotify => "Spotify",
            Feature::HomeAssistant => "Home Assistant",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace([' ', '_'], "-").as_str() {
            "hide-windows" => Ok(Feature::HideWindows),
            "spotify" => Ok(Feature::Spotify),
            "home-assistant" => Ok(Feature::HomeAssistant),
            other => Err(format!("unknown feature: {other}")),
        }
    }
}

/// The two adjustable timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimerKind {
    Work,
    Pause,
}

impl TimerKind {
    pub fn key(&self) -> &'static str {
        match self {
            TimerKind::Work => "work_timer",
            TimerKind::Pause => "pause_timer",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimerKind::Work => "Work",
            TimerKind::Pause => "Pause",
        }
    }
}

/// Store paths used for settings and daily counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRefs {
    #[serde(default = "default_settings_ref")]
    pub settings: String,
    #[serde(default = "default_time_done_ref")]
    pub time_done: String,
}

fn default_settings_ref() -> String {
    "pomodoro/settings".into()
}
fn default_time_done_ref() -> String {
    "pomodoro/time_done".into()
}

impl Default for StoreRefs {
    fn default() -> Self {
        Self {
            settings: default_settings_ref(),
            time_done: default_time_done_ref(),
        }
    }
}

impl StoreRefs {
    /// Document holding the counters of one day.
    pub fn day(&self, date: NaiveDate) -> String {
        format!("{}/{}", self.time_done, date.format("%Y-%m-%d"))
    }

    pub fn time_worked(&self, date: NaiveDate) -> String {
        format!("{}/{TIME_WORKED_KEY}", self.day(date))
    }
}

/// Load settings from the store, falling back to `defaults`.
///
/// When nothing usable is stored (missing, not an object, or unreadable) the
/// defaults are written back so the next start finds them. A stored object
/// is never overwritten; fields with the wrong type fall back one by one.
pub fn load_settings(store: &dyn PersistenceStore, refs: &StoreRefs, defaults: &Settings) -> Settings {
    let reason = match stored_settings(store, refs, defaults) {
        Ok(settings) => return settings,
        Err(reason) => reason,
    };

    warn!(%reason, "can't load settings, using defaults");
    let defaults = defaults.clone().normalized();
    match serde_json::to_value(&defaults) {
        Ok(value) => {
            if let Err(e) = store.set(&refs.settings, value) {
                warn!(error = %e, "could not save default settings");
            }
        }
        Err(e) => warn!(error = %e, "could not encode default settings"),
    }
    defaults
}

/// Like [`load_settings`] but never writes to the store.
pub fn read_settings(store: &dyn PersistenceStore, refs: &StoreRefs, defaults: &Settings) -> Settings {
    stored_settings(store, refs, defaults).unwrap_or_else(|reason| {
        debug!(%reason, "no stored settings, using defaults");
        defaults.clone().normalized()
    })
}

fn stored_settings(
    store: &dyn PersistenceStore,
    refs: &StoreRefs,
    defaults: &Settings,
) -> Result<Settings, String> {
    match store.get(&refs.settings) {
        Ok(Some(Value::Object(stored))) => {
            let settings = decode_lenient(&stored, defaults);
            info!(?settings, "loaded settings from store");
            Ok(settings)
        }
        Ok(Some(other)) => Err(format!("settings document is not an object: {other}")),
        Ok(None) => Err("no settings stored yet".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

/// Overlay `stored` on `defaults` key by key, skipping values that do not
/// decode.
fn decode_lenient(stored: &Map<String, Value>, defaults: &Settings) -> Settings {
    let mut merged = match serde_json::to_value(defaults) {
        Ok(Value::Object(map)) => map,
        _ => return defaults.clone().normalized(),
    };
    for (key, value) in stored {
        if !merged.contains_key(key) {
            continue;
        }
        let mut candidate = merged.clone();
        candidate.insert(key.clone(), value.clone());
        if serde_json::from_value::<Settings>(Value::Object(candidate)).is_ok() {
            merged.insert(key.clone(), value.clone());
        } else {
            warn!(%key, %value, "ignoring stored setting with the wrong type");
        }
    }
    serde_json::from_value::<Settings>(Value::Object(merged))
        .unwrap_or_else(|_| defaults.clone())
        .normalized()
}

/// Load the minutes worked on `today`, or 0.
///
/// Other clients may store the counter as a float or a numeric string.
pub fn load_time_worked(store: &dyn PersistenceStore, refs: &StoreRefs, today: NaiveDate) -> u32 {
    let path = refs.time_worked(today);
    match store.get(&path) {
        Ok(Some(value)) => match minutes(&value) {
            Some(minutes) => minutes,
            None => {
                warn!(%path, %value, "time worked is not a number, starting at 0");
                0
            }
        },
        Ok(None) => 0,
        Err(e) => {
            warn!(%path, error = %e, "can't load time worked, starting at 0");
            0
        }
    }
}

fn minutes(value: &Value) -> Option<u32> {
    let minutes = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !minutes.is_finite() || minutes < 0.0 {
        return None;
    }
    // Truncating, saturating cast.
    Some(minutes as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn persisted_keys_match_shared_schema() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        for key in [
            "work_timer",
            "pause_timer",
            "daily_work_time_goal",
            "step_size",
            "VOLUME",
            "Hide Windows",
            "Spotify",
            "Home Assistant",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn partial_document_fills_defaults() {
        let store = MemoryStore::new();
        let refs = StoreRefs::default();
        store
            .set(&refs.settings, json!({"work_timer": 50, "Spotify": true}))
            .unwrap();

        let settings = load_settings(&store, &refs, &Settings::default());
        assert_eq!(settings.work_timer, 50);
        assert!(settings.spotify);
        assert_eq!(settings.pause_timer, 5);
    }

    #[test]
    fn mistyped_field_keeps_the_rest_and_the_store() {
        let store = MemoryStore::new();
        let refs = StoreRefs::default();
        let stored = json!({
            "work_timer": 50,
            "pause_timer": 10,
            "VOLUME": 0.8,
            "Hide Windows": true
        });
        store.set(&refs.settings, stored.clone()).unwrap();

        let settings = load_settings(&store, &refs, &Settings::default());
        assert_eq!(settings.work_timer, 50);
        assert_eq!(settings.pause_timer, 10);
        assert_eq!(settings.volume, 50);
        assert!(settings.hide_windows);
        assert_eq!(store.get(&refs.settings).unwrap(), Some(stored));
    }

    #[test]
    fn missing_keys_come_from_given_defaults() {
        let store = MemoryStore::new();
        let refs = StoreRefs::default();
        store.set(&refs.settings, json!({"step_size": 10})).unwrap();
        let defaults = Settings {
            daily_work_time_goal: 120,
            ..Settings::default()
        };
        let settings = load_settings(&store, &refs, &defaults);
        assert_eq!(settings.step_size, 10);
        assert_eq!(settings.daily_work_time_goal, 120);
    }

    #[test]
    fn read_settings_never_writes() {
        let store = MemoryStore::new();
        let refs = StoreRefs::default();
        let settings = read_settings(&store, &refs, &Settings::default());
        assert_eq!(settings, Settings::default());
        assert_eq!(store.get(&refs.settings).unwrap(), None);

        store.set(&refs.settings, json!([1, 2])).unwrap();
        read_settings(&store, &refs, &Settings::default());
        assert_eq!(store.get(&refs.settings).unwrap(), Some(json!([1, 2])));
    }

    #[test]
    fn non_object_falls_back_and_writes_defaults() {
        let store = MemoryStore::new();
        let refs = StoreRefs::default();
        store.set(&refs.settings, json!("garbage")).unwrap();

        let settings = load_settings(&store, &refs, &Settings::default());
        assert_eq!(settings, Settings::default());
        assert_eq!(
            store.get(&refs.settings).unwrap().unwrap()["work_timer"],
            json!(25)
        );
    }

    #[test]
    fn failing_store_yields_defaults() {
        let store = MemoryStore::failing();
        let settings = load_settings(&store, &StoreRefs::default(), &Settings::default());
        assert_eq!(settings, Settings::default());
        assert_eq!(
            load_time_worked(&store, &StoreRefs::default(), date("2024-03-01")),
            0
        );
    }

    #[test]
    fn time_worked_reads_todays_counter() {
        let store = MemoryStore::new();
        let refs = StoreRefs::default();
        store
            .update_field(&refs.day(date("2024-03-01")), TIME_WORKED_KEY, json!(42))
            .unwrap();
        assert_eq!(load_time_worked(&store, &refs, date("2024-03-01")), 42);
        assert_eq!(load_time_worked(&store, &refs, date("2024-03-02")), 0);
    }

    #[test]
    fn time_worked_accepts_float_and_string_counters() {
        let store = MemoryStore::new();
        let refs = StoreRefs::default();
        let day = date("2024-03-01");
        store.update_field(&refs.day(day), TIME_WORKED_KEY, json!(3.0)).unwrap();
        assert_eq!(load_time_worked(&store, &refs, day), 3);
        store.update_field(&refs.day(day), TIME_WORKED_KEY, json!(7.9)).unwrap();
        assert_eq!(load_time_worked(&store, &refs, day), 7);
        store.update_field(&refs.day(day), TIME_WORKED_KEY, json!("12")).unwrap();
        assert_eq!(load_time_worked(&store, &refs, day), 12);
        store.update_field(&refs.day(day), TIME_WORKED_KEY, json!(-4)).unwrap();
        assert_eq!(load_time_worked(&store, &refs, day), 0);
        store.update_field(&refs.day(day), TIME_WORKED_KEY, json!(true)).unwrap();
        assert_eq!(load_time_worked(&store, &refs, day), 0);
    }

    #[test]
    fn normalized_clamps_ranges() {
        let settings = Settings {
            work_timer: 0,
            pause_timer: 999,
            volume: 300,
            step_size: 0,
            ..Settings::default()
        }
        .normalized();
        assert_eq!(settings.work_timer, 1);
        assert_eq!(settings.pause_timer, 180);
        assert_eq!(settings.volume, 100);
        assert_eq!(settings.step_size, 1);
    }

    #[test]
    fn feature_parses_cli_names() {
        assert_eq!("hide-windows".parse::<Feature>(), Ok(Feature::HideWindows));
        assert_eq!("Home Assistant".parse::<Feature>(), Ok(Feature::HomeAssistant));
        assert!("lights".parse::<Feature>().is_err());
    }
}
