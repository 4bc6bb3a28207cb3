//! Carries out [`Effect`]s on the configured gateways.
//!
//! Each gateway is optional: a missing one turns its effects into a debug
//! log line. Failures are logged and never reach the timer.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::playback::PlaybackDispatcher;
use super::traits::{HabitGateway, SoundGateway, WebhookGateway, WindowGateway};
use crate::storage::PersistenceStore;
use crate::timer::Effect;

/// Where the controller sends effects.
pub trait EffectsGateway: Send + Sync {
    fn apply(&self, effect: Effect);

    /// Whether playlist switches can be carried out.
    fn playback_available(&self) -> bool {
        false
    }

    /// Release background workers before exit.
    fn shutdown(&self) {}
}

#[derive(Default)]
pub struct Gateways {
    store: Option<Arc<dyn PersistenceStore>>,
    playback: Option<PlaybackDispatcher>,
    webhook: Option<Arc<dyn WebhookGateway>>,
    windows: Option<Arc<dyn WindowGateway>>,
    habits: Option<Arc<dyn HabitGateway>>,
    sound: Option<Arc<dyn SoundGateway>>,
}

impl Gateways {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Playlist switches go through `dispatcher`.
    pub fn with_playback(mut self, dispatcher: PlaybackDispatcher) -> Self {
        self.playback = Some(dispatcher);
        self
    }

    pub fn with_webhook(mut self, webhook: Arc<dyn WebhookGateway>) -> Self {
        self.webhook = Some(webhook);
        self
    }

    pub fn with_windows(mut self, windows: Arc<dyn WindowGateway>) -> Self {
        self.windows = Some(windows);
        self
    }

    pub fn with_habits(mut self, habits: Arc<dyn HabitGateway>) -> Self {
        self.habits = Some(habits);
        self
    }

    pub fn with_sound(mut self, sound: Arc<dyn SoundGateway>) -> Self {
        self.sound = Some(sound);
        self
    }

    fn minimize_after(&self, delay: Duration) {
        let Some(windows) = self.windows.clone() else {
            debug!("no window gateway, not minimizing");
            return;
        };
        let spawned = std::thread::Builder::new()
            .name("pomotray-windows".into())
            .spawn(move || {
                std::thread::sleep(delay);
                if let Err(e) = windows.minimize_open_windows() {
                    warn!(error = %e, "could not minimize windows");
                }
            });
        if let Err(e) = spawned {
            error!(error = %e, "could not spawn window thread");
        }
    }
}

impl EffectsGateway for Gateways {
    fn apply(&self, effect: Effect) {
        match effect {
            Effect::PlaySound { sound, volume } => match &self.sound {
                Some(player) => {
                    if let Err(e) = player.play(sound, volume) {
                        warn!(?sound, error = %e, "could not play sound");
                    }
                }
                None => debug!(?sound, "no sound gateway"),
            },
            Effect::SwitchPlaylist { uri, delay } => match &self.playback {
                Some(dispatcher) => dispatcher.submit(uri, delay),
                None => debug!(?uri, "no playback gateway"),
            },
            Effect::Webhook { url } => match &self.webhook {
                Some(webhook) => webhook.trigger(&url),
                None => debug!(%url, "no webhook gateway"),
            },
            Effect::MinimizeWindows { delay } => self.minimize_after(delay),
            Effect::RestoreWindows => match &self.windows {
                Some(windows) => {
                    if let Err(e) = windows.restore_windows() {
                        warn!(error = %e, "could not restore windows");
                    }
                }
                None => debug!("no window gateway, not restoring"),
            },
            Effect::HabitCheckIn {
                habit,
                date_stamp,
                value,
            } => match &self.habits {
                Some(habits) => {
                    if let Err(e) = habits.check_in(&habit, &date_stamp, value) {
                        warn!(%habit, error = %e, "could not check-in habit");
                    }
                }
                None => debug!(%habit, "no habit gateway"),
            },
            Effect::Persist { path, key, value } => match &self.store {
                Some(store) => {
                    if let Err(e) = store.update_field(&path, &key, value) {
                        warn!(%path, %key, error = %e, "could not persist value");
                    }
                }
                None => debug!(%path, %key, "no store"),
            },
        }
    }

    fn playback_available(&self) -> bool {
        self.playback.is_some()
    }

    fn shutdown(&self) {
        if let Some(dispatcher) = &self.playback {
            dispatcher.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::integrations::HttpExecutor;
    use crate::storage::{FirebaseStore, MemoryStore};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Habits {
        calls: Mutex<Vec<(String, String, u32)>>,
    }

    impl HabitGateway for Habits {
        fn check_in(&self, habit: &str, date_stamp: &str, value: u32) -> Result<(), GatewayError> {
            self.calls
                .lock()
                .unwrap()
                .push((habit.into(), date_stamp.into(), value));
            Err(GatewayError::HabitNotFound(habit.into()))
        }
    }

    #[test]
    fn persist_goes_to_store() {
        let store = Arc::new(MemoryStore::new());
        let gateways = Gateways::new().with_store(store.clone());
        gateways.apply(Effect::Persist {
            path: "pomodoro/settings".into(),
            key: "work_timer".into(),
            value: json!(30),
        });
        assert_eq!(
            store.get("pomodoro/settings/work_timer").unwrap(),
            Some(json!(30))
        );
    }

    #[test]
    fn persist_to_remote_store_from_worker_thread() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("PATCH", "/pomodoro/time_done/2024-06-01.json")
            .match_body(mockito::Matcher::Json(json!({"time_worked": 3})))
            .with_status(200)
            .with_body("{}")
            .create();
        let store = FirebaseStore::new(&server.url(), None, HttpExecutor::new().unwrap()).unwrap();
        let gateways = Arc::new(Gateways::new().with_store(Arc::new(store)));

        let worker = {
            let gateways = gateways.clone();
            std::thread::spawn(move || {
                gateways.apply(Effect::Persist {
                    path: "pomodoro/time_done/2024-06-01".into(),
                    key: "time_worked".into(),
                    value: json!(3),
                });
            })
        };
        assert!(worker.join().is_ok());
        mock.assert();
    }

    #[test]
    fn failures_are_swallowed() {
        let habits = Arc::new(Habits::default());
        let gateways = Gateways::new()
            .with_store(Arc::new(MemoryStore::failing()))
            .with_habits(habits.clone());
        gateways.apply(Effect::Persist {
            path: "a".into(),
            key: "b".into(),
            value: json!(1),
        });
        gateways.apply(Effect::HabitCheckIn {
            habit: "Deep Work".into(),
            date_stamp: "20240601".into(),
            value: 2,
        });
        assert_eq!(habits.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn missing_gateways_are_noops() {
        let gateways = Gateways::new();
        assert!(!gateways.playback_available());
        gateways.apply(Effect::RestoreWindows);
        gateways.apply(Effect::SwitchPlaylist {
            uri: None,
            delay: Duration::ZERO,
        });
        gateways.shutdown();
    }
}
