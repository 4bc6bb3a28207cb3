//! Pomodoro state machine.
//!
//! Pure and synchronous: no threads, no I/O, no clock. Every command
//! returns an [`Outcome`] listing the events it produced and the effects
//! the caller must carry out. One call to [`TimerMachine::tick`] is one
//! elapsed minute.
//!
//! ```text
//! STARTING -> READY -start-> WORK -0-> PAUSE -0-> READY   (goal not met)
//!                                            -0-> DONE    (goal met)
//!             WORK/PAUSE -stop-> READY
//! ```

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, info};

use super::effect::{Effect, Outcome, Sound, Tick};
use super::{StateStyles, TimerSession, TimerState};
use crate::error::ValidationError;
use crate::events::Event;
use crate::settings::{clamp_duration, Feature, Settings, StoreRefs, TimerKind, TIME_WORKED_KEY};
use crate::storage::{Config, DelayConfig};

/// Static inputs of the machine, taken from [`Config`] once.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    pub styles: StateStyles,
    pub refs: StoreRefs,
    pub work_playlist: String,
    pub pause_playlist: String,
    pub habit_name: String,
    pub checkin_value: u32,
    pub delays: DelayConfig,
}

impl MachineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            styles: config.states.clone(),
            refs: config.store.refs.clone(),
            work_playlist: config.media.work_playlist.clone(),
            pause_playlist: config.media.pause_playlist.clone(),
            habit_name: config.habit.name.clone(),
            checkin_value: config.habit.checkin_value,
            delays: config.delays,
        }
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone)]
pub struct TimerMachine {
    config: MachineConfig,
    settings: Settings,
    state: TimerState,
    remaining: u32,
    time_worked: u32,
    time_worked_date: NaiveDate,
    playback_available: bool,
}

impl TimerMachine {
    /// A machine in STARTING, showing `defaults` until [`TimerMachine::ready`].
    pub fn new(config: MachineConfig, defaults: Settings, today: NaiveDate) -> Self {
        let settings = defaults.normalized();
        Self {
            config,
            remaining: settings.work_timer,
            settings,
            state: TimerState::Starting,
            time_worked: 0,
            time_worked_date: today,
            playback_available: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn time_worked(&self) -> u32 {
        self.time_worked
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn styles(&self) -> &StateStyles {
        &self.config.styles
    }

    pub fn playback_available(&self) -> bool {
        self.playback_available
    }

    pub fn session(&self) -> TimerSession {
        TimerSession {
            state: self.state,
            current_timer_value: self.remaining,
            work_timer_duration: self.settings.work_timer,
            pause_timer_duration: self.settings.pause_timer,
            daily_work_time_goal: self.settings.daily_work_time_goal,
            time_worked: self.time_worked,
            time_worked_date: self.time_worked_date,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Whether a playback gateway exists. Without one the Spotify
    /// feature stays off and cannot be toggled on.
    pub fn set_playback_available(&mut self, available: bool) {
        self.playback_available = available;
        if !available {
            self.settings.spotify = false;
        }
    }

    /// Leave STARTING with the loaded settings and today's counter.
    pub fn ready(&mut self, settings: Settings, time_worked: u32, today: NaiveDate) -> Outcome {
        let mut out = Outcome::default();
        self.settings = settings.normalized();
        if !self.playback_available {
            self.settings.spotify = false;
        }
        self.time_worked = time_worked;
        self.time_worked_date = today;
        self.remaining = self.settings.work_timer;
        self.change_state(TimerState::Ready, &mut out);
        out
    }

    /// READY/DONE -> WORK.
    pub fn start(&mut self) -> Result<Outcome, ValidationError> {
        if !matches!(self.state, TimerState::Ready | TimerState::Done) {
            return Err(self.not_allowed("start"));
        }
        let mut out = Outcome::default();
        self.remaining = self.settings.work_timer;
        self.change_state(TimerState::Work, &mut out);
        out.event(Event::TimerStarted {
            duration_min: self.remaining,
            at: Utc::now(),
        });

        out.effect(Effect::PlaySound {
            sound: Sound::Start,
            volume: self.settings.volume,
        });
        if self.spotify_active() {
            out.effect(Effect::SwitchPlaylist {
                uri: playlist(&self.config.work_playlist),
                delay: Default::default(),
            });
        }
        self.push_webhook(&mut out);
        Ok(out)
    }

    /// Any state but READY/DONE -> READY, countdown back to the work duration.
    pub fn stop(&mut self) -> Result<Outcome, ValidationError> {
        if matches!(self.state, TimerState::Ready | TimerState::Done) {
            return Err(self.not_allowed("stop"));
        }
        let from = self.state;
        let mut out = Outcome::default();
        self.remaining = self.settings.work_timer;
        self.change_state(TimerState::Ready, &mut out);
        out.event(Event::TimerStopped {
            from,
            at: Utc::now(),
        });

        if self.spotify_active() {
            out.effect(Effect::SwitchPlaylist {
                uri: playlist(&self.config.pause_playlist),
                delay: Default::default(),
            });
        }
        self.push_webhook(&mut out);
        Ok(out)
    }

    /// Reset after the countdown observed a cancellation. Idempotent.
    pub fn cancel_countdown(&mut self) -> Outcome {
        let mut out = Outcome::default();
        self.remaining = self.settings.work_timer;
        if self.state != TimerState::Ready {
            self.change_state(TimerState::Ready, &mut out);
        }
        out
    }

    /// One minute elapsed.
    pub fn tick(&mut self, today: NaiveDate) -> Tick {
        if !self.state.is_counting() {
            return Tick::default();
        }
        let mut out = Outcome::default();
        self.remaining = self.remaining.saturating_sub(1);

        if self.state == TimerState::Work {
            self.increase_time_worked(today, &mut out);
        }
        debug!(state = %self.state, remaining = self.remaining, time_worked = self.time_worked, "minute elapsed");
        out.event(Event::MinuteElapsed {
            state: self.state,
            remaining_min: self.remaining,
            time_worked: self.time_worked,
            at: Utc::now(),
        });

        if self.remaining == 0 {
            self.switch_to_next_state(today, &mut out);
        }
        Tick {
            outcome: out,
            keep_running: self.state.is_counting(),
        }
    }

    /// Change a timer duration by `delta` minutes.
    ///
    /// The visible countdown follows only when `kind` is the active phase.
    pub fn adjust(&mut self, kind: TimerKind, delta: i32) -> Outcome {
        let mut out = Outcome::default();
        let old = self.settings.duration(kind);
        let new = clamp_duration(add_signed(old, delta));
        self.settings.set_duration(kind, new);

        let active = match kind {
            TimerKind::Work => self.state != TimerState::Pause,
            TimerKind::Pause => self.state == TimerState::Pause,
        };
        if active {
            let shifted = i64::from(self.remaining) + i64::from(new) - i64::from(old);
            self.remaining = u32::try_from(shifted.max(1)).unwrap_or(1);
        }
        info!(kind = kind.label(), duration = new, remaining = self.remaining, "timer duration adjusted");

        out.event(Event::DurationAdjusted {
            kind,
            duration_min: new,
            remaining_min: self.remaining,
            at: Utc::now(),
        });
        out.effect(Effect::Persist {
            path: self.config.refs.settings.clone(),
            key: kind.key().to_string(),
            value: json!(new),
        });
        out
    }

    /// Flip a feature flag and persist it.
    pub fn toggle(&mut self, feature: Feature) -> Result<Outcome, ValidationError> {
        let enabled = !self.settings.feature(feature);
        if feature == Feature::Spotify && enabled && !self.playback_available {
            return Err(ValidationError::FeatureUnavailable(feature.to_string()));
        }
        self.settings.set_feature(feature, enabled);
        info!(%feature, enabled, "feature toggled");

        let mut out = Outcome::default();
        out.event(Event::FeatureToggled {
            feature,
            enabled,
            at: Utc::now(),
        });
        out.effect(Effect::Persist {
            path: self.config.refs.settings.clone(),
            key: feature.key().to_string(),
            value: json!(enabled),
        });
        Ok(out)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn not_allowed(&self, command: &str) -> ValidationError {
        ValidationError::NotAllowed {
            command: command.to_string(),
            state: self.state.to_string(),
        }
    }

    fn spotify_active(&self) -> bool {
        self.settings.spotify && self.playback_available
    }

    fn change_state(&mut self, to: TimerState, out: &mut Outcome) {
        let from = self.state;
        self.state = to;
        info!(%from, %to, remaining = self.remaining, "state changed");
        out.event(Event::StateChanged {
            from,
            to,
            at: Utc::now(),
        });
    }

    /// Webhook of the current state, when Home Assistant is on.
    fn push_webhook(&self, out: &mut Outcome) {
        if !self.settings.home_assistant {
            return;
        }
        if let Some(url) = self.config.styles.webhook(self.state) {
            out.effect(Effect::Webhook {
                url: url.to_string(),
            });
        }
    }

    /// Minutes worked on `today`; a counter from another day counts as 0.
    fn worked_on(&self, today: NaiveDate) -> u32 {
        if self.time_worked_date == today {
            self.time_worked
        } else {
            0
        }
    }

    fn increase_time_worked(&mut self, today: NaiveDate, out: &mut Outcome) {
        if self.time_worked_date != today {
            info!(%today, "new day, resetting time worked");
            self.time_worked_date = today;
            self.time_worked = 1;
        } else {
            self.time_worked = self.time_worked.saturating_add(1);
        }
        out.effect(Effect::Persist {
            path: self.config.refs.day(today),
            key: TIME_WORKED_KEY.to_string(),
            value: json!(self.time_worked),
        });

        let goal = self.settings.daily_work_time_goal;
        if self.time_worked == goal {
            info!(goal, "daily work goal reached");
            out.event(Event::GoalReached {
                time_worked: self.time_worked,
                goal,
                at: Utc::now(),
            });
            out.effect(Effect::HabitCheckIn {
                habit: self.config.habit_name.clone(),
                date_stamp: today.format("%Y%m%d").to_string(),
                value: self.config.checkin_value,
            });
        }
    }

    fn switch_to_next_state(&mut self, today: NaiveDate, out: &mut Outcome) {
        match self.state {
            TimerState::Work => {
                self.remaining = self.settings.pause_timer;
                self.change_state(TimerState::Pause, out);
                out.effect(Effect::PlaySound {
                    sound: Sound::Pause,
                    volume: self.settings.volume,
                });
                if self.settings.hide_windows {
                    out.effect(Effect::MinimizeWindows {
                        delay: self.config.delays.hide_windows(),
                    });
                }
                if self.spotify_active() {
                    out.effect(Effect::SwitchPlaylist {
                        uri: playlist(&self.config.pause_playlist),
                        delay: self.config.delays.pause_playlist(),
                    });
                }
            }
            TimerState::Pause => {
                self.remaining = self.settings.work_timer;
                if self.worked_on(today) < self.settings.daily_work_time_goal {
                    self.change_state(TimerState::Ready, out);
                    if self.settings.hide_windows {
                        out.effect(Effect::RestoreWindows);
                    }
                } else {
                    self.change_state(TimerState::Done, out);
                }
            }
            _ => return,
        }
        self.push_webhook(out);
    }
}

fn playlist(uri: &str) -> Option<String> {
    let uri = uri.trim();
    (!uri.is_empty()).then(|| uri.to_string())
}

fn add_signed(value: u32, delta: i32) -> u32 {
    let sum = i64::from(value) + i64::from(delta);
    u32::try_from(sum.max(0)).unwrap_or(u32::MAX)
}
