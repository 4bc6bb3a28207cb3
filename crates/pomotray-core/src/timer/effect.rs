//! Side-effect requests produced by [`super::TimerMachine`].

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::events::Event;

/// Which configured sound asset to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sound {
    Start,
    Pause,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    PlaySound {
        sound: Sound,
        volume: u32,
    },
    /// `None` pauses playback.
    SwitchPlaylist {
        uri: Option<String>,
        delay: Duration,
    },
    Webhook {
        url: String,
    },
    MinimizeWindows {
        delay: Duration,
    },
    RestoreWindows,
    HabitCheckIn {
        habit: String,
        /// `YYYYMMDD`
        date_stamp: String,
        value: u32,
    },
    /// `update_field(path, key, value)` on the persistence store.
    Persist {
        path: String,
        key: String,
        value: Value,
    },
}

/// What an operation on the machine asks the outside world to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub events: Vec<Event>,
    pub effects: Vec<Effect>,
}

impl Outcome {
    pub(crate) fn event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub(crate) fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.effects.is_empty()
    }
}

/// Result of one elapsed minute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tick {
    pub outcome: Outcome,
    /// False once the machine left WORK/PAUSE; the countdown loop ends.
    pub keep_running: bool,
}
