use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::{Feature, TimerKind};
use crate::timer::TimerState;

/// Every state change in the system produces an Event.
/// The tray host receives them through `TrayHost::notify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        duration_min: u32,
        at: DateTime<Utc>,
    },
    /// Manual stop; the countdown is back at the work duration.
    TimerStopped {
        from: TimerState,
        at: DateTime<Utc>,
    },
    MinuteElapsed {
        state: TimerState,
        remaining_min: u32,
        time_worked: u32,
        at: DateTime<Utc>,
    },
    StateChanged {
        from: TimerState,
        to: TimerState,
        at: DateTime<Utc>,
    },
    /// The minute that made `time_worked` equal the daily goal.
    GoalReached {
        time_worked: u32,
        goal: u32,
        at: DateTime<Utc>,
    },
    DurationAdjusted {
        kind: TimerKind,
        duration_min: u32,
        remaining_min: u32,
        at: DateTime<Utc>,
    },
    FeatureToggled {
        feature: Feature,
        enabled: bool,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Short name, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerStopped { .. } => "timer_stopped",
            Event::MinuteElapsed { .. } => "minute_elapsed",
            Event::StateChanged { .. } => "state_changed",
            Event::GoalReached { .. } => "goal_reached",
            Event::DurationAdjusted { .. } => "duration_adjusted",
            Event::FeatureToggled { .. } => "feature_toggled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::StateChanged {
            from: TimerState::Work,
            to: TimerState::Pause,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "StateChanged");
        assert_eq!(json["from"], "WORK");
        assert_eq!(json["to"], "PAUSE");
        assert_eq!(event.kind(), "state_changed");
    }
}
