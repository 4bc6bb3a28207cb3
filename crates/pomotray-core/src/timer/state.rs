//! Timer states and their static display/webhook table.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimerState {
    /// Waiting for the user to start a work block.
    Ready,
    Work,
    Pause,
    /// Daily goal reached after a pause; nothing runs automatically anymore.
    Done,
    /// Settings are still loading.
    Starting,
}

impl TimerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerState::Ready => "READY",
            TimerState::Work => "WORK",
            TimerState::Pause => "PAUSE",
            TimerState::Done => "DONE",
            TimerState::Starting => "STARTING",
        }
    }

    /// Whether a countdown is running in this state.
    pub fn is_counting(&self) -> bool {
        matches!(self, TimerState::Work | TimerState::Pause)
    }

    /// States the icon shows as a solid marker instead of a number.
    pub fn shows_marker(&self) -> bool {
        matches!(self, TimerState::Done | TimerState::Starting)
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display color and optional webhook of one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStyle {
    pub color: String,
    #[serde(default)]
    pub webhook: Option<String>,
}

impl StateStyle {
    fn new(color: &str) -> Self {
        Self {
            color: color.to_string(),
            webhook: None,
        }
    }
}

/// Lookup table from state to [`StateStyle`]. Loaded once from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStyles {
    #[serde(default = "default_ready")]
    pub ready: StateStyle,
    #[serde(default = "default_work")]
    pub work: StateStyle,
    #[serde(default = "default_pause")]
    pub pause: StateStyle,
    #[serde(default = "default_done")]
    pub done: StateStyle,
    #[serde(default = "default_starting")]
    pub starting: StateStyle,
}

fn default_ready() -> StateStyle {
    StateStyle::new("#2ecc71")
}
fn default_work() -> StateStyle {
    StateStyle::new("#e74c3c")
}
fn default_pause() -> StateStyle {
    StateStyle::new("#3498db")
}
fn default_done() -> StateStyle {
    StateStyle::new("#f1c40f")
}
fn default_starting() -> StateStyle {
    StateStyle::new("#95a5a6")
}

impl Default for StateStyles {
    fn default() -> Self {
        Self {
            ready: default_ready(),
            work: default_work(),
            pause: default_pause(),
            done: default_done(),
            starting: default_starting(),
        }
    }
}

impl StateStyles {
    pub fn get(&self, state: TimerState) -> &StateStyle {
        match state {
            TimerState::Ready => &self.ready,
            TimerState::Work => &self.work,
            TimerState::Pause => &self.pause,
            TimerState::Done => &self.done,
            TimerState::Starting => &self.starting,
        }
    }

    pub fn color(&self, state: TimerState) -> &str {
        &self.get(state).color
    }

    /// Webhook URL of a state; blank entries count as absent.
    pub fn webhook(&self, state: TimerState) -> Option<&str> {
        self.get(state)
            .webhook
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_webhook_is_absent() {
        let mut styles = StateStyles::default();
        styles.work.webhook = Some("   ".into());
        styles.ready.webhook = Some("http://ha.local/api/webhook/ready".into());
        assert_eq!(styles.webhook(TimerState::Work), None);
        assert_eq!(
            styles.webhook(TimerState::Ready),
            Some("http://ha.local/api/webhook/ready")
        );
    }

    #[test]
    fn serializes_uppercase() {
        let json = serde_json::to_string(&TimerState::Pause).unwrap();
        assert_eq!(json, "\"PAUSE\"");
        assert_eq!(TimerState::Done.to_string(), "DONE");
    }

    #[test]
    fn only_work_and_pause_count() {
        assert!(TimerState::Work.is_counting());
        assert!(TimerState::Pause.is_counting());
        assert!(!TimerState::Ready.is_counting());
        assert!(!TimerState::Done.is_counting());
        assert!(TimerState::Starting.shows_marker());
    }
}
