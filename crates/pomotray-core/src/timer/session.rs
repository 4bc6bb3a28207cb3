use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::TimerState;

/// Snapshot of the running timer, as shown by `status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSession {
    pub state: TimerState,
    /// Remaining minutes of the current phase.
    pub current_timer_value: u32,
    pub work_timer_duration: u32,
    pub pause_timer_duration: u32,
    pub daily_work_time_goal: u32,
    pub time_worked: u32,
    pub time_worked_date: NaiveDate,
}

impl TimerSession {
    /// Completed work blocks, as shown in the menu.
    pub fn blocks_worked(&self) -> f64 {
        if self.work_timer_duration == 0 {
            return 0.0;
        }
        f64::from(self.time_worked) / f64::from(self.work_timer_duration)
    }

    pub fn goal_reached(&self) -> bool {
        self.time_worked >= self.daily_work_time_goal
    }
}
