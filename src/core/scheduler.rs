// Refresh scheduler state machine
//
// Owns run state, interval, and the failure streak. The engine turns these
// decisions into timer operations.

use crate::core::config::clamp_interval;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// How a failed cycle should be surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSignal {
    /// Below threshold, still retrying.
    Transient { streak: u32 },
    /// Streak reached the threshold, source is likely down.
    Persistent { streak: u32 },
}

/// What the timer owner must do after a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// (Re)arm a periodic timer whose first tick fires immediately.
    Arm(Duration),
    Cancel,
    Keep,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    state: SchedulerState,
    interval: Duration,
    threshold: u32,
    failure_streak: u32,
}

impl Scheduler {
    pub fn new(interval: Duration, threshold: u32) -> Self {
        Self {
            state: SchedulerState::Idle,
            interval: clamp_interval(interval),
            threshold: threshold.max(1),
            failure_streak: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn start(&mut self, interval: Duration) -> TimerAction {
        if self.is_running() {
            return TimerAction::Keep;
        }
        self.interval = clamp_interval(interval);
        self.state = SchedulerState::Running;
        TimerAction::Arm(self.interval)
    }

    pub fn stop(&mut self) -> TimerAction {
        if !self.is_running() {
            return TimerAction::Keep;
        }
        self.state = SchedulerState::Stopped;
        TimerAction::Cancel
    }

    /// Restart semantics while running; otherwise only remembered.
    pub fn set_interval(&mut self, interval: Duration) -> TimerAction {
        if self.is_running() {
            self.stop();
            self.start(interval)
        } else {
            self.interval = clamp_interval(interval);
            TimerAction::Keep
        }
    }

    pub fn toggle(&mut self) -> TimerAction {
        if self.is_running() {
            self.stop()
        } else {
            self.start(self.interval)
        }
    }

    /// Returns true when this success ended a failure streak.
    pub fn record_success(&mut self) -> bool {
        let recovered = self.failure_streak > 0;
        self.failure_streak = 0;
        recovered
    }

    pub fn record_failure(&mut self) -> FailureSignal {
        self.failure_streak = self.failure_streak.saturating_add(1);
        if self.is_persistent_failure() {
            FailureSignal::Persistent {
                streak: self.failure_streak,
            }
        } else {
            FailureSignal::Transient {
                streak: self.failure_streak,
            }
        }
    }

    pub fn is_persistent_failure(&self) -> bool {
        self.failure_streak >= self.threshold
    }
}
