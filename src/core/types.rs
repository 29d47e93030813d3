//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Unique identifier for agents
///
/// Assigned sequentially at scenario load, so sorting by id reproduces
/// the load order. That order is the stable iteration order the scheduler
/// and run record rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Simulation tick counter (discrete time unit)
pub type Tick = u64;

/// A point in simulated wall-clock time
///
/// The model runs in scenario-local time with a fixed number of minutes
/// per tick. Day rollover is detected by the scheduler when the hour wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTime {
    pub hour: u32,
    pub minute: u32,
}

impl ModelTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        debug_assert!(hour < 24 && minute < 60);
        Self { hour, minute }
    }

    /// Returns a new time `n` minutes later, wrapping at midnight.
    ///
    /// `n` is assumed to be less than 60 (one step never spans more
    /// than an hour boundary plus change).
    pub fn n_mins_from_now(&self, n: u32) -> Self {
        let mut hour = self.hour;
        let mut minute = self.minute + n;
        if minute >= 60 {
            minute -= 60;
            hour += 1;
            if hour == 24 {
                hour = 0;
            }
        }
        Self { hour, minute }
    }

    /// Minutes from this time forward to `end`, wrapping past midnight.
    pub fn time_to(&self, end: &ModelTime) -> u32 {
        if end.hour < self.hour || (end.hour == self.hour && end.minute < self.minute) {
            let before_midnight = 60 * (23 - self.hour) + (60 - self.minute);
            let after_midnight = 60 * end.hour + end.minute;
            before_midnight + after_midnight
        } else {
            60 * (end.hour - self.hour) + (end.minute - self.minute)
        }
    }
}

impl std::fmt::Display for ModelTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}
