//! Backend health state machine.
//!
//! # States
//! - Healthy: backend is in the ring and receives traffic
//! - Unhealthy: backend is excluded from the ring (initial state)
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - The pool's flag is the source of truth for the current state; the
//!   tracker only counts streaks
//! - Counters reset on the opposite outcome and on transition
//! - Streaks are keyed by name and address, so entries sharing a name do not
//!   share a counter

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl From<bool> for HealthState {
    fn from(healthy: bool) -> Self {
        if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Streak {
    successes: u32,
    failures: u32,
}

/// Identifies one pool entry: its name and where it lives.
pub type EntryKey = (String, SocketAddr);

/// Consecutive check outcome counters, one per pool entry.
#[derive(Debug)]
pub struct HealthTracker {
    healthy_threshold: u32,
    unhealthy_threshold: u32,
    streaks: HashMap<EntryKey, Streak>,
}

impl HealthTracker {
    pub fn new(healthy_threshold: u32, unhealthy_threshold: u32) -> Self {
        Self {
            healthy_threshold: healthy_threshold.max(1),
            unhealthy_threshold: unhealthy_threshold.max(1),
            streaks: HashMap::new(),
        }
    }

    /// Record one check outcome for a backend currently in `current` state.
    ///
    /// Returns the state to move to when a threshold is crossed.
    pub fn record(
        &mut self,
        name: &str,
        addr: SocketAddr,
        current: HealthState,
        success: bool,
    ) -> Option<HealthState> {
        let streak = self.streaks.entry((name.to_string(), addr)).or_default();

        if success {
            streak.failures = 0;
            if current == HealthState::Healthy {
                streak.successes = 0;
                return None;
            }
            streak.successes += 1;
            if streak.successes >= self.healthy_threshold {
                streak.successes = 0;
                return Some(HealthState::Healthy);
            }
        } else {
            streak.successes = 0;
            if current == HealthState::Unhealthy {
                streak.failures = 0;
                return None;
            }
            streak.failures += 1;
            if streak.failures >= self.unhealthy_threshold {
                streak.failures = 0;
                return Some(HealthState::Unhealthy);
            }
        }
        None
    }

    /// Forget counters of entries that are no longer present.
    pub fn retain(&mut self, present: &HashSet<EntryKey>) {
        self.streaks.retain(|key, _| present.contains(key));
    }

    /// Forget every counter.
    pub fn reset(&mut self) {
        self.streaks.clear();
    }

    pub fn tracked(&self) -> usize {
        self.streaks.len()
    }
}
