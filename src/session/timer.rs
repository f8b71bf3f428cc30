//! # SessionTimer: fixed session budget.
//!
//! Started on the transition into the first descent. Elapsed and remaining time
//! are computed from the wall-clock delta on every poll, so a poll may come from
//! a frame, a bus event or a bare tick. Expiry is reported **once**: every later
//! poll returns [`TimerPoll::Spent`] until the timer is restarted.

use std::time::{Duration, Instant};

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPoll {
    /// Not started.
    Idle,
    /// Budget not used up yet.
    Running { remaining: Duration },
    /// Budget used up; returned exactly once per start.
    Expired,
    /// Expiry already reported.
    Spent,
}

#[derive(Debug, Clone)]
pub struct SessionTimer {
    budget: Duration,
    started: Option<Instant>,
    fired: bool,
}

impl SessionTimer {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            started: None,
            fired: false,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// (Re)starts the budget at `now`.
    pub fn start(&mut self, now: Instant) {
        self.started = Some(now);
        self.fired = false;
    }

    /// Back to idle.
    pub fn stop(&mut self) {
        self.started = None;
        self.fired = false;
    }

    /// Started and not yet expired.
    pub fn is_running(&self) -> bool {
        self.started.is_some() && !self.fired
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.started
            .map(|s| now.saturating_duration_since(s))
            .unwrap_or_default()
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.started {
            Some(_) => self.budget.saturating_sub(self.elapsed(now)),
            None => self.budget,
        }
    }

    pub fn poll(&mut self, now: Instant) -> TimerPoll {
        if self.started.is_none() {
            return TimerPoll::Idle;
        }
        if self.fired {
            return TimerPoll::Spent;
        }
        let remaining = self.remaining(now);
        if remaining.is_zero() {
            self.fired = true;
            TimerPoll::Expired
        } else {
            TimerPoll::Running { remaining }
        }
    }
}
