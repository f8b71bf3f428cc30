//! # DirectionTracker: timing evidence from the rangefinder.
//!
//! Fuses successive distance readings with the direction asserted by the frame
//! node and reports three kinds of evidence as [`PostureSignal`]s:
//!
//! - **top reached**: direction is `Up` and the reading is within tolerance of
//!   `baseline.top`. Reported once, then latched until the next flip to `Down`.
//! - **bottom reached**: direction is `Down` and the reading is within tolerance
//!   of `baseline.bottom`. Repeats while the body dwells there.
//! - **bad posture**: `consecutive_wrong_readings` readings in a row moved
//!   against the asserted direction by more than `direction_change_threshold`.
//!   Reported once per run of wrong readings.
//!
//! ## Per-sample flow
//! ```text
//! observe(sample)
//!   ├─ out of (min, max)     → discard (no counter effect)
//!   ├─ no previous reading   → store, no evidence yet
//!   ├─ Up   && !reached_top && |d - top|    ≤ tol → TopReached, latch
//!   ├─ Down &&                 |d - bottom| ≤ tol → BottomReached
//!   └─ diff = d - previous
//!        ├─ wrong way (> threshold against direction) → counter += 1
//!        │     └─ counter == N and run not reported   → BadPosture, counter = 0
//!        └─ otherwise                                 → counter = 0, run closed
//! ```
//!
//! The tracker never infers direction and never counts reps.

use std::time::Instant;

use crate::config::Config;
use crate::events::{Direction, PostureSignal};

use super::baseline::Baseline;

/// One distance reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    /// Distance in centimetres.
    pub value: f64,
    /// When the reading completed.
    pub at: Instant,
}

impl DistanceSample {
    /// Sample stamped with the current instant.
    pub fn now(value: f64) -> Self {
        Self {
            value,
            at: Instant::now(),
        }
    }
}

/// Asserted direction plus wrong-way counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionState {
    pub current: Direction,
    pub consecutive_wrong_down: u32,
    pub consecutive_wrong_up: u32,
}

/// Thresholds copied out of [`Config`].
#[derive(Debug, Clone, Copy)]
struct Limits {
    min_distance: f64,
    max_distance: f64,
    tolerance: f64,
    change_threshold: f64,
    wrong_readings: u32,
}

/// Session-scoped direction tracker, owned by the range loop.
#[derive(Debug, Clone)]
pub struct DirectionTracker {
    limits: Limits,
    baseline: Baseline,
    state: DirectionState,
    previous: Option<f64>,
    reached_top: bool,
    run_reported: bool,
}

impl DirectionTracker {
    /// Creates a tracker for one session. Direction starts as `Down`.
    pub fn new(baseline: Baseline, cfg: &Config) -> Self {
        Self {
            limits: Limits {
                min_distance: cfg.min_distance,
                max_distance: cfg.max_distance,
                tolerance: cfg.tolerance,
                change_threshold: cfg.direction_change_threshold,
                wrong_readings: cfg.consecutive_wrong_readings.max(1),
            },
            baseline,
            state: DirectionState::default(),
            previous: None,
            reached_top: false,
            run_reported: false,
        }
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn state(&self) -> DirectionState {
        self.state
    }

    /// True once "top reached" was reported since the last flip to `Down`.
    pub fn reached_top(&self) -> bool {
        self.reached_top
    }

    /// Applies a direction asserted by the frame node.
    ///
    /// Any change clears both wrong-way counters; `Down` also clears the top latch.
    /// Duplicate deliveries are harmless.
    pub fn set_direction(&mut self, dir: Direction) {
        if dir == Direction::Down {
            self.reached_top = false;
        }
        if dir != self.state.current {
            self.state = DirectionState {
                current: dir,
                ..DirectionState::default()
            };
            self.run_reported = false;
        }
    }

    /// Feeds one reading and returns the evidence it produced (possibly none).
    pub fn observe(&mut self, sample: DistanceSample) -> Vec<PostureSignal> {
        let mut out = Vec::new();
        let d = sample.value;
        if !(d > self.limits.min_distance && d < self.limits.max_distance) {
            return out;
        }
        let Some(previous) = self.previous.replace(d) else {
            return out;
        };

        let tol = self.limits.tolerance;
        match self.state.current {
            Direction::Up => {
                if !self.reached_top && (d - self.baseline.top).abs() <= tol {
                    self.reached_top = true;
                    out.push(PostureSignal::TopReached);
                }
            }
            Direction::Down => {
                if (d - self.baseline.bottom).abs() <= tol {
                    out.push(PostureSignal::BottomReached);
                }
            }
        }

        let diff = d - previous;
        let threshold = self.limits.change_threshold;
        let (wrong, counter) = match self.state.current {
            Direction::Down => (diff > threshold, &mut self.state.consecutive_wrong_down),
            Direction::Up => (diff < -threshold, &mut self.state.consecutive_wrong_up),
        };
        if wrong {
            *counter += 1;
            if *counter >= self.limits.wrong_readings {
                *counter = 0;
                if !self.run_reported {
                    self.run_reported = true;
                    out.push(PostureSignal::BadPosture);
                }
            }
        } else {
            *counter = 0;
            self.run_reported = false;
        }
        out
    }
}
