//! # Global device configuration.
//!
//! Provides [`Config`] centralized thresholds and timings for both sampling loops.
//!
//! Config is used in three places:
//! 1. **Range loop**: distance bounds, tolerance, debounce, calibration limits.
//! 2. **Frame loop**: posture thresholds, ready dwell, presence debounce, session budget.
//! 3. **Runtime**: bus capacity, delivery quality, reconnect and persistence retry.
//!
//! ## Sentinel values
//! - `max_reconnects = 0` → retry the bus link forever
//! - `max_persist_attempts = 0` → clamped to a single attempt
//!
//! Units: distances are centimetres, angles are degrees.

use std::time::Duration;

use crate::events::QualityLevel;
use crate::policies::{BackoffPolicy, JitterPolicy};

/// Which evidence is allowed to end the descent of an attempt.
///
/// Both the elbow angle (frame loop) and the "Bottom reached" signal (range loop)
/// can arrive first; the policy makes the winner explicit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlipPolicy {
    /// Whichever arrives first flips the direction: an elbow at or below
    /// [`Config::bottom_elbow`], or a bottom signal while the last known elbow is
    /// at or below it.
    #[default]
    FirstEvidence,
    /// Both are required: a latched bottom signal **and** an elbow at or below
    /// [`Config::bottom_elbow`], in either arrival order.
    RequireBottom,
}

/// Global configuration for the rep-counting device.
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks across the loops.
#[derive(Clone, Debug)]
pub struct Config {
    // ---- range evidence ----
    /// Readings at or below this value are physically invalid and discarded.
    pub min_distance: f64,
    /// Readings at or above this value are physically invalid and discarded.
    pub max_distance: f64,
    /// Max distance from a baseline reference that still counts as "reached".
    pub tolerance: f64,
    /// Minimum step between two readings that counts as movement.
    pub direction_change_threshold: f64,
    /// Consecutive wrong-way readings required before reporting bad posture.
    pub consecutive_wrong_readings: u32,
    /// Bottom calibration only accepts readings below this value.
    pub bottom_calibration_ceiling: f64,
    /// Cadence of the range sampling loop while monitoring.
    pub sample_interval: Duration,
    /// Pause between polls when a calibration reading did not qualify.
    pub invalid_retry_interval: Duration,
    /// Upper bound for a single hardware round-trip.
    pub sensor_timeout: Duration,
    /// Upper bound for one calibration phase.
    pub calibration_timeout: Duration,

    // ---- pose evidence ----
    /// Elbow angle above which the arms count as extended.
    pub extended_elbow: f64,
    /// Shoulder angle above which the ready posture is accepted.
    pub extended_shoulder: f64,
    /// Hip angle above which the body counts as straight in the ready posture.
    pub extended_hip: f64,
    /// Elbow angle at or below which the descent is deep enough.
    pub bottom_elbow: f64,
    /// Inclusive hip range `[low, high]` considered a straight back.
    pub hip_range: (f64, f64),
    /// How long the ready posture must be held before a session starts.
    pub ready_dwell: Duration,
    /// Consecutive frames with a user required to report presence.
    pub presence_frames: u32,
    /// Consecutive frames without a user required to report its loss.
    pub absence_frames: u32,
    /// Descent resolution policy.
    pub flip_policy: FlipPolicy,

    // ---- session ----
    /// Fixed session budget, measured from the session start.
    pub session_duration: Duration,
    /// How often the frame loop polls the session timer when no frame arrives.
    pub timer_tick: Duration,

    // ---- transport / runtime ----
    /// Capacity of the in-process bus ring buffer.
    pub bus_capacity: usize,
    /// Delivery quality requested for every published event.
    pub quality: QualityLevel,
    /// Delays between bus reconnect attempts.
    pub reconnect: BackoffPolicy,
    /// Maximum consecutive reconnect attempts (`0` = unlimited).
    pub max_reconnects: u32,
    /// Maximum time to wait for both loops to stop after a shutdown signal.
    pub grace: Duration,

    // ---- persistence ----
    /// Delays between persistence retries.
    pub persist_retry: BackoffPolicy,
    /// Maximum persistence attempts per session record (min 1).
    pub max_persist_attempts: u32,
}

impl Config {
    /// Returns the reconnect limit as an `Option`.
    ///
    /// - `None` → retry forever
    /// - `Some(n)` → give up after `n` consecutive failures
    #[inline]
    pub fn reconnect_limit(&self) -> Option<u32> {
        if self.max_reconnects == 0 {
            None
        } else {
            Some(self.max_reconnects)
        }
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the persistence attempt budget clamped to a minimum of 1.
    #[inline]
    pub fn persist_attempts_clamped(&self) -> u32 {
        self.max_persist_attempts.max(1)
    }

    /// True if `distance` lies strictly inside the physical sensor bounds.
    #[inline]
    pub fn distance_in_bounds(&self, distance: f64) -> bool {
        distance > self.min_distance && distance < self.max_distance
    }

    /// True if `hip` lies inside the straight-back range (inclusive).
    #[inline]
    pub fn hip_in_range(&self, hip: f64) -> bool {
        hip >= self.hip_range.0 && hip <= self.hip_range.1
    }
}

impl Default for Config {
    /// Default configuration, tuned for an HC-SR04 class rangefinder placed under
    /// the chest and a 30 fps pose pipeline:
    ///
    /// - bounds `(0, 300)` cm, tolerance 5 cm, 2 cm movement threshold, 3 wrong readings
    /// - bottom calibration below 10 cm, 150 ms sampling cadence
    /// - extended posture: elbow > 145°, shoulder > 40°, hip > 145°, held 1.5 s
    /// - bottom elbow ≤ 90°, straight back hip in `[145°, 185°]`
    /// - 60 s sessions, exactly-once delivery
    fn default() -> Self {
        Self {
            min_distance: 0.0,
            max_distance: 300.0,
            tolerance: 5.0,
            direction_change_threshold: 2.0,
            consecutive_wrong_readings: 3,
            bottom_calibration_ceiling: 10.0,
            sample_interval: Duration::from_millis(150),
            invalid_retry_interval: Duration::from_millis(50),
            sensor_timeout: Duration::from_millis(500),
            calibration_timeout: Duration::from_secs(10),

            extended_elbow: 145.0,
            extended_shoulder: 40.0,
            extended_hip: 145.0,
            bottom_elbow: 90.0,
            hip_range: (145.0, 185.0),
            ready_dwell: Duration::from_millis(1500),
            presence_frames: 3,
            absence_frames: 3,
            flip_policy: FlipPolicy::FirstEvidence,

            session_duration: Duration::from_secs(60),
            timer_tick: Duration::from_millis(250),

            bus_capacity: 1024,
            quality: QualityLevel::ExactlyOnce,
            reconnect: BackoffPolicy {
                first: Duration::from_millis(100),
                max: Duration::from_secs(5),
                factor: 2.0,
                jitter: JitterPolicy::Equal,
            },
            max_reconnects: 8,
            grace: Duration::from_secs(5),

            persist_retry: BackoffPolicy {
                first: Duration::from_millis(500),
                max: Duration::from_secs(30),
                factor: 2.0,
                jitter: JitterPolicy::Equal,
            },
            max_persist_attempts: 5,
        }
    }
}
