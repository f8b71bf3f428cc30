//! # BaselineCalibrator: per-session top/bottom references.
//!
//! Two independent phases, each polling the rangefinder until one qualifying
//! reading arrives:
//!
//! | Phase | Triggered by | Qualifies when |
//! |---|---|---|
//! | top | "User in position" | `min < d < max` |
//! | bottom | "Start" | `min < d < bottom_calibration_ceiling` |
//!
//! A phase latches exactly once per session: later calls return the latched
//! value without touching the sensor. Polling is bounded by
//! [`Config::calibration_timeout`]; running out yields
//! [`CalibrationError::Timeout`] instead of spinning forever.

use std::fmt;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::CalibrationError;
use crate::sensors::{RangeSensor, read_distance};

/// Calibrated reference distances of one session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub top: f64,
    pub bottom: f64,
}

/// Which reference is being latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Top,
    Bottom,
}

impl CalibrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationPhase::Top => "top",
            CalibrationPhase::Bottom => "bottom",
        }
    }
}

impl fmt::Display for CalibrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latches the session baseline from rangefinder readings.
#[derive(Debug, Clone)]
pub struct BaselineCalibrator {
    min_distance: f64,
    max_distance: f64,
    bottom_ceiling: f64,
    timeout: Duration,
    retry_interval: Duration,
    sensor_timeout: Duration,
    top: Option<f64>,
    bottom: Option<f64>,
}

impl BaselineCalibrator {
    pub fn new(cfg: &Config) -> Self {
        Self {
            min_distance: cfg.min_distance,
            max_distance: cfg.max_distance,
            bottom_ceiling: cfg.bottom_calibration_ceiling,
            timeout: cfg.calibration_timeout,
            retry_interval: cfg.invalid_retry_interval,
            sensor_timeout: cfg.sensor_timeout,
            top: None,
            bottom: None,
        }
    }

    /// True if `distance` may latch `phase`.
    pub fn qualifies(&self, phase: CalibrationPhase, distance: f64) -> bool {
        let ceiling = match phase {
            CalibrationPhase::Top => self.max_distance,
            CalibrationPhase::Bottom => self.bottom_ceiling.min(self.max_distance),
        };
        distance > self.min_distance && distance < ceiling
    }

    /// Offers one reading. Returns the latched value once the phase is latched.
    pub fn offer(&mut self, phase: CalibrationPhase, distance: f64) -> Option<f64> {
        let qualifies = self.qualifies(phase, distance);
        let slot = match phase {
            CalibrationPhase::Top => &mut self.top,
            CalibrationPhase::Bottom => &mut self.bottom,
        };
        if slot.is_none() && qualifies {
            *slot = Some(distance);
        }
        *slot
    }

    /// Latched value of `phase`, if any.
    pub fn latched(&self, phase: CalibrationPhase) -> Option<f64> {
        match phase {
            CalibrationPhase::Top => self.top,
            CalibrationPhase::Bottom => self.bottom,
        }
    }

    /// The complete baseline, once both phases latched.
    pub fn baseline(&self) -> Option<Baseline> {
        Some(Baseline {
            top: self.top?,
            bottom: self.bottom?,
        })
    }

    /// Discards the session baseline.
    pub fn reset(&mut self) {
        self.top = None;
        self.bottom = None;
    }

    /// Polls `sensor` until `phase` latches, the phase budget runs out, or `ctx`
    /// is cancelled.
    ///
    /// Out-of-range readings and transient sensor errors are retried after
    /// [`Config::invalid_retry_interval`]; an unavailable sensor aborts the phase.
    pub async fn calibrate<S>(
        &mut self,
        phase: CalibrationPhase,
        sensor: &mut S,
        ctx: &CancellationToken,
    ) -> Result<f64, CalibrationError>
    where
        S: RangeSensor + ?Sized,
    {
        if let Some(value) = self.latched(phase) {
            return Ok(value);
        }
        let started = Instant::now();
        let deadline = started + self.timeout;

        loop {
            if Instant::now() >= deadline {
                return Err(CalibrationError::Timeout {
                    phase: phase.as_str(),
                    waited: started.elapsed(),
                });
            }

            let read = tokio::select! {
                _ = ctx.cancelled() => return Err(CalibrationError::Canceled),
                r = read_distance(sensor, self.sensor_timeout) => r,
            };
            match read {
                Ok(distance) => {
                    if let Some(value) = self.offer(phase, distance) {
                        info!(%phase, distance = value, "baseline latched");
                        return Ok(value);
                    }
                    debug!(%phase, distance, "reading does not qualify");
                }
                Err(e) if e.is_transient() => {
                    debug!(%phase, error = e.as_label(), "transient sensor error");
                }
                Err(e) => return Err(e.into()),
            }

            tokio::select! {
                _ = ctx.cancelled() => return Err(CalibrationError::Canceled),
                _ = time::sleep(self.retry_interval) => {}
            }
        }
    }
}
