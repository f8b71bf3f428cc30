//! # Rangefinder access.
//!
//! [`RangeSensor`] is the seam between the range loop and the hardware: one call,
//! one distance or one failure. Two backends ship with the crate:
//!
//! - [`LineRangeSensor`] reads newline-delimited readings (centimetres) from any
//!   async reader, e.g. a serial port where a microcontroller streams echo times
//!   already converted to distance.
//! - [`ScriptedRangeSensor`] replays a fixed script (tests, demos).
//!
//! [`read_distance`] bounds a single read with a timeout so that a stuck echo pin
//! surfaces as [`SensorError::Timeout`] instead of hanging the loop.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::time;

use crate::error::SensorError;

/// Distance source.
#[async_trait]
pub trait RangeSensor: Send + 'static {
    /// Performs one measurement.
    async fn sample(&mut self) -> Result<f64, SensorError>;

    /// Returns the backend name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Performs one measurement bounded by `timeout`.
pub async fn read_distance<S>(sensor: &mut S, timeout: Duration) -> Result<f64, SensorError>
where
    S: RangeSensor + ?Sized,
{
    match time::timeout(timeout, sensor.sample()).await {
        Ok(res) => res,
        Err(_elapsed) => Err(SensorError::Timeout { timeout }),
    }
}

/// Replays a fixed sequence of readings.
///
/// When the script runs out the sensor either repeats its last reading
/// ([`ScriptedRangeSensor::repeat_last`]) or reports itself unavailable.
#[derive(Debug, Default)]
pub struct ScriptedRangeSensor {
    script: VecDeque<Result<f64, SensorError>>,
    last: Option<f64>,
    repeat_last: bool,
}

impl ScriptedRangeSensor {
    /// Creates a sensor that returns `readings` in order.
    pub fn new(readings: impl IntoIterator<Item = f64>) -> Self {
        Self {
            script: readings.into_iter().map(Ok).collect(),
            last: None,
            repeat_last: false,
        }
    }

    /// Creates a sensor from explicit outcomes, failures included.
    pub fn from_results(script: impl IntoIterator<Item = Result<f64, SensorError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: None,
            repeat_last: false,
        }
    }

    /// Keep returning the last successful reading once the script is exhausted.
    #[must_use]
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Appends more readings to the script.
    pub fn push(&mut self, reading: f64) {
        self.script.push_back(Ok(reading));
    }
}

#[async_trait]
impl RangeSensor for ScriptedRangeSensor {
    async fn sample(&mut self) -> Result<f64, SensorError> {
        match self.script.pop_front() {
            Some(Ok(v)) => {
                self.last = Some(v);
                Ok(v)
            }
            Some(Err(e)) => Err(e),
            None => match (self.repeat_last, self.last) {
                (true, Some(v)) => Ok(v),
                _ => Err(SensorError::Unavailable {
                    reason: "script exhausted".to_string(),
                }),
            },
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Reads one distance per line from an async reader.
///
/// Blank lines are skipped; end of input makes the sensor unavailable.
pub struct LineRangeSensor<R> {
    lines: Lines<R>,
}

impl<R> LineRangeSensor<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R> RangeSensor for LineRangeSensor<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn sample(&mut self) -> Result<f64, SensorError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| SensorError::Unavailable {
                    reason: e.to_string(),
                })?;
            let Some(line) = line else {
                return Err(SensorError::Unavailable {
                    reason: "end of stream".to_string(),
                });
            };
            let raw = line.trim();
            if raw.is_empty() {
                continue;
            }
            return raw.parse::<f64>().map_err(|_| SensorError::Malformed {
                raw: raw.to_string(),
            });
        }
    }

    fn name(&self) -> &'static str {
        "line"
    }
}
