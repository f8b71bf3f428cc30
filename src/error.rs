//! Error types used by the repvisor loops and their collaborators.
//!
//! - [`SensorError`] a range or pose backend could not deliver a reading.
//! - [`CalibrationError`] a baseline phase did not latch.
//! - [`BusError`] the publish/subscribe transport failed or sent garbage.
//! - [`RecorderError`] a session record could not be persisted.
//! - [`TaskError`] why a sampling loop stopped.
//! - [`RuntimeError`] failures of the runtime itself.
//!
//! Every enum provides `as_label` (stable snake_case, for logs) and most provide
//! `as_message`. Form violations are **not** errors: they are regular outcomes
//! of the rep state machine.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by sensor backends.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    /// The hardware round-trip did not complete in time.
    #[error("sensor timed out after {timeout:?}")]
    Timeout {
        /// The per-read timeout that was exceeded.
        timeout: Duration,
    },

    /// The backend is gone (device unplugged, stream closed, script exhausted).
    #[error("sensor unavailable: {reason}")]
    Unavailable {
        /// Backend specific detail.
        reason: String,
    },

    /// The backend produced something that is not a reading.
    #[error("malformed reading: {raw:?}")]
    Malformed {
        /// The raw input that failed to parse.
        raw: String,
    },
}

impl SensorError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SensorError::Timeout { .. } => "sensor_timeout",
            SensorError::Unavailable { .. } => "sensor_unavailable",
            SensorError::Malformed { .. } => "sensor_malformed",
        }
    }

    /// Transient errors are worth another read; `Unavailable` is not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SensorError::Timeout { .. } | SensorError::Malformed { .. }
        )
    }
}

/// # Errors produced while latching a baseline.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// No qualifying reading arrived within the phase budget.
    #[error("{phase} calibration gave up after {waited:?}")]
    Timeout {
        /// `"top"` or `"bottom"`.
        phase: &'static str,
        /// How long the phase polled.
        waited: Duration,
    },

    /// The sensor became unavailable during calibration.
    #[error("calibration aborted: {0}")]
    Sensor(#[from] SensorError),

    /// The loop was cancelled while calibrating.
    #[error("calibration cancelled")]
    Canceled,
}

impl CalibrationError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CalibrationError::Timeout { .. } => "calibration_timeout",
            CalibrationError::Sensor(_) => "calibration_sensor",
            CalibrationError::Canceled => "calibration_canceled",
        }
    }
}

/// # Errors produced by the publish/subscribe transport.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    /// The connection to the broker (or the in-process channel) is gone.
    #[error("bus disconnected: {reason}")]
    Disconnected {
        /// Transport specific detail.
        reason: String,
    },

    /// The transport refused the operation (e.g. subscription denied).
    #[error("bus rejected request: {reason}")]
    Rejected {
        /// Transport specific detail.
        reason: String,
    },

    /// A message arrived on a known topic with an unknown payload.
    #[error("cannot decode {topic:?} payload {payload:?}")]
    Decode {
        /// Topic name as seen on the wire.
        topic: String,
        /// Payload as seen on the wire (lossy UTF-8).
        payload: String,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Disconnected { .. } => "bus_disconnected",
            BusError::Rejected { .. } => "bus_rejected",
            BusError::Decode { .. } => "bus_decode",
        }
    }

    /// True if reconnecting may fix the problem.
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            BusError::Disconnected { .. } | BusError::Rejected { .. }
        )
    }
}

/// # Errors produced by session recorders.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecorderError {
    /// Storage is unreachable; the write may succeed later.
    #[error("recorder unavailable: {reason}")]
    Unavailable {
        /// Backend specific detail.
        reason: String,
    },

    /// Storage refused the record; retrying will not help.
    #[error("recorder rejected record: {reason}")]
    Rejected {
        /// Backend specific detail.
        reason: String,
    },
}

impl RecorderError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RecorderError::Unavailable { .. } => "recorder_unavailable",
            RecorderError::Rejected { .. } => "recorder_rejected",
        }
    }

    /// Only `Unavailable` is retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RecorderError::Unavailable { .. })
    }
}

/// # Why a sampling loop stopped.
///
/// Detection logic never produces these; only connectivity and cancellation do.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Non-recoverable error, e.g. the bus could not be reached within the reconnect budget.
    #[error("fatal error (no retry): {reason}")]
    Fatal {
        /// The underlying error message.
        reason: String,
    },

    /// The loop failed but may succeed if started again.
    #[error("execution failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// The loop was cancelled by the runtime.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use repvisor::TaskError;
    ///
    /// let err = TaskError::Fatal { reason: "broker gone".into() };
    /// assert_eq!(err.as_label(), "task_fatal");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fatal { reason } => format!("fatal: {reason}"),
            TaskError::Fail { reason } => format!("error: {reason}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }
}

/// # Errors produced by the runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some loops had to be aborted.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}; forcing termination")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Loops that did not stop in time.
        stuck: Vec<&'static str>,
    },

    /// A sampling loop stopped with a fatal error, ending the device run.
    #[error("{name} loop stopped: {source}")]
    LoopFailed {
        /// Which loop stopped.
        name: &'static str,
        /// Why it stopped.
        source: TaskError,
    },

    /// The builder lacks a required collaborator.
    #[error("runtime not built: missing {missing}")]
    Missing {
        /// Which collaborator is missing.
        missing: &'static str,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use repvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::LoopFailed { .. } => "runtime_loop_failed",
            RuntimeError::Missing { .. } => "runtime_missing",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck loops={stuck:?}")
            }
            RuntimeError::LoopFailed { name, source } => {
                format!("loop {name} stopped: {}", source.as_message())
            }
            RuntimeError::Missing { missing } => format!("missing {missing}"),
        }
    }
}
