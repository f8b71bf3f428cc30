//! # repvisor
//!
//! **Repvisor** counts push-up repetitions by fusing two independent signals:
//! a rangefinder under the chest and joint angles from a pose pipeline. Each
//! signal is sampled by its own loop; the loops only talk through
//! topic-addressed events on a publish/subscribe bus.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────┐                                   ┌──────────────┐
//!   │ RangeSensor  │                                   │  PoseSource  │
//!   │ (cm readings)│                                   │   (Frames)   │
//!   └──────┬───────┘                                   └──────┬───────┘
//!          ▼                                                  ▼
//!   ┌──────────────────────┐      posture evidence     ┌──────────────────────┐
//!   │      RangeLoop       │ ───────────────────────►  │      FrameLoop       │
//!   │ - BaselineCalibrator │                           │ - RepStateMachine    │
//!   │ - DirectionTracker   │ ◄───────────────────────  │ - SessionTimer       │
//!   └──────────────────────┘   status, direction       └──────┬────────┬──────┘
//!            ▲                                                │        │
//!            └──────────── Transport (Bus) ───────────────────┘        │
//!                                                           ┌─────────┴─────────┐
//!                                                           ▼                   ▼
//!                                                      ActuatorSet      RecorderHandoff
//!                                                    (per-device queue)  (retry/backoff)
//!                                                           │                   │
//!                                                     Actuate::notify   SessionRecorder::persist
//! ```
//!
//! ### Session lifecycle
//! ```text
//! user detected ─► ready posture held ─► "User in position" ─► range: calibrate top
//!                                    └─► "Start"            ─► range: calibrate bottom, monitor
//! loop {
//!   direction "down" ─► elbow bent / bottom reached ─► direction "up"
//!                   ─► top reached + arms extended  ─► rep (or rejection if tainted)
//! }
//! user lost / time up ─► "End" ─► stats ─► recorder
//! ```
//!
//! ## Features
//! | Area            | Description                                             | Key types / traits                         |
//! |-----------------|---------------------------------------------------------|--------------------------------------------|
//! | **Runtime**     | Wire both loops onto one bus, signals, graceful stop.   | [`Runtime`], [`RuntimeBuilder`]            |
//! | **Referee**     | Rep/attempt state machine with form checks.             | [`RepStateMachine`], [`FormIssue`]         |
//! | **Evidence**    | Baseline calibration and direction tracking.            | [`BaselineCalibrator`], [`DirectionTracker`] |
//! | **Sensors**     | Range and pose seams with real and scripted backends.   | [`RangeSensor`], [`PoseSource`]            |
//! | **Bus**         | Topic-addressed events, in-process transport.           | [`Event`], [`Transport`], [`Bus`]          |
//! | **Feedback**    | Non-blocking fan-out to displays, LEDs, speech.         | [`Actuate`], [`ActuatorSet`]               |
//! | **Persistence** | Session records with background retry.                  | [`SessionRecorder`], [`RecorderHandoff`]   |
//! | **Errors**      | Typed errors with stable labels.                        | [`TaskError`], [`RuntimeError`]            |
//! | **Configuration** | Thresholds and timings for both loops.                | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogActuator`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use repvisor::{Config, Frame, MemoryRecorder, ReplayPoseSource, RuntimeBuilder, ScriptedRangeSensor};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryRecorder::new());
//!
//!     // Nobody steps in front of the camera: no session, nothing persisted.
//!     let runtime = RuntimeBuilder::new(Config::default())
//!         .with_range_sensor(ScriptedRangeSensor::new([40.0]))
//!         .with_pose_source(ReplayPoseSource::new(vec![Frame::empty(); 5], Duration::from_millis(10)))
//!         .with_recorder(store.clone())
//!         .build()?;
//!
//!     // Returns once the pose source runs dry.
//!     runtime.run_until(CancellationToken::new()).await?;
//!     assert!(store.is_empty());
//!     Ok(())
//! }
//! ```
mod actuators;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod recorder;
mod sensors;
mod session;
mod tracking;

// ---- Public re-exports ----

pub use actuators::{Actuate, ActuatorSet, Feedback};
pub use config::{Config, FlipPolicy};
pub use core::{FrameLoop, Link, RangeLoop, Runtime, RuntimeBuilder, wait_for_shutdown_signal};
pub use error::{BusError, CalibrationError, RecorderError, RuntimeError, SensorError, TaskError};
pub use events::{
    Bus, Direction, Event, Payload, PostureSignal, QualityLevel, StatusMessage, Subscription,
    Topic, Transport,
};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use recorder::{
    JsonFileRecorder, MemoryRecorder, RecorderHandoff, SessionRecorder, persist_with_retry,
};
pub use sensors::{
    AngleSample, Frame, JointTriplet, JsonLinesPoseSource, LineRangeSensor, PoseEstimator,
    PoseSource, RangeSensor, ReplayPoseSource, ScriptedRangeSensor, read_distance,
};
pub use session::{
    Attempt, EndReason, FlaggedAttempt, FormIssue, Output, RepState, RepStateMachine,
    SessionRecord, SessionReport, SessionStats, SessionTimer, TimerPoll, unix_ms,
};
pub use tracking::{
    Baseline, BaselineCalibrator, CalibrationPhase, DirectionState, DirectionTracker,
    DistanceSample,
};

// Optional: expose a simple built-in stdout actuator (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use actuators::LogActuator;
