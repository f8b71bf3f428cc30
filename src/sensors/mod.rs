//! Sensor seams.
//!
//! Both signals are external collaborators; this module only fixes the shape in
//! which they reach the loops.
//!
//! - [`RangeSensor`] one blocking-style distance read (`f64` cm or [`SensorError`])
//! - [`PoseSource`] a stream of [`Frame`]s with possibly missing [`AngleSample`] fields
//!
//! Each seam has a real line-oriented backend and a scripted one for tests.

mod pose;
mod range;

pub use pose::{
    AngleSample, Frame, JointTriplet, JsonLinesPoseSource, PoseEstimator, PoseSource,
    ReplayPoseSource,
};
pub use range::{LineRangeSensor, RangeSensor, ScriptedRangeSensor, read_distance};
