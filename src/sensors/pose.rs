//! # Pose evidence.
//!
//! The frame loop never touches pixels. It consumes [`Frame`]s: whether a user is
//! in view plus three joint angles, any of which may be missing when the joint
//! is occluded. Frames come from a [`PoseSource`]:
//!
//! - [`JsonLinesPoseSource`] reads one JSON frame per line from a pose pipeline
//!   process (stdout pipe, socket, file).
//! - [`ReplayPoseSource`] replays prerecorded frames at a fixed cadence.
//!
//! Pipelines that expose landmark angles directly can implement
//! [`PoseEstimator`] and build frames with [`Frame::from_estimator`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::time::{self, Interval, MissedTickBehavior};

use crate::error::SensorError;
use crate::session::FlaggedAttempt;

/// Joint angles in degrees. `None` means "not visible this cycle".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleSample {
    #[serde(default)]
    pub elbow: Option<f64>,
    #[serde(default)]
    pub shoulder: Option<f64>,
    #[serde(default)]
    pub hip: Option<f64>,
}

impl AngleSample {
    /// All three angles present.
    pub fn new(elbow: f64, shoulder: f64, hip: f64) -> Self {
        Self {
            elbow: Some(elbow),
            shoulder: Some(shoulder),
            hip: Some(hip),
        }
    }

    /// Overwrites fields that are present in `newer`, keeps the rest.
    pub fn merge(&mut self, newer: &AngleSample) {
        if newer.elbow.is_some() {
            self.elbow = newer.elbow;
        }
        if newer.shoulder.is_some() {
            self.shoulder = newer.shoulder;
        }
        if newer.hip.is_some() {
            self.hip = newer.hip;
        }
    }
}

/// One sampling cycle of the pose pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// A body with all key landmarks is in view.
    #[serde(rename = "present")]
    pub user_present: bool,
    /// Joint angles (flattened on the wire).
    #[serde(flatten)]
    pub angles: AngleSample,
}

impl Frame {
    /// Frame with a user and all three angles.
    pub fn with_user(elbow: f64, shoulder: f64, hip: f64) -> Self {
        Self {
            user_present: true,
            angles: AngleSample::new(elbow, shoulder, hip),
        }
    }

    /// Frame without a user.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Samples the three push-up angles from a landmark estimator.
    pub fn from_estimator<E: PoseEstimator + ?Sized>(estimator: &E) -> Self {
        Self {
            user_present: estimator.user_present(),
            angles: AngleSample {
                elbow: estimator.angle(JointTriplet::ELBOW),
                shoulder: estimator.angle(JointTriplet::SHOULDER),
                hip: estimator.angle(JointTriplet::HIP),
            },
        }
    }
}

/// Three landmark indices; the angle is measured at the middle one.
///
/// Indices follow the 33-point BlazePose topology (left side of the body).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointTriplet(pub usize, pub usize, pub usize);

impl JointTriplet {
    /// Shoulder → elbow → wrist.
    pub const ELBOW: JointTriplet = JointTriplet(11, 13, 15);
    /// Elbow → shoulder → hip.
    pub const SHOULDER: JointTriplet = JointTriplet(13, 11, 23);
    /// Shoulder → hip → knee.
    pub const HIP: JointTriplet = JointTriplet(11, 23, 25);
}

/// Landmark-level pose estimator.
pub trait PoseEstimator {
    /// Angle at the middle joint of `triplet`, if all three landmarks are visible.
    fn angle(&self, triplet: JointTriplet) -> Option<f64>;

    /// True if a whole body is in view.
    fn user_present(&self) -> bool;
}

/// Stream of frames.
#[async_trait]
pub trait PoseSource: Send + 'static {
    /// Waits for the next frame. `Ok(None)` ends the stream.
    ///
    /// Implementations must be cancel-safe: the frame loop races this call
    /// against bus events and timer ticks.
    async fn next_frame(&mut self) -> Result<Option<Frame>, SensorError>;

    /// Asks the video side to keep the frame that tainted `flagged` for later
    /// review. Called at most once per attempt; must not block.
    ///
    /// The default does nothing, for sources without access to the image.
    fn request_snapshot(&mut self, flagged: &FlaggedAttempt) {
        let _ = flagged;
    }

    /// Returns the backend name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Replays prerecorded frames, one per `interval`.
pub struct ReplayPoseSource {
    frames: VecDeque<Frame>,
    ticker: Option<Interval>,
    interval: Duration,
}

impl ReplayPoseSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>, interval: Duration) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            ticker: None,
            interval,
        }
    }

    /// Frames left to replay.
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl PoseSource for ReplayPoseSource {
    async fn next_frame(&mut self) -> Result<Option<Frame>, SensorError> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        let period = self.interval.max(Duration::from_millis(1));
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut t = time::interval(period);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            t
        });
        ticker.tick().await;
        Ok(self.frames.pop_front())
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

/// Reads JSON frames, one per line:
/// `{"present":true,"elbow":171.2,"shoulder":62.0,"hip":168.4}`.
///
/// Missing angle fields (or `null`) are treated as occluded joints.
pub struct JsonLinesPoseSource<R> {
    lines: Lines<R>,
}

impl<R> JsonLinesPoseSource<R>
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
impl<R> PoseSource for JsonLinesPoseSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_frame(&mut self) -> Result<Option<Frame>, SensorError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| SensorError::Unavailable {
                    reason: e.to_string(),
                })?;
            let Some(line) = line else {
                return Ok(None);
            };
            let raw = line.trim();
            if raw.is_empty() {
                continue;
            }
            return serde_json::from_str::<Frame>(raw)
                .map(Some)
                .map_err(|_| SensorError::Malformed {
                    raw: raw.to_string(),
                });
        }
    }

    fn name(&self) -> &'static str {
        "json-lines"
    }
}
