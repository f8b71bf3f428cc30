//! # Runtime: wires both sampling loops onto one bus and runs them.
//!
//! ```text
//! RuntimeBuilder::new(cfg)
//!     .with_range_sensor(..)  .with_pose_source(..)
//!     .with_actuator(..)      .with_recorder(..)
//!     .build()?  ──► Runtime
//!
//! Runtime::run()
//!   ├─ OS signal watcher ──► token.cancel()
//!   └─ run_until(token)
//!        ├─ Link(status, direction).connect()   Link(posture).connect()
//!        ├─ JoinSet:
//!        │    RangeLoop::run(token.child_token())
//!        │    FrameLoop::run(token.child_token())
//!        ├─ first loop exit or token cancelled ──► token.cancel()
//!        └─ wait for the rest within cfg.grace
//!              ├─ all joined  → Ok / LoopFailed
//!              └─ timeout     → GraceExceeded { stuck } (stuck loops aborted)
//! ```
//!
//! Both links subscribe before either loop starts, so no event one loop
//! publishes at startup can be missed by the other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{self, JoinError, JoinSet};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::actuators::{Actuate, ActuatorSet};
use crate::config::Config;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Topic, Transport};
use crate::recorder::{RecorderHandoff, SessionRecorder};
use crate::sensors::{PoseSource, RangeSensor};

use super::frame_loop::FrameLoop;
use super::link::Link;
use super::range_loop::RangeLoop;
use super::shutdown;

const RANGE: &str = "range";
const FRAME: &str = "frame";

/// Builder for a [`Runtime`].
///
/// The range sensor and the pose source are required. Without a transport the
/// runtime uses an in-process [`Bus`]; without a recorder finished sessions are
/// only logged.
pub struct RuntimeBuilder {
    cfg: Config,
    transport: Option<Arc<dyn Transport>>,
    range: Option<Box<dyn RangeSensor>>,
    pose: Option<Box<dyn PoseSource>>,
    actuators: Vec<Arc<dyn Actuate>>,
    recorder: Option<Arc<dyn SessionRecorder>>,
}

impl RuntimeBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            transport: None,
            range: None,
            pose: None,
            actuators: Vec::new(),
            recorder: None,
        }
    }

    /// Uses `transport` instead of an in-process bus.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_range_sensor(mut self, sensor: impl RangeSensor) -> Self {
        self.range = Some(Box::new(sensor));
        self
    }

    pub fn with_pose_source(mut self, source: impl PoseSource) -> Self {
        self.pose = Some(Box::new(source));
        self
    }

    /// Adds one feedback device.
    pub fn with_actuator(mut self, actuator: Arc<dyn Actuate>) -> Self {
        self.actuators.push(actuator);
        self
    }

    /// Replaces the feedback devices.
    pub fn with_actuators(mut self, actuators: Vec<Arc<dyn Actuate>>) -> Self {
        self.actuators = actuators;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn SessionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Returns [`RuntimeError::Missing`] if a sensor seam was not provided.
    pub fn build(self) -> Result<Runtime, RuntimeError> {
        let range = self.range.ok_or(RuntimeError::Missing {
            missing: "range sensor",
        })?;
        let pose = self.pose.ok_or(RuntimeError::Missing {
            missing: "pose source",
        })?;
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(Bus::new(self.cfg.bus_capacity_clamped())));
        Ok(Runtime {
            cfg: self.cfg,
            transport,
            range,
            pose,
            actuators: self.actuators,
            recorder: self.recorder,
        })
    }
}

/// One rep-counting device: a range loop and a frame loop sharing a bus.
pub struct Runtime {
    cfg: Config,
    transport: Arc<dyn Transport>,
    range: Box<dyn RangeSensor>,
    pose: Box<dyn PoseSource>,
    actuators: Vec<Arc<dyn Actuate>>,
    recorder: Option<Arc<dyn SessionRecorder>>,
}

impl Runtime {
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    /// Transport both loops talk over.
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Runs until a loop stops on its own (e.g. the pose source closes) or the
    /// process receives a termination signal.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        let watcher = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    sig = shutdown::wait_for_shutdown_signal() => match sig {
                        Ok(name) => {
                            info!(signal = name, "shutdown requested");
                            token.cancel();
                        }
                        Err(e) => warn!(error = %e, "signal handlers unavailable"),
                    },
                }
            })
        };
        let result = self.run_until(token.clone()).await;
        token.cancel();
        let _ = watcher.await;
        result
    }

    /// Runs until a loop stops on its own or `token` is cancelled.
    pub async fn run_until(self, token: CancellationToken) -> Result<(), RuntimeError> {
        let cfg = self.cfg;
        let mut range_link = Link::new(
            Arc::clone(&self.transport),
            &[Topic::Status, Topic::Direction],
            &cfg,
        );
        let mut frame_link = Link::new(Arc::clone(&self.transport), &[Topic::Posture], &cfg);
        for (name, link) in [(RANGE, &mut range_link), (FRAME, &mut frame_link)] {
            match link.connect(&token).await {
                Ok(()) => {}
                Err(TaskError::Canceled) => return Ok(()),
                Err(source) => {
                    error!(name, error = source.as_label(), "bus link not established");
                    return Err(RuntimeError::LoopFailed { name, source });
                }
            }
        }

        let actuators = ActuatorSet::new(self.actuators);
        let recorder = self.recorder.map(|store| {
            RecorderHandoff::new(store, cfg.persist_retry, cfg.persist_attempts_clamped())
        });
        let range = RangeLoop::new(&cfg, range_link, self.range);
        let frame = FrameLoop::new(&cfg, frame_link, self.pose, actuators, recorder);

        let mut set = JoinSet::new();
        let mut names = HashMap::new();
        let id = set.spawn(range.run(token.child_token())).id();
        names.insert(id, RANGE);
        let id = set.spawn(frame.run(token.child_token())).id();
        names.insert(id, FRAME);
        info!(transport = self.transport.name(), "device running");

        let mut failure = None;
        tokio::select! {
            _ = token.cancelled() => {}
            Some(done) = set.join_next_with_id() => settle(done, &mut names, &mut failure),
        }
        token.cancel();

        let grace = cfg.grace;
        let drained = time::timeout(grace, async {
            while let Some(done) = set.join_next_with_id().await {
                settle(done, &mut names, &mut failure);
            }
        })
        .await;

        if drained.is_err() {
            let mut stuck: Vec<&'static str> = names.into_values().collect();
            stuck.sort_unstable();
            set.abort_all();
            error!(?grace, ?stuck, "loops did not stop within grace");
            return Err(RuntimeError::GraceExceeded { grace, stuck });
        }
        info!("device stopped");
        failure.map_or(Ok(()), Err)
    }
}

/// Books one finished loop; the first failure wins.
fn settle(
    done: Result<(task::Id, Result<(), TaskError>), JoinError>,
    names: &mut HashMap<task::Id, &'static str>,
    failure: &mut Option<RuntimeError>,
) {
    let (id, result) = match done {
        Ok((id, result)) => (id, result),
        Err(e) => (
            e.id(),
            Err(TaskError::Fail {
                reason: if e.is_panic() {
                    "loop panicked".to_string()
                } else {
                    e.to_string()
                },
            }),
        ),
    };
    let name = names.remove(&id).unwrap_or("unknown");
    match result {
        Ok(()) | Err(TaskError::Canceled) => info!(name, "loop exited"),
        Err(source) => {
            error!(name, error = source.as_label(), detail = %source, "loop failed");
            if failure.is_none() {
                *failure = Some(RuntimeError::LoopFailed { name, source });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::actuators::Feedback;
    use crate::core::link::tests::FlakyTransport;
    use crate::recorder::MemoryRecorder;
    use crate::sensors::{Frame, ReplayPoseSource, ScriptedRangeSensor};

    const FRAME_STEP: Duration = Duration::from_millis(100);

    fn one_rep() -> Vec<Frame> {
        let mut frames = vec![Frame::with_user(170.0, 60.0, 150.0); 20];
        for e in [170.0, 150.0, 120.0, 85.0, 80.0, 95.0, 130.0, 150.0, 160.0] {
            frames.push(Frame::with_user(e, 60.0, 150.0));
        }
        frames.extend(vec![Frame::with_user(160.0, 60.0, 150.0); 20]);
        frames.extend(vec![Frame::empty(); 4]);
        frames
    }

    /// top 40, bottom 5, then down to the floor and back up.
    fn chest_readings() -> ScriptedRangeSensor {
        ScriptedRangeSensor::new([
            40.0, 5.0, 30.0, 25.0, 20.0, 15.0, 10.0, 8.0, 8.0, 10.0, 15.0, 20.0, 25.0, 30.0,
            35.0, 38.0, 40.0,
        ])
        .repeat_last()
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_counts_rep_end_to_end() {
        let store = Arc::new(MemoryRecorder::new());
        let runtime = RuntimeBuilder::new(Config::default())
            .with_range_sensor(chest_readings())
            .with_pose_source(ReplayPoseSource::new(one_rep(), FRAME_STEP))
            .with_recorder(store.clone())
            .build()
            .unwrap();

        runtime.run_until(CancellationToken::new()).await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stats.rep_count, 1);
        assert_eq!(records[0].stats.attempt_count, 1);
        assert_eq!(records[0].stats.success_rate, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_device_and_keeps_session() {
        let store = Arc::new(MemoryRecorder::new());
        let runtime = RuntimeBuilder::new(Config::default())
            .with_range_sensor(chest_readings())
            .with_pose_source(ReplayPoseSource::new(
                vec![Frame::with_user(170.0, 60.0, 150.0); 100],
                FRAME_STEP,
            ))
            .with_recorder(store.clone())
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let stop = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(3)).await;
            stop.cancel();
        });
        runtime.run_until(token).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_bus_fails_the_run() {
        let cfg = Config {
            max_reconnects: 2,
            ..Config::default()
        };
        let flaky = Arc::new(FlakyTransport::new(Bus::new(16), 100, 0));
        let runtime = RuntimeBuilder::new(cfg)
            .with_transport(flaky)
            .with_range_sensor(chest_readings())
            .with_pose_source(ReplayPoseSource::new(one_rep(), FRAME_STEP))
            .build()
            .unwrap();

        let err = runtime.run_until(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_loop_failed");
        assert!(matches!(err, RuntimeError::LoopFailed { name: "range", .. }));
    }

    struct Wedged;

    #[async_trait]
    impl Actuate for Wedged {
        async fn notify(&self, _cue: &Feedback) {
            std::future::pending::<()>().await;
        }
        fn name(&self) -> &'static str {
            "wedged"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wedged_actuator_exceeds_grace() {
        let cfg = Config {
            grace: Duration::from_secs(2),
            ..Config::default()
        };
        let runtime = RuntimeBuilder::new(cfg)
            .with_range_sensor(chest_readings())
            .with_pose_source(ReplayPoseSource::new(
                vec![Frame::with_user(170.0, 60.0, 150.0); 100],
                FRAME_STEP,
            ))
            .with_actuator(Arc::new(Wedged))
            .build()
            .unwrap();

        let token = CancellationToken::new();
        let stop = token.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            stop.cancel();
        });
        match runtime.run_until(token).await {
            Err(RuntimeError::GraceExceeded { grace, stuck }) => {
                assert_eq!(grace, Duration::from_secs(2));
                assert_eq!(stuck, vec![FRAME]);
            }
            other => panic!("expected grace exceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_build_requires_sensors() {
        let err = RuntimeBuilder::new(Config::default())
            .with_pose_source(ReplayPoseSource::new(Vec::new(), FRAME_STEP))
            .build()
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "runtime_missing");

        let err = RuntimeBuilder::new(Config::default())
            .with_range_sensor(chest_readings())
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeError::Missing { missing: "pose source" }));
    }
}
