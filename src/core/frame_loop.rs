//! # FrameLoop: the pose node.
//!
//! Drives the [`RepStateMachine`] from three inputs and carries out what it asks
//! for:
//!
//! ```text
//!   PoseSource::next_frame() ──┐
//!   bus posture signals ───────┼──► RepStateMachine ──► Output
//!   timer tick ────────────────┘                          ├─ Publish      → Link::publish
//!                                                         ├─ Feedback     → ActuatorSet::dispatch
//!                                                         ├─ Snapshot     → PoseSource::request_snapshot
//!                                                         └─ SessionEnded → RecorderHandoff::submit
//! ```
//!
//! ## Rules
//! - Bus events win over frames, frames win over timer ticks (`biased` select).
//! - Actuators and the recorder never block the loop.
//! - When the pose source closes, a running session ends and the loop returns.
//! - On cancellation a running session is ended and handed to the recorder;
//!   in-flight records are drained before the loop returns.

use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actuators::ActuatorSet;
use crate::config::Config;
use crate::error::{SensorError, TaskError};
use crate::events::Payload;
use crate::recorder::RecorderHandoff;
use crate::sensors::{Frame, PoseSource};
use crate::session::{EndReason, Output, RepStateMachine};

use super::link::Link;

/// Frame-side loop.
pub struct FrameLoop {
    link: Link,
    source: Box<dyn PoseSource>,
    machine: RepStateMachine,
    actuators: ActuatorSet,
    recorder: Option<RecorderHandoff>,
    timer_tick: Duration,
}

/// What one select round produced.
enum Step {
    Outputs(Vec<Output>),
    SourceClosed(Vec<Output>),
}

impl FrameLoop {
    /// `link` should listen on [`Topic::Posture`](crate::Topic::Posture).
    pub fn new(
        cfg: &Config,
        link: Link,
        source: Box<dyn PoseSource>,
        actuators: ActuatorSet,
        recorder: Option<RecorderHandoff>,
    ) -> Self {
        Self {
            link,
            source,
            machine: RepStateMachine::new(cfg),
            actuators,
            recorder,
            timer_tick: cfg.timer_tick.max(Duration::from_millis(1)),
        }
    }

    /// Runs until the pose source closes, `ctx` is cancelled, or the bus link is
    /// lost for good.
    pub async fn run(mut self, ctx: CancellationToken) -> Result<(), TaskError> {
        self.link.connect(&ctx).await?;
        let mut tick = time::interval(self.timer_tick);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(source = self.source.name(), "frame loop started");

        let result = loop {
            let step = tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(TaskError::Canceled),
                ev = self.link.recv(&ctx) => ev.map(|ev| match ev.payload {
                    Payload::Posture(signal) => {
                        Step::Outputs(self.machine.on_posture(now(), signal))
                    }
                    _ => Step::Outputs(Vec::new()),
                }),
                frame = self.source.next_frame() => Ok(self.on_frame(frame)),
                _ = tick.tick() => Ok(Step::Outputs(self.machine.poll_timer(now()))),
            };
            match step {
                Ok(Step::Outputs(outputs)) => {
                    if let Err(e) = self.apply(outputs, &ctx).await {
                        break Err(e);
                    }
                }
                Ok(Step::SourceClosed(outputs)) => {
                    break self.apply(outputs, &ctx).await;
                }
                Err(e) => break Err(e),
            }
        };

        let result = match result {
            Err(TaskError::Canceled) => Ok(()),
            other => other,
        };
        self.finish(&ctx).await;
        result
    }

    fn on_frame(&mut self, frame: Result<Option<Frame>, SensorError>) -> Step {
        match frame {
            Ok(Some(frame)) => Step::Outputs(self.machine.on_frame(now(), &frame)),
            Ok(None) => {
                info!(source = self.source.name(), "pose source closed");
                Step::SourceClosed(self.machine.end(EndReason::SourceClosed))
            }
            Err(e) if e.is_transient() => {
                debug!(error = e.as_label(), "pose frame skipped");
                Step::Outputs(Vec::new())
            }
            Err(e) => {
                warn!(error = e.as_label(), detail = %e, "pose source failed");
                Step::SourceClosed(self.machine.end(EndReason::SourceClosed))
            }
        }
    }

    async fn apply(&mut self, outputs: Vec<Output>, ctx: &CancellationToken) -> Result<(), TaskError> {
        for output in outputs {
            match output {
                Output::Publish(ev) => self.link.publish(ev, ctx).await?,
                Output::Feedback(cue) => self.actuators.dispatch(&cue),
                Output::Snapshot(flagged) => {
                    info!(
                        attempt = flagged.attempt,
                        issue = flagged.issue.as_str(),
                        "snapshot requested"
                    );
                    self.source.request_snapshot(&flagged);
                }
                Output::SessionEnded(report) => match self.recorder.as_mut() {
                    Some(recorder) => recorder.submit(report),
                    None => debug!(
                        session = %report.record.session_id,
                        "no recorder configured; session not persisted"
                    ),
                },
            }
        }
        Ok(())
    }

    async fn finish(mut self, ctx: &CancellationToken) {
        let outputs = self.machine.end(EndReason::Shutdown);
        if let Err(e) = self.apply(outputs, ctx).await {
            debug!(error = e.as_label(), "final session events not published");
        }
        self.actuators.shutdown().await;
        if let Some(recorder) = self.recorder.take() {
            recorder.drain().await;
        }
        info!("frame loop stopped");
    }
}

fn now() -> std::time::Instant {
    time::Instant::now().into_std()
}
