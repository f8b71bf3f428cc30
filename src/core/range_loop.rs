//! # RangeLoop: the rangefinder node.
//!
//! Follows the session lifecycle from the `status` topic, latches the baseline,
//! then samples the rangefinder at a fixed cadence and publishes posture
//! evidence. It never counts reps.
//!
//! ## Lifecycle
//! ```text
//!  status "User in position" ──► reset, calibrate top
//!  status "Start"            ──► calibrate bottom ──► Monitoring(DirectionTracker)
//!  direction "down"/"up"     ──► tracker.set_direction()
//!  status "End"              ──► stop monitoring, discard baseline
//!
//!  Monitoring, every sample_interval:
//!    read_distance() ──► tracker.observe() ──► publish posture signals
//! ```
//!
//! ## Rules
//! - Bus events are handled before the next sample (`biased` select).
//! - A calibration failure leaves the loop idle until the next session.
//! - An unavailable sensor stops monitoring; the loop itself keeps running.
//! - Only an exhausted bus link ends the loop with an error.

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CalibrationError, TaskError};
use crate::events::{Direction, Event, Payload, StatusMessage};
use crate::sensors::{RangeSensor, read_distance};
use crate::tracking::{BaselineCalibrator, CalibrationPhase, DirectionTracker, DistanceSample};

use super::link::Link;

/// Range-side sampling loop.
pub struct RangeLoop {
    cfg: Config,
    link: Link,
    sensor: Box<dyn RangeSensor>,
    calibrator: BaselineCalibrator,
    tracker: Option<DirectionTracker>,
    direction: Direction,
}

impl RangeLoop {
    /// `link` should listen on [`Topic::Status`](crate::Topic::Status) and
    /// [`Topic::Direction`](crate::Topic::Direction).
    pub fn new(cfg: &Config, link: Link, sensor: Box<dyn RangeSensor>) -> Self {
        Self {
            cfg: cfg.clone(),
            link,
            sensor,
            calibrator: BaselineCalibrator::new(cfg),
            tracker: None,
            direction: Direction::Down,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.tracker.is_some()
    }

    /// Runs until `ctx` is cancelled or the bus link is lost for good.
    pub async fn run(mut self, ctx: CancellationToken) -> Result<(), TaskError> {
        self.link.connect(&ctx).await?;
        let mut tick = time::interval(self.cfg.sample_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(sensor = self.sensor.name(), "range loop started");

        loop {
            let monitoring = self.tracker.is_some();
            let step = tokio::select! {
                biased;
                _ = ctx.cancelled() => Err(TaskError::Canceled),
                ev = self.link.recv(&ctx) => match ev {
                    Ok(ev) => self.on_event(ev, &ctx).await,
                    Err(e) => Err(e),
                },
                _ = tick.tick(), if monitoring => self.sample(&ctx).await,
            };
            match step {
                Ok(()) => {}
                Err(TaskError::Canceled) => break,
                Err(e) => return Err(e),
            }
        }
        info!("range loop stopped");
        Ok(())
    }

    async fn on_event(&mut self, ev: Event, ctx: &CancellationToken) -> Result<(), TaskError> {
        match ev.payload {
            Payload::Status(StatusMessage::UserInPosition) => {
                self.reset();
                self.calibrate(CalibrationPhase::Top, ctx).await?;
            }
            Payload::Status(StatusMessage::Start) => {
                self.calibrate(CalibrationPhase::Bottom, ctx).await?;
                match self.calibrator.baseline() {
                    Some(baseline) => {
                        let mut tracker = DirectionTracker::new(baseline, &self.cfg);
                        tracker.set_direction(self.direction);
                        self.tracker = Some(tracker);
                        info!(top = baseline.top, bottom = baseline.bottom, "monitoring started");
                    }
                    None => warn!("no complete baseline; not monitoring this session"),
                }
            }
            Payload::Status(StatusMessage::End) => {
                if self.tracker.is_some() {
                    info!("monitoring stopped");
                }
                self.reset();
            }
            Payload::Direction(dir) => {
                self.direction = dir;
                if let Some(tracker) = self.tracker.as_mut() {
                    tracker.set_direction(dir);
                }
                debug!(direction = dir.as_str(), "direction asserted");
            }
            _ => {}
        }
        Ok(())
    }

    /// Calibration failures are logged, not propagated; only cancellation is.
    async fn calibrate(
        &mut self,
        phase: CalibrationPhase,
        ctx: &CancellationToken,
    ) -> Result<(), TaskError> {
        match self
            .calibrator
            .calibrate(phase, self.sensor.as_mut(), ctx)
            .await
        {
            Ok(_) => Ok(()),
            Err(CalibrationError::Canceled) => Err(TaskError::Canceled),
            Err(e) => {
                warn!(%phase, error = e.as_label(), detail = %e, "calibration failed");
                Ok(())
            }
        }
    }

    async fn sample(&mut self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let Some(tracker) = self.tracker.as_mut() else {
            return Ok(());
        };
        match read_distance(self.sensor.as_mut(), self.cfg.sensor_timeout).await {
            Ok(distance) => {
                let signals = tracker.observe(DistanceSample::now(distance));
                for signal in signals {
                    debug!(distance, signal = signal.as_str(), "posture evidence");
                    self.link.publish(Event::posture(signal), ctx).await?;
                }
            }
            Err(e) if e.is_transient() => {
                debug!(error = e.as_label(), "range sample skipped");
            }
            Err(e) => {
                warn!(error = e.as_label(), detail = %e, "range sensor unavailable; monitoring stopped");
                self.tracker = None;
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.tracker = None;
        self.calibrator.reset();
        self.direction = Direction::Down;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::events::{Bus, PostureSignal, Subscription, Topic};
    use crate::sensors::ScriptedRangeSensor;

    struct Node {
        bus: Bus,
        watcher: Subscription,
        ctx: CancellationToken,
        handle: tokio::task::JoinHandle<Result<(), TaskError>>,
    }

    async fn spawn(sensor: ScriptedRangeSensor) -> Node {
        let cfg = Config::default();
        let bus = Bus::new(64);
        let watcher = bus.subscribe_to(&[Topic::Posture]);
        let ctx = CancellationToken::new();
        let mut link = Link::new(
            Arc::new(bus.clone()),
            &[Topic::Status, Topic::Direction],
            &cfg,
        );
        link.connect(&ctx).await.unwrap();
        let node = RangeLoop::new(&cfg, link, Box::new(sensor));
        let handle = tokio::spawn(node.run(ctx.clone()));
        Node {
            bus,
            watcher,
            ctx,
            handle,
        }
    }

    fn start(bus: &Bus, direction: Direction) {
        bus.publish(Event::status(StatusMessage::UserInPosition));
        bus.publish(Event::status(StatusMessage::Start));
        bus.publish(Event::direction(direction));
    }

    fn drain(watcher: &mut Subscription) -> Vec<PostureSignal> {
        let mut out = Vec::new();
        while let Some(ev) = watcher.try_recv().unwrap() {
            if let Payload::Posture(signal) = ev.payload {
                out.push(signal);
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_bottom_while_descending() {
        let mut node = spawn(ScriptedRangeSensor::new([40.0, 5.0, 30.0, 20.0, 8.0])).await;
        start(&node.bus, Direction::Down);
        time::sleep(Duration::from_secs(2)).await;

        assert_eq!(drain(&mut node.watcher), vec![PostureSignal::BottomReached]);
        node.ctx.cancel();
        assert!(node.handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_top_once_while_ascending() {
        let mut node = spawn(ScriptedRangeSensor::new([40.0, 5.0, 10.0, 25.0, 38.0, 41.0])).await;
        start(&node.bus, Direction::Up);
        time::sleep(Duration::from_secs(2)).await;

        assert_eq!(drain(&mut node.watcher), vec![PostureSignal::TopReached]);
        node.ctx.cancel();
        assert!(node.handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_bad_posture_on_third_wrong_reading() {
        let mut node = spawn(ScriptedRangeSensor::new([40.0, 5.0, 20.0, 23.0, 26.0, 29.0])).await;
        start(&node.bus, Direction::Down);
        time::sleep(Duration::from_secs(2)).await;

        assert_eq!(drain(&mut node.watcher), vec![PostureSignal::BadPosture]);
        node.ctx.cancel();
        assert!(node.handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_stops_monitoring() {
        let mut node = spawn(ScriptedRangeSensor::new([40.0, 5.0]).repeat_last()).await;
        start(&node.bus, Direction::Down);
        time::sleep(Duration::from_secs(1)).await;
        assert!(drain(&mut node.watcher).contains(&PostureSignal::BottomReached));

        node.bus.publish(Event::status(StatusMessage::End));
        time::sleep(Duration::from_millis(10)).await;
        drain(&mut node.watcher);
        time::sleep(Duration::from_secs(2)).await;
        assert!(drain(&mut node.watcher).is_empty());

        node.ctx.cancel();
        assert!(node.handle.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_calibration_keeps_loop_alive() {
        // nothing ever qualifies as bottom
        let mut node = spawn(ScriptedRangeSensor::new([40.0, 60.0]).repeat_last()).await;
        start(&node.bus, Direction::Down);
        time::sleep(Duration::from_secs(15)).await;
        assert!(drain(&mut node.watcher).is_empty());
        assert!(!node.handle.is_finished());

        node.ctx.cancel();
        assert!(node.handle.await.unwrap().is_ok());
    }
}
