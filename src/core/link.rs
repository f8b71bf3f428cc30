//! # Link: a loop's connection to the bus.
//!
//! Wraps a [`Transport`] with the subscription a loop needs and keeps it alive.
//! A dropped connection is never silent: it is logged and re-established with
//! [`BackoffPolicy`] delays, and the subscription is restored before the loop
//! sees the next event.
//!
//! ## Failure handling
//! ```text
//! recv() / publish()
//!   ├─ Ok                      → failures = 0
//!   ├─ Decode (recv)           → skip message, keep link
//!   └─ Disconnected / Rejected → failures += 1
//!          ├─ failures > max_reconnects → TaskError::Fatal (loop ends)
//!          └─ sleep(backoff.next(failures - 1)) → resubscribe → retry
//! ```
//!
//! Cancellation aborts any backoff sleep with [`TaskError::Canceled`].

use std::sync::Arc;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{BusError, TaskError};
use crate::events::{Event, QualityLevel, Subscription, Topic, Transport};
use crate::policies::BackoffPolicy;

/// Self-healing subscription plus publish path of one loop.
pub struct Link {
    transport: Arc<dyn Transport>,
    topics: Vec<Topic>,
    sub: Option<Subscription>,
    backoff: BackoffPolicy,
    limit: Option<u32>,
    qos: QualityLevel,
    failures: u32,
}

impl Link {
    /// Creates an unconnected link listening on `topics`.
    pub fn new(transport: Arc<dyn Transport>, topics: &[Topic], cfg: &Config) -> Self {
        Self {
            transport,
            topics: topics.to_vec(),
            sub: None,
            backoff: cfg.reconnect,
            limit: cfg.reconnect_limit(),
            qos: cfg.quality,
            failures: 0,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sub.is_some()
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Consecutive link failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Subscribes if not subscribed yet.
    pub async fn connect(&mut self, ctx: &CancellationToken) -> Result<(), TaskError> {
        while self.sub.is_none() {
            match self.transport.subscribe(&self.topics).await {
                Ok(sub) => {
                    if self.failures > 0 {
                        info!(
                            transport = self.transport.name(),
                            topics = ?self.topics,
                            after = self.failures,
                            "bus link restored"
                        );
                    }
                    self.failures = 0;
                    self.sub = Some(sub);
                }
                Err(e) => self.back_off(e, ctx).await?,
            }
        }
        Ok(())
    }

    /// Drops the current subscription and subscribes again.
    pub async fn resubscribe(&mut self, ctx: &CancellationToken) -> Result<(), TaskError> {
        self.sub = None;
        self.connect(ctx).await
    }

    /// Waits for the next event on the link's topics, reconnecting as needed.
    ///
    /// Cancel-safe once connected.
    pub async fn recv(&mut self, ctx: &CancellationToken) -> Result<Event, TaskError> {
        loop {
            self.connect(ctx).await?;
            let Some(sub) = self.sub.as_mut() else {
                continue;
            };
            match sub.recv().await {
                Ok(ev) => return Ok(ev),
                Err(e) if e.is_link_failure() => {
                    self.sub = None;
                    self.back_off(e, ctx).await?;
                }
                Err(e) => debug!(error = %e, "undecodable bus message skipped"),
            }
        }
    }

    /// Publishes `ev` with the configured delivery quality, retrying link
    /// failures with backoff.
    pub async fn publish(&mut self, ev: Event, ctx: &CancellationToken) -> Result<(), TaskError> {
        let ev = ev.with_qos(self.qos);
        loop {
            match self.transport.publish(ev.clone()).await {
                Ok(()) => {
                    self.failures = 0;
                    debug!(topic = ev.topic().as_str(), payload = ev.payload.as_str(), "published");
                    return Ok(());
                }
                Err(e) if e.is_link_failure() => self.back_off(e, ctx).await?,
                Err(e) => {
                    warn!(error = %e, topic = ev.topic().as_str(), "event dropped");
                    return Ok(());
                }
            }
        }
    }

    async fn back_off(&mut self, err: BusError, ctx: &CancellationToken) -> Result<(), TaskError> {
        self.failures += 1;
        if let Some(limit) = self.limit
            && self.failures > limit
        {
            error!(
                transport = self.transport.name(),
                failures = self.failures,
                error = err.as_label(),
                "bus unreachable; giving up"
            );
            return Err(TaskError::Fatal {
                reason: format!(
                    "{} unreachable after {limit} reconnects: {err}",
                    self.transport.name()
                ),
            });
        }
        let delay = self.backoff.next(self.failures - 1);
        warn!(
            transport = self.transport.name(),
            attempt = self.failures,
            ?delay,
            error = err.as_label(),
            "bus link failed; reconnecting"
        );
        tokio::select! {
            _ = ctx.cancelled() => Err(TaskError::Canceled),
            _ = time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::events::{Bus, Direction, Payload, PostureSignal, StatusMessage};

    /// Bus that fails on demand.
    pub(crate) struct FlakyTransport {
        pub(crate) bus: Bus,
        pub(crate) failing_subscribes: Mutex<u32>,
        pub(crate) failing_publishes: Mutex<u32>,
    }

    impl FlakyTransport {
        pub(crate) fn new(bus: Bus, subscribes: u32, publishes: u32) -> Self {
            Self {
                bus,
                failing_subscribes: Mutex::new(subscribes),
                failing_publishes: Mutex::new(publishes),
            }
        }

        fn take(counter: &Mutex<u32>) -> bool {
            let mut n = counter.lock().unwrap();
            if *n > 0 {
                *n -= 1;
                true
            } else {
                false
            }
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn publish(&self, ev: Event) -> Result<(), BusError> {
            if Self::take(&self.failing_publishes) {
                return Err(BusError::Disconnected {
                    reason: "broker restarting".into(),
                });
            }
            self.bus.publish(ev);
            Ok(())
        }

        async fn subscribe(&self, topics: &[Topic]) -> Result<Subscription, BusError> {
            if Self::take(&self.failing_subscribes) {
                return Err(BusError::Disconnected {
                    reason: "broker restarting".into(),
                });
            }
            Ok(self.bus.subscribe_to(topics))
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn cfg(max_reconnects: u32) -> Config {
        Config {
            reconnect: BackoffPolicy::constant(Duration::from_millis(100)),
            max_reconnects,
            ..Config::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_with_backoff() {
        let bus = Bus::new(16);
        let flaky = Arc::new(FlakyTransport::new(bus.clone(), 3, 0));
        let mut link = Link::new(flaky, &[Topic::Posture], &cfg(8));
        let ctx = CancellationToken::new();

        let started = time::Instant::now();
        link.connect(&ctx).await.unwrap();
        assert!(link.is_connected());
        assert_eq!(link.failures(), 0);
        assert!(started.elapsed() >= Duration::from_millis(300));

        bus.publish(Event::posture(PostureSignal::BottomReached));
        let ev = link.recv(&ctx).await.unwrap();
        assert_eq!(ev.payload, Payload::Posture(PostureSignal::BottomReached));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_reconnects_are_fatal() {
        let flaky = Arc::new(FlakyTransport::new(Bus::new(16), 10, 0));
        let mut link = Link::new(flaky, &[Topic::Status], &cfg(2));
        let err = link.connect(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.as_label(), "task_fatal");
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_survives_outage() {
        let bus = Bus::new(16);
        let mut watcher = bus.subscribe_to(&[Topic::Direction]);
        let flaky = Arc::new(FlakyTransport::new(bus.clone(), 0, 2));
        let mut link = Link::new(flaky, &[Topic::Posture], &cfg(8));
        let ctx = CancellationToken::new();

        link.publish(Event::direction(Direction::Up), &ctx).await.unwrap();
        let ev = watcher.recv().await.unwrap();
        assert_eq!(ev.payload, Payload::Direction(Direction::Up));
        assert_eq!(ev.qos, QualityLevel::ExactlyOnce);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_restores_delivery() {
        let bus = Bus::new(16);
        let flaky = Arc::new(FlakyTransport::new(bus.clone(), 0, 0));
        let mut link = Link::new(flaky, &[Topic::Status], &cfg(8));
        let ctx = CancellationToken::new();
        link.connect(&ctx).await.unwrap();

        link.resubscribe(&ctx).await.unwrap();
        bus.publish(Event::status(StatusMessage::Start));
        let ev = link.recv(&ctx).await.unwrap();
        assert_eq!(ev.payload, Payload::Status(StatusMessage::Start));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let flaky = Arc::new(FlakyTransport::new(Bus::new(16), 100, 0));
        let mut link = Link::new(flaky, &[Topic::Status], &cfg(0));
        let ctx = CancellationToken::new();
        let child = ctx.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_secs(1)).await;
            child.cancel();
        });
        let err = link.connect(&ctx).await.unwrap_err();
        assert!(matches!(err, TaskError::Canceled));
    }
}
