//! # Publish/subscribe transport.
//!
//! [`Transport`] is the minimal capability both sampling loops need: publish an
//! [`Event`] and open a topic-filtered [`Subscription`]. [`Bus`] is the in-process
//! implementation, a thin wrapper around [`tokio::sync::broadcast`]; a broker
//! adapter (MQTT or similar) implements the same trait and feeds decoded
//! messages into a broadcast channel of its own.
//!
//! ## Architecture
//! ```text
//! Publishers:                        Subscribers:
//!   FrameLoop ── status/direction ──┐
//!                                   ├──► Bus ──► Subscription(topics) ──► RangeLoop
//!   RangeLoop ── posture ───────────┘       └──► Subscription(topics) ──► FrameLoop
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `Bus::publish` never waits.
//! - **Bounded capacity**: one ring buffer for all receivers.
//! - **Lag handling**: a lagging subscription logs how many events it skipped and keeps going.
//! - **No persistence**: events published while nobody is subscribed are lost.
//! - **Disconnect**: once every sender is gone, `recv` fails with [`BusError::Disconnected`].

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::warn;

use super::event::{Event, Topic};
use crate::error::BusError;

/// Minimal publish/subscribe capability.
///
/// ### Implementation requirements
/// - `publish` must not wait on subscribers.
/// - `subscribe` must only deliver events published after it returns.
/// - Link failures are reported as [`BusError::Disconnected`]; callers reconnect
///   by calling `subscribe` again.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Publishes one event.
    async fn publish(&self, ev: Event) -> Result<(), BusError>;

    /// Opens a new subscription restricted to `topics`.
    async fn subscribe(&self, topics: &[Topic]) -> Result<Subscription, BusError>;

    /// Returns the transport name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Topic-filtered stream of events.
pub struct Subscription {
    topics: Vec<Topic>,
    rx: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Wraps a broadcast receiver, keeping only events on `topics`.
    pub fn new(topics: &[Topic], rx: broadcast::Receiver<Event>) -> Self {
        Self {
            topics: topics.to_vec(),
            rx,
        }
    }

    /// Topics this subscription accepts.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Waits for the next matching event.
    ///
    /// Cancel-safe: dropping the future loses nothing.
    pub async fn recv(&mut self) -> Result<Event, BusError> {
        loop {
            match self.rx.recv().await {
                Ok(ev) if self.topics.contains(&ev.topic()) => return Ok(ev),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, topics = ?self.topics, "subscription lagged; events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(BusError::Disconnected {
                        reason: "channel closed".to_string(),
                    });
                }
            }
        }
    }

    /// Returns the next matching event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<Event>, BusError> {
        loop {
            match self.rx.try_recv() {
                Ok(ev) if self.topics.contains(&ev.topic()) => return Ok(Some(ev)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, topics = ?self.topics, "subscription lagged; events skipped");
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(BusError::Disconnected {
                        reason: "channel closed".to_string(),
                    });
                }
            }
        }
    }
}

/// In-process broadcast bus.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately (send clones internally).
/// - **Deterministic**: FIFO per receiver, which makes it the test transport too.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active subscriptions.
    ///
    /// If there are no subscriptions the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Opens a subscription synchronously.
    pub fn subscribe_to(&self, topics: &[Topic]) -> Subscription {
        Subscription::new(topics, self.tx.subscribe())
    }
}

#[async_trait]
impl Transport for Bus {
    async fn publish(&self, ev: Event) -> Result<(), BusError> {
        Bus::publish(self, ev);
        Ok(())
    }

    async fn subscribe(&self, topics: &[Topic]) -> Result<Subscription, BusError> {
        Ok(self.subscribe_to(topics))
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}
