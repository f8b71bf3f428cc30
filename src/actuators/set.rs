//! # ActuatorSet: non-blocking fan-out over actuators
//!
//! [`ActuatorSet`] distributes each [`Feedback`] cue to every actuator
//! **without awaiting** its rendering.
//!
//! ## What it guarantees
//! - `dispatch(&Feedback)` returns immediately.
//! - Per-actuator FIFO (queue order).
//! - Panics inside actuators are caught and logged (isolation).
//!
//! ## What it does **not** guarantee
//! - No ordering across different actuators.
//! - No retries on per-actuator queue overflow (the cue is dropped for that
//!   actuator).
//!
//! ## Diagram
//! ```text
//!    dispatch(&Feedback)
//!        │
//!        ├────────────────► [queue A1] ─► worker A1 ─► notify()
//!        ├────────────────► [queue A2] ─► worker A2 ─► notify()
//!        └────────────────► [queue AN] ─► worker AN ─► notify()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

use super::{Actuate, Feedback};

struct ActuatorChannel {
    name: &'static str,
    sender: mpsc::Sender<Feedback>,
}

/// Composite fan-out with per-actuator bounded queues and worker tasks.
pub struct ActuatorSet {
    channels: Vec<ActuatorChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl ActuatorSet {
    /// Creates a new set and spawns one worker per actuator.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(actuators: Vec<Arc<dyn Actuate>>) -> Self {
        let mut channels = Vec::with_capacity(actuators.len());
        let mut workers = Vec::with_capacity(actuators.len());

        for act in actuators {
            let cap = act.queue_capacity().max(1);
            let name = act.name();
            let (tx, mut rx) = mpsc::channel::<Feedback>(cap);

            let handle = tokio::spawn(async move {
                while let Some(cue) = rx.recv().await {
                    let fut = act.notify(&cue);
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        warn!(actuator = act.name(), cue = cue.as_label(), panic = ?panic_err, "actuator panicked");
                    }
                }
            });

            channels.push(ActuatorChannel { name, sender: tx });
            workers.push(handle);
        }

        Self { channels, workers }
    }

    /// Fans one cue out to all actuators (non-blocking).
    ///
    /// If an actuator's queue is **full** or **closed**, the cue is dropped for it
    /// and a warning is logged with the actuator's name.
    pub fn dispatch(&self, cue: &Feedback) {
        for channel in &self.channels {
            match channel.sender.try_send(*cue) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(actuator = channel.name, cue = cue.as_label(), "cue dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(actuator = channel.name, cue = cue.as_label(), "cue dropped: worker closed");
                }
            }
        }
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no actuators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of actuators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}
