//! # RecorderHandoff: fire-and-forget persistence.
//!
//! The frame loop hands a finished [`SessionReport`] over and moves on. Each
//! report is written by its own background task:
//!
//! ```text
//! submit(report) ──► spawn ──► persist() ──► Ok ─────────────────► done
//!                                 │
//!                                 ├─► Rejected ──────────────────► warn!, give up
//!                                 └─► Unavailable ─► sleep(backoff) ─► persist() …
//!                                                    (at most max_attempts tries)
//! ```
//!
//! Shutdown calls [`RecorderHandoff::drain`], which waits for writes still in
//! flight. The caller bounds that wait.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, info, warn};

use crate::error::RecorderError;
use crate::policies::BackoffPolicy;
use crate::session::SessionReport;

use super::SessionRecorder;

/// Persists session reports off the frame loop.
pub struct RecorderHandoff {
    recorder: Arc<dyn SessionRecorder>,
    backoff: BackoffPolicy,
    max_attempts: u32,
    inflight: JoinSet<Result<(), RecorderError>>,
}

impl RecorderHandoff {
    pub fn new(recorder: Arc<dyn SessionRecorder>, backoff: BackoffPolicy, max_attempts: u32) -> Self {
        Self {
            recorder,
            backoff,
            max_attempts: max_attempts.max(1),
            inflight: JoinSet::new(),
        }
    }

    /// Starts persisting `report` in the background. Never blocks.
    pub fn submit(&mut self, report: SessionReport) {
        let recorder = Arc::clone(&self.recorder);
        let backoff = self.backoff;
        let max_attempts = self.max_attempts;
        self.inflight.spawn(async move {
            persist_with_retry(recorder.as_ref(), &report, &backoff, max_attempts).await
        });
        // reap finished writes so the set does not grow with every session
        while let Some(done) = self.inflight.try_join_next() {
            log_outcome(done);
        }
    }

    /// Writes still in flight.
    pub fn pending(&self) -> usize {
        self.inflight.len()
    }

    /// Waits for all in-flight writes.
    pub async fn drain(mut self) {
        while let Some(done) = self.inflight.join_next().await {
            log_outcome(done);
        }
    }
}

fn log_outcome(done: Result<Result<(), RecorderError>, tokio::task::JoinError>) {
    match done {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = e.as_label(), detail = %e, "session record lost"),
        Err(e) => warn!(error = %e, "recorder task failed"),
    }
}

/// Persists one report, retrying retryable failures with `backoff`.
///
/// Returns the last error when every attempt failed or the store rejected the
/// record.
pub async fn persist_with_retry(
    recorder: &dyn SessionRecorder,
    report: &SessionReport,
    backoff: &BackoffPolicy,
    max_attempts: u32,
) -> Result<(), RecorderError> {
    let max_attempts = max_attempts.max(1);
    let session = report.record.session_id;
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match recorder.persist(&report.record, &report.flagged).await {
            Ok(()) => {
                info!(recorder = recorder.name(), %session, attempt, "session persisted");
                return Ok(());
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff.next(attempt - 1);
                debug!(
                    recorder = recorder.name(),
                    %session,
                    attempt,
                    ?delay,
                    error = e.as_label(),
                    "persist failed, retrying"
                );
                time::sleep(delay).await;
            }
            Err(e) => {
                warn!(recorder = recorder.name(), %session, attempt, error = e.as_label(), "persist gave up");
                return Err(e);
            }
        }
    }
}
