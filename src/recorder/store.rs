//! # Session recorder trait.
//!
//! [`SessionRecorder`] is the seam between a finished session and whatever
//! stores it: a JSON-lines file, a document database, a web service.
//!
//! Recorders are called from a background task (see
//! [`RecorderHandoff`](super::RecorderHandoff)), never from the frame loop, so a
//! slow store never delays rep counting.

use async_trait::async_trait;

use crate::error::RecorderError;
use crate::session::{FlaggedAttempt, SessionRecord};

/// Persistent store for finished sessions.
///
/// ### Implementation requirements
/// - Return [`RecorderError::Unavailable`] for failures that may go away
///   (network, locked file); they are retried with backoff.
/// - Return [`RecorderError::Rejected`] when retrying cannot help.
/// - Writing the same record twice must not corrupt the store.
#[async_trait]
pub trait SessionRecorder: Send + Sync + 'static {
    /// Stores one session summary together with its flagged attempts.
    async fn persist(
        &self,
        record: &SessionRecord,
        flagged: &[FlaggedAttempt],
    ) -> Result<(), RecorderError>;

    /// Name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
