//! In-memory recorder for tests and demos.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::RecorderError;
use crate::session::{FlaggedAttempt, SessionRecord};

use super::SessionRecorder;

/// Keeps every persisted session in memory.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    sessions: Mutex<Vec<(SessionRecord, Vec<FlaggedAttempt>)>>,
}

impl MemoryRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persisted records, oldest first.
    pub fn records(&self) -> Vec<SessionRecord> {
        self.lock().iter().map(|(r, _)| r.clone()).collect()
    }

    /// Flagged attempts stored with the record of `session`.
    pub fn flagged(&self, session: uuid::Uuid) -> Vec<FlaggedAttempt> {
        self.lock()
            .iter()
            .find(|(r, _)| r.session_id == session)
            .map(|(_, f)| f.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SessionRecord, Vec<FlaggedAttempt>)>> {
        // a panicking writer cannot leave a half-pushed entry behind
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SessionRecorder for MemoryRecorder {
    async fn persist(
        &self,
        record: &SessionRecord,
        flagged: &[FlaggedAttempt],
    ) -> Result<(), RecorderError> {
        let mut sessions = self.lock();
        if sessions.iter().any(|(r, _)| r.session_id == record.session_id) {
            return Ok(());
        }
        sessions.push((record.clone(), flagged.to_vec()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
