//! # Session results.
//!
//! [`SessionRecord`] is the persisted summary; its JSON shape is the contract
//! with whatever store sits behind a [`SessionRecorder`](crate::recorder::SessionRecorder):
//!
//! ```text
//! {
//!   "sessionId": "3f2c…",
//!   "timestamp": 1760870400000,
//!   "stats": { "repCount": 12, "attemptCount": 14, "successRate": 85.71, "duration": 60 },
//!   "flaggedAttemptCount": 2
//! }
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::attempt::FormIssue;

/// Counters of one finished session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub rep_count: u32,
    pub attempt_count: u32,
    /// Percentage of attempts that counted, `0.0..=100.0`.
    pub success_rate: f64,
    /// Session budget, serialized in whole seconds.
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,
}

impl SessionStats {
    pub fn compute(rep_count: u32, attempt_count: u32, duration: Duration) -> Self {
        let success_rate = 100.0 * f64::from(rep_count) / f64::from(attempt_count.max(1));
        Self {
            rep_count,
            attempt_count,
            success_rate,
            duration,
        }
    }
}

/// Snapshot taken when an attempt is first tainted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedAttempt {
    /// Index of the tainted attempt.
    pub attempt: u32,
    pub issue: FormIssue,
    /// Unix time in milliseconds.
    pub at_ms: u64,
}

/// Persisted summary of one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: Uuid,
    /// Unix time in milliseconds when the session ended.
    pub timestamp: u64,
    pub stats: SessionStats,
    pub flagged_attempt_count: u32,
}

/// What ended a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    UserLost,
    TimerExpired,
    /// The pose source ran dry.
    SourceClosed,
    /// The device is shutting down.
    Shutdown,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::UserLost => "user_lost",
            EndReason::TimerExpired => "timer_expired",
            EndReason::SourceClosed => "source_closed",
            EndReason::Shutdown => "shutdown",
        }
    }
}

/// Everything handed to the recorder when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub reason: EndReason,
    pub record: SessionRecord,
    pub flagged: Vec<FlaggedAttempt>,
}

/// Milliseconds since the Unix epoch; clocks before 1970 read as zero.
pub fn unix_ms(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn as_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}
