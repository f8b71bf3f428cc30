//! # JsonFileRecorder: append-only JSON lines.
//!
//! One line per session:
//! ```text
//! {"sessionId":"…","timestamp":1760870400000,"stats":{…},"flaggedAttemptCount":1,"flaggedAttempts":[…]}
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::RecorderError;
use crate::session::{FlaggedAttempt, SessionRecord};

use super::SessionRecorder;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Line<'a> {
    #[serde(flatten)]
    record: &'a SessionRecord,
    flagged_attempts: &'a [FlaggedAttempt],
}

/// Appends each session as one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonFileRecorder {
    path: PathBuf,
}

impl JsonFileRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionRecorder for JsonFileRecorder {
    async fn persist(
        &self,
        record: &SessionRecord,
        flagged: &[FlaggedAttempt],
    ) -> Result<(), RecorderError> {
        let mut line = serde_json::to_vec(&Line {
            record,
            flagged_attempts: flagged,
        })
        .map_err(|e| RecorderError::Rejected {
            reason: e.to_string(),
        })?;
        line.push(b'\n');

        let unavailable = |e: std::io::Error| RecorderError::Unavailable {
            reason: format!("{}: {e}", self.path.display()),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(unavailable)?;
        file.write_all(&line).await.map_err(unavailable)?;
        file.flush().await.map_err(unavailable)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;
    use crate::session::{FormIssue, SessionStats};

    fn record(reps: u32, attempts: u32) -> SessionRecord {
        SessionRecord {
            session_id: Uuid::new_v4(),
            timestamp: 1_760_870_400_000,
            stats: SessionStats::compute(reps, attempts, Duration::from_secs(60)),
            flagged_attempt_count: attempts - reps,
        }
    }

    #[tokio::test]
    async fn test_appends_one_line_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let rec = JsonFileRecorder::new(dir.path().join("sessions.jsonl"));

        let first = record(3, 4);
        let flagged = [FlaggedAttempt {
            attempt: 2,
            issue: FormIssue::ElbowAngle,
            at_ms: 7,
        }];
        rec.persist(&first, &flagged).await.unwrap();
        rec.persist(&record(5, 5), &[]).await.unwrap();

        let text = tokio::fs::read_to_string(rec.path()).await.unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["sessionId"], first.session_id.to_string());
        assert_eq!(lines[0]["stats"]["successRate"], 75.0);
        assert_eq!(lines[0]["flaggedAttemptCount"], 1);
        assert_eq!(lines[0]["flaggedAttempts"][0]["issue"], "elbow_angle");
        assert_eq!(lines[1]["stats"]["repCount"], 5);
    }

    #[tokio::test]
    async fn test_missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let rec = JsonFileRecorder::new(dir.path().join("nope").join("sessions.jsonl"));
        let err = rec.persist(&record(1, 1), &[]).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
