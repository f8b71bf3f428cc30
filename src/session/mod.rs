//! Frame-side session logic.
//!
//! - [`RepStateMachine`] referees reps from pose frames and range evidence
//! - [`SessionTimer`] enforces the fixed session budget
//! - [`Attempt`] / [`FormIssue`] track one descent/ascent cycle
//! - [`SessionRecord`] is what gets persisted when a session ends
//!
//! The machine is pure and synchronous; the frame loop in
//! [`core`](crate::core) drives it and carries out its [`Output`]s.

mod attempt;
mod machine;
mod stats;
mod timer;

pub use attempt::{Attempt, FormIssue};
pub use machine::{Output, RepState, RepStateMachine};
pub use stats::{
    EndReason, FlaggedAttempt, SessionRecord, SessionReport, SessionStats, unix_ms,
};
pub use timer::{SessionTimer, TimerPoll};
