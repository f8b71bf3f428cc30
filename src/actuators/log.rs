//! # LogActuator: feedback printer
//!
//! A minimal actuator that prints every [`Feedback`] cue to stdout, standing in
//! for display and speaker hardware in demos and on a bench.
//!
//! ## Example output
//! ```text
//! [user-detected] Get into push-up position
//! [ready] You may start
//! [rep] 3
//! [no-count] Hip angle incorrect
//! [tick] 42s
//! [end] reps=12
//! ```

use async_trait::async_trait;

use super::{Actuate, Feedback};

/// Stdout actuator. Enabled via the `logging` feature.
#[derive(Default)]
pub struct LogActuator {
    quiet_ticks: bool,
}

impl LogActuator {
    /// Construct a new [`LogActuator`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppresses the once-per-second countdown lines.
    #[must_use]
    pub fn quiet_ticks(mut self) -> Self {
        self.quiet_ticks = true;
        self
    }
}

#[async_trait]
impl Actuate for LogActuator {
    async fn notify(&self, cue: &Feedback) {
        match cue {
            Feedback::NoUser => println!("[no-user] Waiting for user"),
            Feedback::UserDetected => println!("[user-detected] Get into push-up position"),
            Feedback::Ready => println!("[ready] You may start"),
            Feedback::Start => println!("[start]"),
            Feedback::RepCounted { count } => println!("[rep] {count}"),
            Feedback::NoCount { issue } => println!("[no-count] {issue}"),
            Feedback::StraightenBack => println!("[posture] Straighten back"),
            Feedback::Tick { remaining_secs } => {
                if !self.quiet_ticks {
                    println!("[tick] {remaining_secs}s");
                }
            }
            Feedback::TimesUp => println!("[times-up]"),
            Feedback::End { reps } => println!("[end] reps={reps}"),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
