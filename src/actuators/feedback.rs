//! # Feedback requests for actuators.
//!
//! [`Feedback`] is what the rep state machine asks the outside world to show or
//! say: display text, LEDs, buzzer, voice. Actuators receive it fire-and-forget.

use crate::session::FormIssue;

/// One user-facing cue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Feedback {
    /// Nobody in view.
    NoUser,
    /// Somebody stepped into view; prompt for the push-up position.
    UserDetected,
    /// Ready posture held long enough ("You may start").
    Ready,
    /// Session clock started.
    Start,
    /// A rep was counted; `count` is the session total.
    RepCounted { count: u32 },
    /// An attempt was rejected.
    NoCount { issue: FormIssue },
    /// The back left the straight range mid-attempt.
    StraightenBack,
    /// Whole seconds left in the session.
    Tick { remaining_secs: u64 },
    /// Session clock ran out.
    TimesUp,
    /// Session over; `reps` is the final count.
    End { reps: u32 },
}

impl Feedback {
    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Feedback::NoUser => "no_user",
            Feedback::UserDetected => "user_detected",
            Feedback::Ready => "ready",
            Feedback::Start => "start",
            Feedback::RepCounted { .. } => "rep_counted",
            Feedback::NoCount { .. } => "no_count",
            Feedback::StraightenBack => "straighten_back",
            Feedback::Tick { .. } => "tick",
            Feedback::TimesUp => "times_up",
            Feedback::End { .. } => "end",
        }
    }

    /// Text a voice actuator should speak, if any.
    pub fn spoken(&self) -> Option<String> {
        match self {
            Feedback::Ready => Some("You may start".to_string()),
            Feedback::RepCounted { count } => Some(count.to_string()),
            Feedback::NoCount { .. } => Some("No count".to_string()),
            Feedback::StraightenBack => Some("Straighten back".to_string()),
            Feedback::TimesUp => Some("Times up".to_string()),
            _ => None,
        }
    }
}
