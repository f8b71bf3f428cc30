//! # Actuator trait.
//!
//! Provides [`Actuate`], the extension point for anything that shows or says
//! feedback to the user: a character display, LEDs, a buzzer, text-to-speech.
//!
//! Each actuator gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-actuator bounded queue** (capacity via [`Actuate::queue_capacity`])
//! - **Panic isolation** (panics are caught and logged)
//!
//! ## Architecture
//! ```text
//! ActuatorSet ──► [bounded queue] ──► worker task ──► actuator.notify()
//!                                  └─► panic caught → warn! log
//! ```
//!
//! ## Rules
//! - A slow actuator (speech can take seconds) only affects its own queue.
//! - Queue overflow drops the cue **for this actuator only**.
//! - Cues are processed sequentially (FIFO) per actuator.
//! - Actuators never block the frame loop or each other.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use repvisor::{Actuate, Feedback};
//!
//! struct Buzzer;
//!
//! #[async_trait]
//! impl Actuate for Buzzer {
//!     async fn notify(&self, cue: &Feedback) {
//!         if matches!(cue, Feedback::RepCounted { .. }) {
//!             // beep
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "buzzer" }
//!     fn queue_capacity(&self) -> usize { 16 }
//! }
//! ```

use async_trait::async_trait;

use super::Feedback;

/// User-facing output device.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle device errors internally; do not panic.
/// - Slow processing affects only this actuator's queue.
#[async_trait]
pub trait Actuate: Send + Sync + 'static {
    /// Renders a single cue.
    ///
    /// Called from a dedicated worker task, never from the frame loop.
    async fn notify(&self, cue: &Feedback);

    /// Name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose; override it
    /// when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity. Clamped to a minimum of 1.
    ///
    /// Default: 64.
    fn queue_capacity(&self) -> usize {
        64
    }
}
