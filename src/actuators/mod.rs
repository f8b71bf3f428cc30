//! Feedback delivery to output devices.
//!
//! - [`Feedback`] cues produced by the rep state machine
//! - [`Actuate`] trait for displays, LEDs, buzzers, speech
//! - [`ActuatorSet`] non-blocking fan-out with per-actuator queues
//! - [`LogActuator`] stdout actuator (feature `logging`)

mod actuate;
mod feedback;
mod set;

#[cfg(feature = "logging")]
mod log;

pub use actuate::Actuate;
pub use feedback::Feedback;
pub use set::ActuatorSet;

#[cfg(feature = "logging")]
pub use log::LogActuator;
