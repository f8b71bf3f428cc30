//! Device core: the two sampling loops and their orchestration.
//!
//! The public entry point is [`Runtime`] (built with [`RuntimeBuilder`]), which
//! connects both loops to one transport and owns their lifecycle.
//!
//! Internal modules:
//! - [`link`]: self-healing bus subscription with reconnect backoff;
//! - [`range_loop`]: calibration and direction tracking on the rangefinder;
//! - [`frame_loop`]: the rep state machine fed by pose frames and bus evidence;
//! - [`runtime`]: spawns both loops, handles OS signals and graceful shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod frame_loop;
mod link;
mod range_loop;
mod runtime;
mod shutdown;

pub use frame_loop::FrameLoop;
pub use link::Link;
pub use range_loop::RangeLoop;
pub use runtime::{Runtime, RuntimeBuilder};
pub use shutdown::wait_for_shutdown_signal;
