//! Range-side state: baseline calibration and direction tracking.
//!
//! Everything here is owned by the range loop alone. It talks to the frame loop
//! only through bus events, so none of these types are `Sync`-shared.
//!
//! - [`BaselineCalibrator`] latches [`Baseline`] top/bottom once per session
//! - [`DirectionTracker`] turns [`DistanceSample`]s into posture evidence

mod baseline;
mod direction;

pub use baseline::{Baseline, BaselineCalibrator, CalibrationPhase};
pub use direction::{DirectionState, DirectionTracker, DistanceSample};
