//! Session persistence.
//!
//! - [`SessionRecorder`] trait for stores
//! - [`MemoryRecorder`] / [`JsonFileRecorder`] built-in stores
//! - [`RecorderHandoff`] background writes with bounded retry

mod handoff;
mod json_file;
mod memory;
mod store;

pub use handoff::{RecorderHandoff, persist_with_retry};
pub use json_file::JsonFileRecorder;
pub use memory::MemoryRecorder;
pub use store::SessionRecorder;
