//! Retry policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized reconnects
//!
//! ## Quick wiring
//! ```text
//! Config { reconnect: BackoffPolicy, persist_retry: BackoffPolicy }
//!      ├─► core::link::Link     uses reconnect.next(n) between subscribe attempts
//!      └─► recorder::RecorderHandoff uses persist_retry.next(n) between writes
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
