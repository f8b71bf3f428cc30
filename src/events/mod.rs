//! Bus events: wire contract and transport.
//!
//! This module groups the event **data model** shared by both nodes and the
//! **transport** used to move it between them.
//!
//! ## Contents
//! - [`Topic`], [`Payload`], [`Event`] topic-addressed events and their wire encoding
//! - [`StatusMessage`], [`Direction`], [`PostureSignal`] the three payload enums
//! - [`Transport`], [`Subscription`] the publish/subscribe seam
//! - [`Bus`] in-process transport over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Frame node publishes**: `status`, `direction`.
//! - **Range node publishes**: `posture`.
//! - **Frame node consumes**: `posture`.
//! - **Range node consumes**: `status`, `direction`.

mod bus;
mod event;

pub use bus::{Bus, Subscription, Transport};
pub use event::{Direction, Event, Payload, PostureSignal, QualityLevel, StatusMessage, Topic};
