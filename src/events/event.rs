//! # Bus events exchanged between the range node and the frame node.
//!
//! Three topics form the stable wire contract:
//!
//! | Topic | Wire name | Payloads |
//! |---|---|---|
//! | [`Topic::Status`] | `pushup/status` | `No user detected`, `User detected`, `User in position`, `Start`, `Push up counted`, `Straighten Back`, `Straighten Arms`, `End` |
//! | [`Topic::Direction`] | `pushup/direction` | `up`, `down` |
//! | [`Topic::Posture`] | `pushup/badposture` | `Bad posture`, `Attempt counted`, `Bottom reached` |
//!
//! `Attempt counted` is the wire spelling of "top reached": the range node cannot
//! tell a good rep from a bad one, it only reports that the body is back at the top.
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases monotonically.
//! The bus gives **no** cross-topic ordering; consumers must not depend on it.
//!
//! ## Example
//! ```rust
//! use repvisor::{Event, PostureSignal, Topic};
//!
//! let ev = Event::posture(PostureSignal::BottomReached);
//! let (topic, payload) = ev.encode();
//! assert_eq!(topic, "pushup/badposture");
//! assert_eq!(payload, b"Bottom reached");
//!
//! let back = Event::decode(topic, &payload).unwrap();
//! assert_eq!(back.topic(), Topic::Posture);
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::error::BusError;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Named channel on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Session lifecycle and user-facing outcomes (frame node → everyone).
    Status,
    /// Asserted movement direction (frame node → range node).
    Direction,
    /// Range evidence: top, bottom, wrong-way movement (range node → frame node).
    Posture,
}

impl Topic {
    /// All topics, in wire order.
    pub const ALL: [Topic; 3] = [Topic::Status, Topic::Direction, Topic::Posture];

    /// Topic name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Status => "pushup/status",
            Topic::Direction => "pushup/direction",
            Topic::Posture => "pushup/badposture",
        }
    }

    /// Parses a wire topic name.
    pub fn from_wire(name: &str) -> Option<Topic> {
        Topic::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

/// Delivery guarantee requested from the transport (MQTT-style levels).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityLevel {
    /// Fire and forget.
    AtMostOnce,
    /// Delivered, possibly duplicated.
    AtLeastOnce,
    /// Delivered once.
    #[default]
    ExactlyOnce,
}

impl QualityLevel {
    /// Numeric level (0, 1, 2) as used by brokers.
    pub fn as_u8(&self) -> u8 {
        match self {
            QualityLevel::AtMostOnce => 0,
            QualityLevel::AtLeastOnce => 1,
            QualityLevel::ExactlyOnce => 2,
        }
    }
}

/// Payloads of the `status` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
    NoUser,
    UserDetected,
    UserInPosition,
    Start,
    RepCounted,
    StraightenBack,
    StraightenArms,
    End,
}

impl StatusMessage {
    const ALL: [StatusMessage; 8] = [
        StatusMessage::NoUser,
        StatusMessage::UserDetected,
        StatusMessage::UserInPosition,
        StatusMessage::Start,
        StatusMessage::RepCounted,
        StatusMessage::StraightenBack,
        StatusMessage::StraightenArms,
        StatusMessage::End,
    ];

    /// Payload on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusMessage::NoUser => "No user detected",
            StatusMessage::UserDetected => "User detected",
            StatusMessage::UserInPosition => "User in position",
            StatusMessage::Start => "Start",
            StatusMessage::RepCounted => "Push up counted",
            StatusMessage::StraightenBack => "Straighten Back",
            StatusMessage::StraightenArms => "Straighten Arms",
            StatusMessage::End => "End",
        }
    }

    fn from_wire(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == raw)
    }
}

/// Asserted movement direction. The frame node owns it; the range node follows it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Down,
    Up,
}

impl Direction {
    /// Payload on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up => "up",
        }
    }

    /// The opposite direction.
    pub fn flipped(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
        }
    }

    fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "down" => Some(Direction::Down),
            "up" => Some(Direction::Up),
            _ => None,
        }
    }
}

/// Payloads of the `posture` topic: timing evidence from the rangefinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureSignal {
    /// The body moved against the asserted direction for several readings.
    BadPosture,
    /// The body is back at the calibrated top.
    TopReached,
    /// The body is at the calibrated bottom.
    BottomReached,
}

impl PostureSignal {
    /// Payload on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureSignal::BadPosture => "Bad posture",
            PostureSignal::TopReached => "Attempt counted",
            PostureSignal::BottomReached => "Bottom reached",
        }
    }

    fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "Bad posture" => Some(PostureSignal::BadPosture),
            "Attempt counted" => Some(PostureSignal::TopReached),
            "Bottom reached" => Some(PostureSignal::BottomReached),
            _ => None,
        }
    }
}

/// Typed payload; its variant determines the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Status(StatusMessage),
    Direction(Direction),
    Posture(PostureSignal),
}

impl Payload {
    /// Topic this payload travels on.
    pub fn topic(&self) -> Topic {
        match self {
            Payload::Status(_) => Topic::Status,
            Payload::Direction(_) => Topic::Direction,
            Payload::Posture(_) => Topic::Posture,
        }
    }

    /// Payload on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Payload::Status(m) => m.as_str(),
            Payload::Direction(d) => d.as_str(),
            Payload::Posture(p) => p.as_str(),
        }
    }
}

/// Bus event with delivery metadata.
///
/// - `seq`: monotonic process-wide sequence (local only, not sent on the wire)
/// - `at`: wall-clock timestamp (for logs)
#[derive(Debug, Clone)]
pub struct Event {
    /// Process-wide, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// What happened.
    pub payload: Payload,
    /// Requested delivery guarantee.
    pub qos: QualityLevel,
}

impl Event {
    /// Creates a new event with current timestamp, next sequence number and
    /// exactly-once delivery.
    pub fn new(payload: Payload) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            payload,
            qos: QualityLevel::ExactlyOnce,
        }
    }

    /// Shorthand for a `status` event.
    #[inline]
    pub fn status(msg: StatusMessage) -> Self {
        Self::new(Payload::Status(msg))
    }

    /// Shorthand for a `direction` event.
    #[inline]
    pub fn direction(dir: Direction) -> Self {
        Self::new(Payload::Direction(dir))
    }

    /// Shorthand for a `posture` event.
    #[inline]
    pub fn posture(signal: PostureSignal) -> Self {
        Self::new(Payload::Posture(signal))
    }

    /// Overrides the delivery guarantee.
    #[inline]
    pub fn with_qos(mut self, qos: QualityLevel) -> Self {
        self.qos = qos;
        self
    }

    /// Topic of this event.
    #[inline]
    pub fn topic(&self) -> Topic {
        self.payload.topic()
    }

    /// Encodes the event as `(topic name, payload bytes)` for a broker.
    pub fn encode(&self) -> (&'static str, Vec<u8>) {
        (self.topic().as_str(), self.payload.as_str().as_bytes().to_vec())
    }

    /// Decodes a broker message. Surrounding whitespace is ignored.
    ///
    /// Fails with [`BusError::Decode`] for unknown topics or payloads (including
    /// the empty payload used to clear retained messages).
    pub fn decode(topic: &str, payload: &[u8]) -> Result<Event, BusError> {
        let raw = String::from_utf8_lossy(payload);
        let text = raw.trim();
        let decoded = match Topic::from_wire(topic) {
            Some(Topic::Status) => StatusMessage::from_wire(text).map(Payload::Status),
            Some(Topic::Direction) => Direction::from_wire(text).map(Payload::Direction),
            Some(Topic::Posture) => PostureSignal::from_wire(text).map(Payload::Posture),
            None => None,
        };
        decoded.map(Event::new).ok_or_else(|| BusError::Decode {
            topic: topic.to_string(),
            payload: raw.into_owned(),
        })
    }
}
