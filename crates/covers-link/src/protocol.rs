//! # Realtime Protocol
//!
//! Frames exchanged over the platform socket.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Platform Socket Frames                             │
//! │                                                                         │
//! │  PUSH EVENTS (platform → POS)                                          │
//! │  ────────────────────────────                                          │
//! │  {"emit": ["order_created", {"order_id": "o-1", ...}]}                 │
//! │  {"emit": ["table_allocation", {"checkin_id": "c-9", ...}]}            │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  POS      ───► "primus::ping::1718000000000"                           │
//! │  Platform ◄─── "primus::pong::1718000000000"                           │
//! │                                                                         │
//! │  DECODE STEPS                                                          │
//! │  ────────────                                                          │
//! │  text ──► pong marker? ──yes──► Frame::Pong                            │
//! │             │ no                                                        │
//! │             ▼                                                           │
//! │  JSON ──► emit[0] known? ──no──► Frame::Unknown (logged, dropped)      │
//! │             │ yes                                                       │
//! │             ▼                                                           │
//! │  emit[1] ──► EventData (absent fields stay None)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{LinkError, LinkResult};

/// Prefix of an outbound heartbeat.
pub const PING_PREFIX: &str = "primus::ping::";

/// Substring that marks an inbound heartbeat answer.
pub const PONG_MARKER: &str = "primus::pong::";

// =============================================================================
// Event Kinds
// =============================================================================

/// The closed set of push events the platform emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OrderCreated,
    TransactionCreated,
    TransactionUpdated,
    MemberCreated,
    MemberUpdated,
    BookingCreated,
    BookingUpdated,
    BookingDeleted,
    ConsumerCheckin,
    ConsumerCheckout,
    TableAllocation,
}

impl EventKind {
    /// Every kind, in wire order. The registry checks coverage against this.
    pub const ALL: [EventKind; 11] = [
        EventKind::OrderCreated,
        EventKind::TransactionCreated,
        EventKind::TransactionUpdated,
        EventKind::MemberCreated,
        EventKind::MemberUpdated,
        EventKind::BookingCreated,
        EventKind::BookingUpdated,
        EventKind::BookingDeleted,
        EventKind::ConsumerCheckin,
        EventKind::ConsumerCheckout,
        EventKind::TableAllocation,
    ];

    /// Wire name of the event.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "order_created",
            EventKind::TransactionCreated => "transaction_created",
            EventKind::TransactionUpdated => "transaction_updated",
            EventKind::MemberCreated => "member_created",
            EventKind::MemberUpdated => "member_updated",
            EventKind::BookingCreated => "booking_created",
            EventKind::BookingUpdated => "booking_updated",
            EventKind::BookingDeleted => "booking_deleted",
            EventKind::ConsumerCheckin => "consumer_checkin",
            EventKind::ConsumerCheckout => "consumer_checkout",
            EventKind::TableAllocation => "table_allocation",
        }
    }

    /// Looks up a kind by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        EventKind::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Field that a bare `id` in the payload stands for.
    fn primary_field(&self) -> PrimaryField {
        match self {
            EventKind::OrderCreated => PrimaryField::Order,
            EventKind::TransactionCreated | EventKind::TransactionUpdated => {
                PrimaryField::Transaction
            }
            EventKind::MemberCreated | EventKind::MemberUpdated => PrimaryField::Member,
            EventKind::BookingCreated | EventKind::BookingUpdated | EventKind::BookingDeleted => {
                PrimaryField::Booking
            }
            EventKind::ConsumerCheckin
            | EventKind::ConsumerCheckout
            | EventKind::TableAllocation => PrimaryField::Checkin,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum PrimaryField {
    Order,
    Transaction,
    Member,
    Booking,
    Checkin,
}

// =============================================================================
// Event Data
// =============================================================================

/// Typed fields pulled out of an event payload.
///
/// Every field is optional: each event kind only carries a few of them and
/// a missing field is never a decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventData {
    pub order_id: Option<String>,
    pub checkin_id: Option<String>,
    pub consumer_id: Option<String>,
    pub transaction_id: Option<String>,
    pub status: Option<String>,
    pub member_id: Option<String>,
    pub booking_id: Option<String>,
    pub table_name: Option<String>,
    pub location_id: Option<String>,
}

impl EventData {
    /// Materializes the typed record from a decoded payload map.
    pub fn from_payload(kind: EventKind, payload: &Map<String, Value>) -> Self {
        let mut data = EventData {
            order_id: text_field(payload, "order_id"),
            checkin_id: text_field(payload, "checkin_id"),
            consumer_id: text_field(payload, "consumer_id"),
            transaction_id: text_field(payload, "transaction_id"),
            status: text_field(payload, "status"),
            member_id: text_field(payload, "member_id"),
            booking_id: text_field(payload, "booking_id"),
            table_name: text_field(payload, "table_name")
                .or_else(|| text_field(payload, "table")),
            location_id: text_field(payload, "location_id"),
        };

        if let Some(id) = text_field(payload, "id") {
            let slot = match kind.primary_field() {
                PrimaryField::Order => &mut data.order_id,
                PrimaryField::Transaction => &mut data.transaction_id,
                PrimaryField::Member => &mut data.member_id,
                PrimaryField::Booking => &mut data.booking_id,
                PrimaryField::Checkin => &mut data.checkin_id,
            };
            if slot.is_none() {
                *slot = Some(id);
            }
        }

        data
    }
}

/// Reads a string or number field as text; anything else counts as absent.
fn text_field(payload: &Map<String, Value>, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Frames
// =============================================================================

/// A decoded push event.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformEvent {
    pub kind: EventKind,
    pub data: EventData,
    /// The untouched payload, for handlers that need more than `data`.
    pub payload: Value,
}

/// What an inbound text frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Heartbeat answer.
    Pong,
    Event(PlatformEvent),
    /// Well-formed envelope with an event name this build does not handle.
    Unknown { name: String },
}

/// Decodes one inbound text frame.
///
/// ## Errors
/// Returns `SerializationFailed` when the frame is neither a pong nor a
/// `{"emit": [name, payload]}` envelope.
pub fn decode_frame(text: &str) -> LinkResult<Frame> {
    if is_pong(text) {
        return Ok(Frame::Pong);
    }

    let root: Value = serde_json::from_str(text)?;
    let emit = root
        .get("emit")
        .and_then(Value::as_array)
        .ok_or_else(|| LinkError::SerializationFailed("frame has no emit array".into()))?;

    let name = emit
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| LinkError::SerializationFailed("emit array has no event name".into()))?;

    let Some(kind) = EventKind::from_name(name) else {
        return Ok(Frame::Unknown {
            name: name.to_string(),
        });
    };

    let payload = emit.get(1).cloned().unwrap_or(Value::Null);
    let data = match &payload {
        Value::Object(map) => EventData::from_payload(kind, map),
        _ => EventData::default(),
    };

    Ok(Frame::Event(PlatformEvent {
        kind,
        data,
        payload,
    }))
}

/// True when a frame is a heartbeat answer.
pub fn is_pong(text: &str) -> bool {
    text.contains(PONG_MARKER)
}

/// Builds the outbound heartbeat frame: a JSON string literal.
pub fn ping_frame(epoch_millis: i64) -> String {
    format!("\"{}{}\"", PING_PREFIX, epoch_millis)
}

// =============================================================================
// Unit Tests
// =============================================================================
