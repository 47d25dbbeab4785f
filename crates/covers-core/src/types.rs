//! # Domain Types
//!
//! Entities exchanged between the POS and the hospitality platform.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │  Transaction    │   │    Checkin      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (platform)  │◄──│  order_id       │   │  id             │       │
//! │  │  pos_id (local) │   │  amount (cents) │   │  consumer_id    │       │
//! │  │  status         │   │  status         │   │  location_id    │       │
//! │  │  checkin_id ────┼──►│  version        │   │  expires_at     │       │
//! │  │  version        │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ TableAllocation │   │ Member / Reward │   │ Booking         │       │
//! │  │  table_name     │   │  PointsRedeem   │   │ Location        │       │
//! │  │  status         │   │                 │   │ Product         │       │
//! │  │  rejection      │   │                 │   │ PlatformSettings│       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Linked vs Unlinked
//! An order that arrives from the platform has an `id` but no `pos_id`: it is
//! *unlinked*. Once the POS accepts it the POS id is written back and the
//! order becomes *linked*. Orders the POS creates itself start with a
//! `pos_id` and no `id` until the first POST returns one.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Order Type
// =============================================================================

/// How the consumer receives the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Delivery,
    Pickup,
    DineIn,
    /// Anything the platform sends that this build does not know about.
    #[serde(other)]
    Unknown,
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::Unknown
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderType::Delivery => "delivery",
            OrderType::Pickup => "pickup",
            OrderType::DineIn => "dine_in",
            OrderType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order.
///
/// ## State Graph
/// ```text
///   new / pending ──confirm──► accepted ──totals──► ready_to_pay
///        │                        │                     │
///        └──decline──► rejected   └──request payment────┤
///                                                       ▼
///                            paid ◄──full── waiting_for_payment ◄─┐
///                                                 └──partial──────┘
///
///   any non-terminal ──cancel──► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Pending,
    Accepted,
    Rejected,
    ReadyToPay,
    WaitingForPayment,
    Paid,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states never change again.
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Rejected | OrderStatus::Paid | OrderStatus::Cancelled
        )
    }

    /// True for the two statuses an order has before the POS answers.
    pub const fn is_awaiting_confirmation(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::Pending)
    }

    /// Checks whether the order state graph allows `self → next`.
    ///
    /// ## Example
    /// ```rust
    /// use covers_core::OrderStatus;
    ///
    /// assert!(OrderStatus::Accepted.can_transition_to(OrderStatus::WaitingForPayment));
    /// assert!(OrderStatus::WaitingForPayment.can_transition_to(OrderStatus::WaitingForPayment));
    /// assert!(!OrderStatus::Rejected.can_transition_to(OrderStatus::Accepted));
    /// ```
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Cancelled {
            return true;
        }

        matches!(
            (self, next),
            (New | Pending, Accepted)
                | (New | Pending, Rejected)
                | (New, Pending)
                | (Accepted, ReadyToPay)
                | (Accepted | ReadyToPay, WaitingForPayment)
                | (WaitingForPayment, WaitingForPayment)
                | (WaitingForPayment, Paid)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::New => "new",
            OrderStatus::Pending => "pending",
            OrderStatus::Accepted => "accepted",
            OrderStatus::Rejected => "rejected",
            OrderStatus::ReadyToPay => "ready_to_pay",
            OrderStatus::WaitingForPayment => "waiting_for_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Consumer
// =============================================================================

/// The guest behind an order or checkin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

// =============================================================================
// Line Items & Surcounts
// =============================================================================

/// One product on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Menu product reference.
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    /// Unit price in cents.
    pub unit_price: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

impl LineItem {
    /// unit_price × quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurcountKind {
    Surcharge,
    Discount,
}

/// An order-level surcharge or discount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surcount {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub kind: SurcountKind,
    pub amount: Money,
}

// =============================================================================
// Order
// =============================================================================

/// An order as the platform sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Platform identifier, absent until the platform assigns one.
    #[serde(default)]
    pub id: Option<String>,

    /// POS-local identifier, absent while the order is unlinked.
    #[serde(default)]
    pub pos_id: Option<String>,

    #[serde(rename = "type", default)]
    pub order_type: OrderType,

    pub status: OrderStatus,

    #[serde(default)]
    pub checkin_id: Option<String>,

    #[serde(default)]
    pub consumer: Option<Consumer>,

    /// Amount settled through the platform, in cents.
    #[serde(default)]
    pub pay_total: Money,

    /// Amount the platform will not collect (paid at the till), in cents.
    #[serde(default)]
    pub not_paying_total: Money,

    #[serde(default)]
    pub items: Vec<LineItem>,

    #[serde(default)]
    pub surcounts: Vec<Surcount>,

    /// Opaque optimistic-concurrency token.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::New
    }
}

impl Order {
    /// Linked orders carry a POS identifier.
    pub fn is_linked(&self) -> bool {
        self.pos_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Whether a remainder is left for the POS to collect.
    pub fn has_remainder(&self) -> bool {
        self.not_paying_total.is_positive()
    }

    /// Sum of line totals plus surcharges minus discounts.
    pub fn computed_total(&self) -> Money {
        let items: Money = self.items.iter().map(LineItem::line_total).sum();
        let surcounts: Money = self
            .surcounts
            .iter()
            .map(|s| match s.kind {
                SurcountKind::Surcharge => s.amount,
                SurcountKind::Discount => Money::zero() - s.amount,
            })
            .sum();
        items + surcounts
    }
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Waiting,
    Complete,
    Cancelled,
}

impl TransactionStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Complete | TransactionStatus::Cancelled)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Waiting => "waiting",
            TransactionStatus::Complete => "complete",
            TransactionStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// A payment against an order, created by either side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub id: Option<String>,
    pub order_id: String,
    /// Payment amount in cents.
    pub amount: Money,
    pub status: TransactionStatus,
    #[serde(default)]
    pub partner_initiated: bool,
    #[serde(default)]
    pub accept_less_than_total: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Checkin
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinStatus {
    Active,
    Expired,
    CheckedOut,
}

/// A consumer's physical presence at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkin {
    pub id: String,
    pub consumer_id: String,
    pub location_id: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub status: CheckinStatus,
    #[serde(default)]
    pub consumer: Option<Consumer>,
}

// =============================================================================
// Table Allocation
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableAllocationStatus {
    WaitingForConfirmation,
    Confirmed,
}

/// Reason codes sent when the POS refuses or removes a table allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableRejectionReason {
    TableDoesNotExist,
    TableOccupied,
    CheckinDeallocatedByPos,
}

impl fmt::Display for TableRejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableRejectionReason::TableDoesNotExist => "table_does_not_exist",
            TableRejectionReason::TableOccupied => "table_occupied",
            TableRejectionReason::CheckinDeallocatedByPos => "checkin_deallocated_by_pos",
        };
        f.write_str(name)
    }
}

/// A checkin seated at a named table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAllocation {
    pub table_name: String,
    pub checkin_id: String,
    #[serde(default)]
    pub consumer_id: Option<String>,
    pub status: TableAllocationStatus,
    #[serde(default)]
    pub rejection_reason: Option<TableRejectionReason>,
}

// =============================================================================
// Loyalty
// =============================================================================

/// A loyalty programme member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub consumer_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub points: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    pub name: String,
    /// Points the reward costs.
    pub cost: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Points spent against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsRedeem {
    pub order_id: String,
    pub points: i64,
    #[serde(default)]
    pub reward_id: Option<String>,
}

// =============================================================================
// Bookings, Location, Menu, Settings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Requested,
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    #[serde(default)]
    pub consumer: Option<Consumer>,
    pub party_size: u32,
    pub start_time: DateTime<Utc>,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// A menu entry published by the POS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

/// Opaque key/value configuration the platform keeps for a location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformSettings(pub BTreeMap<String, serde_json::Value>);

impl PlatformSettings {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

// =============================================================================
// POS Decisions
// =============================================================================

/// Whether the POS auto-requests payment after accepting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Table service: the bill is settled later, partial payments allowed.
    Restaurant,
    /// Counter service: accepted orders are paid in full straight away.
    Bistro,
}

impl Default for OperatingMode {
    fn default() -> Self {
        OperatingMode::Restaurant
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::Restaurant => f.write_str("restaurant"),
            OperatingMode::Bistro => f.write_str("bistro"),
        }
    }
}

/// The POS answer to "can you take this order?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    Accepted { pos_order_id: String },
    Declined { reason: String },
}

/// The POS answer to a table allocation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableDecision {
    Confirm,
    Reject(TableRejectionReason),
}

// =============================================================================
// Unit Tests
// =============================================================================
