//! # covers-core: Pure Domain Model for Covers
//!
//! This crate holds the entities exchanged between a restaurant POS and the
//! hospitality platform, together with the state graphs that decide which
//! status changes are legal. It performs no I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Covers Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                POS vendor (implements contracts)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ OrderingManager, TransactionManager…   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     covers-link (REST client, WebSocket, reconciliation)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ covers-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   error   │  │ validation│  │   │
//! │  │   │  Order    │  │   Money   │  │ CoreError │  │  write    │  │   │
//! │  │   │  Checkin  │  │  (cents)  │  │           │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • PURE FUNCTIONS                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Order, Transaction, Checkin, TableAllocation, Member…)
//! - [`money`] - Money type with integer arithmetic in minor units
//! - [`error`] - Domain error types raised by POS callbacks and validation
//! - [`validation`] - Checks run before any write leaves the POS
//!
//! ## Example Usage
//!
//! ```rust
//! use covers_core::{Money, OrderStatus};
//!
//! let remainder = Money::from_cents(450);
//! assert!(remainder.is_positive());
//!
//! assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Accepted));
//! assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items accepted on a single order write.
pub const MAX_ORDER_ITEMS: usize = 200;

/// Maximum quantity of a single line item.
pub const MAX_ITEM_QUANTITY: i64 = 999;
