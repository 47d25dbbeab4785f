//! # POS Contracts
//!
//! The callbacks a POS vendor implements. The engine calls into these and
//! never the other way round.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    ReconciliationEngine                                 │
//! │                                                                         │
//! │   order events ────────► OrderingManager     confirm / pay / record    │
//! │   transaction events ──► TransactionManager  ready-to-pay / settle     │
//! │   member events ───────► RewardManager       loyalty notifications     │
//! │   seating + bookings ──► ReservationManager  tables / checkins         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method returns [`CoreResult`]. An `Err` from a callback never
//! escapes autonomous event handling: the engine answers the platform with a
//! rejection instead.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use covers_core::{
    Booking, Checkin, Confirmation, Consumer, CoreError, CoreResult, Member, Money,
    OperatingMode, Order, TableAllocation, TableDecision, Transaction,
};

// =============================================================================
// Ordering
// =============================================================================

/// Order lifecycle callbacks.
#[async_trait]
pub trait OrderingManager: Send + Sync {
    /// A new platform order without attached payments.
    async fn confirm_new_order(&self, order: &Order, consumer: &Consumer)
        -> CoreResult<Confirmation>;

    /// A new platform order that already carries payments.
    async fn confirm_new_order_with_full_payment(
        &self,
        order: &Order,
        consumer: &Consumer,
        transactions: &[Transaction],
    ) -> CoreResult<Confirmation>;

    /// Whether the kitchen can take a new or pending order in `mode`.
    async fn confirm_order_availability(
        &self,
        order: &Order,
        mode: OperatingMode,
    ) -> CoreResult<Confirmation>;

    async fn order_cancelled(&self, order: &Order) -> CoreResult<()>;

    /// Returns the order with totals as the POS computes them.
    async fn confirm_order_totals(&self, order: &Order) -> CoreResult<Order>;

    async fn record_full_check_payment(&self, order: &Order) -> CoreResult<()>;

    /// The platform settles part of the check; `remainder` is left for the till.
    async fn record_partial_check_payment(&self, order: &Order, remainder: Money)
        -> CoreResult<()>;

    async fn record_order_id(&self, pos_order_id: &str, order_id: &str) -> CoreResult<()>;

    async fn record_order_version(&self, pos_order_id: &str, version: &str) -> CoreResult<()>;

    async fn record_order_updated_at(
        &self,
        order_id: &str,
        updated_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    /// The POS order currently open for a checkin, if any.
    async fn order_by_checkin(&self, checkin_id: &str) -> CoreResult<Option<Order>>;
}

// =============================================================================
// Transactions
// =============================================================================

#[async_trait]
pub trait TransactionManager: Send + Sync {
    /// `Some` with the transaction to request, or `None` to decline.
    async fn ready_to_pay(&self, transaction: &Transaction) -> CoreResult<Option<Transaction>>;

    async fn record_transaction_version(
        &self,
        transaction_id: &str,
        version: &str,
    ) -> CoreResult<()>;

    async fn payment_completed(&self, transaction: &Transaction) -> CoreResult<()>;

    async fn cancel_payment(&self, transaction: &Transaction) -> CoreResult<()>;
}

// =============================================================================
// Loyalty
// =============================================================================

#[async_trait]
pub trait RewardManager: Send + Sync {
    async fn member_created(&self, member: &Member) -> CoreResult<()>;

    async fn member_updated(&self, member: &Member) -> CoreResult<()>;
}

// =============================================================================
// Seating & Bookings
// =============================================================================

#[async_trait]
pub trait ReservationManager: Send + Sync {
    async fn booking_created(&self, booking: &Booking) -> CoreResult<()>;

    async fn booking_updated(&self, booking: &Booking) -> CoreResult<()>;

    async fn booking_deleted(&self, booking_id: &str) -> CoreResult<()>;

    async fn consumer_checked_in(&self, checkin: &Checkin) -> CoreResult<()>;

    async fn consumer_checked_out(&self, checkin_id: &str) -> CoreResult<()>;

    async fn confirm_table_allocation(
        &self,
        allocation: &TableAllocation,
    ) -> CoreResult<TableDecision>;
}

// =============================================================================
// Manager Set
// =============================================================================

/// The managers a POS has wired up. A POS without loyalty or seating leaves
/// those slots empty; using an empty slot yields `ManagerNotInitialized`.
#[derive(Clone, Default)]
pub struct PosManagers {
    pub ordering: Option<Arc<dyn OrderingManager>>,
    pub transactions: Option<Arc<dyn TransactionManager>>,
    pub rewards: Option<Arc<dyn RewardManager>>,
    pub reservations: Option<Arc<dyn ReservationManager>>,
}

impl std::fmt::Debug for PosManagers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosManagers")
            .field("ordering", &self.ordering.is_some())
            .field("transactions", &self.transactions.is_some())
            .field("rewards", &self.rewards.is_some())
            .field("reservations", &self.reservations.is_some())
            .finish()
    }
}

impl PosManagers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ordering(mut self, manager: Arc<dyn OrderingManager>) -> Self {
        self.ordering = Some(manager);
        self
    }

    pub fn with_transactions(mut self, manager: Arc<dyn TransactionManager>) -> Self {
        self.transactions = Some(manager);
        self
    }

    pub fn with_rewards(mut self, manager: Arc<dyn RewardManager>) -> Self {
        self.rewards = Some(manager);
        self
    }

    pub fn with_reservations(mut self, manager: Arc<dyn ReservationManager>) -> Self {
        self.reservations = Some(manager);
        self
    }

    pub fn ordering(&self) -> CoreResult<&Arc<dyn OrderingManager>> {
        self.ordering
            .as_ref()
            .ok_or_else(|| CoreError::ManagerNotInitialized("ordering".into()))
    }

    pub fn transactions(&self) -> CoreResult<&Arc<dyn TransactionManager>> {
        self.transactions
            .as_ref()
            .ok_or_else(|| CoreError::ManagerNotInitialized("transaction".into()))
    }

    pub fn rewards(&self) -> CoreResult<&Arc<dyn RewardManager>> {
        self.rewards
            .as_ref()
            .ok_or_else(|| CoreError::ManagerNotInitialized("reward".into()))
    }

    pub fn reservations(&self) -> CoreResult<&Arc<dyn ReservationManager>> {
        self.reservations
            .as_ref()
            .ok_or_else(|| CoreError::ManagerNotInitialized("reservation".into()))
    }
}
