//! # Reconciliation Engine
//!
//! Keeps POS and platform in agreement about orders, payments, seating,
//! bookings and loyalty.
//!
//! ## Order Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Order Reconciliation                                 │
//! │                                                                         │
//! │  order_created ──► GET order + transactions                             │
//! │                        │                                                │
//! │         linked/terminal? ──yes──► Skipped (redelivery)                  │
//! │                        │                                                │
//! │         dine_in? ──────yes──► handle_order_status                       │
//! │                        │                                                │
//! │         unsupported? ──yes──► reject order + pending payments           │
//! │                        │                                                │
//! │         consumer resolves? ──no──► reject                               │
//! │                        │                                                │
//! │         POS confirms? ──no/err──► reject                                │
//! │                        │                                                │
//! │         PUT accepted ──► record id + version ──► complete payments      │
//! │                                                                         │
//! │  Every path ends in an accept or a reject call: the platform is never   │
//! │  left waiting on a pushed order.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Submodules
//! - [`orders`] - order-created, order-status and payment requests
//! - [`transactions`] - pending and terminal payments
//! - [`loyalty`] - members, rewards, redemptions
//! - [`seating`] - checkins, table allocations, bookings
//! - [`ledger`] - version tokens and at-most-once creation
//! - [`handler`] - routes channel events into the engine

pub mod handler;
pub mod ledger;
pub mod loyalty;
pub mod orders;
pub mod seating;
pub mod transactions;

use std::sync::Arc;

use covers_core::{
    Location, OperatingMode, Order, OrderType, PlatformSettings, Product, Surcount, Transaction,
};
use tracing::{debug, info, warn, Instrument, Span};

use crate::api::PlatformApi;
use crate::config::LinkConfig;
use crate::contracts::PosManagers;
use crate::error::LinkResult;
use ledger::{CreationGuard, SettledTransactions, VersionKey, VersionLedger};

pub use handler::EngineHandler;

// =============================================================================
// Outcomes
// =============================================================================

/// How an order workflow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderOutcome {
    /// Accepted on the platform.
    Accepted,
    /// Payment requested and recorded on the POS.
    AwaitingPayment,
    Rejected,
    Cancelled,
    /// A newer write won (404/409); nothing more to do.
    Superseded,
    /// Already linked, terminal, or a status needing no action.
    Skipped,
}

/// How a transaction workflow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    PaymentRequested,
    Rejected,
    Completed,
    Cancelled,
    Skipped,
}

/// Tally of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    fn record(&mut self, outcome: OrderOutcome) {
        match outcome {
            OrderOutcome::Accepted | OrderOutcome::AwaitingPayment => self.accepted += 1,
            OrderOutcome::Rejected | OrderOutcome::Cancelled => self.rejected += 1,
            OrderOutcome::Superseded | OrderOutcome::Skipped => self.skipped += 1,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Order, payment and seating reconciliation between POS and platform.
pub struct ReconciliationEngine {
    api: Arc<dyn PlatformApi>,
    managers: PosManagers,
    mode: OperatingMode,
    supported_types: Vec<OrderType>,
    versions: VersionLedger,
    creations: CreationGuard,
    settled: SettledTransactions,
    span: Span,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("mode", &self.mode)
            .field("supported_types", &self.supported_types)
            .field("managers", &self.managers)
            .finish_non_exhaustive()
    }
}

impl ReconciliationEngine {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        managers: PosManagers,
        mode: OperatingMode,
        supported_types: Vec<OrderType>,
        span: Span,
    ) -> Self {
        ReconciliationEngine {
            api,
            managers,
            mode,
            supported_types,
            versions: VersionLedger::new(),
            creations: CreationGuard::new(),
            settled: SettledTransactions::new(),
            span,
        }
    }

    pub fn from_config(
        api: Arc<dyn PlatformApi>,
        managers: PosManagers,
        config: &LinkConfig,
        span: Span,
    ) -> Self {
        Self::new(
            api,
            managers,
            config.mode(),
            config.pos.supported_order_types.clone(),
            span,
        )
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn supports(&self, order_type: OrderType) -> bool {
        self.supported_types.contains(&order_type)
    }

    /// Latest version token recorded for an order.
    pub fn order_version(&self, order_id: &str) -> Option<String> {
        self.versions.latest(&VersionKey::Order(order_id.to_string()))
    }

    /// Latest version token recorded for a transaction.
    pub fn transaction_version(&self, transaction_id: &str) -> Option<String> {
        self.versions
            .latest(&VersionKey::Transaction(transaction_id.to_string()))
    }

    // =========================================================================
    // Version Bookkeeping
    // =========================================================================

    fn stamp_order(&self, order: &mut Order) {
        if let Some(id) = order.id.as_deref() {
            if let Some(version) = self.versions.latest(&VersionKey::Order(id.to_string())) {
                order.version = Some(version);
            }
        }
    }

    fn stamp_transaction(&self, transaction: &mut Transaction) {
        if let Some(id) = transaction.id.as_deref() {
            if let Some(version) = self
                .versions
                .latest(&VersionKey::Transaction(id.to_string()))
            {
                transaction.version = Some(version);
            }
        }
    }

    /// Drops what the engine tracks for an order that reached a terminal
    /// state.
    fn forget_order(&self, order_id: &str, pos_id: Option<&str>) {
        self.versions.forget(&VersionKey::Order(order_id.to_string()));
        if let Some(pos_id) = pos_id {
            self.creations.forget(pos_id);
        }
        debug!(order_id = %order_id, "Order finished, ledger entries dropped");
    }

    /// Records the version of a written order and hands it to the POS.
    async fn absorb_order(&self, written: &Order, pos_id: Option<&str>) {
        let Some(id) = written.id.as_deref() else {
            return;
        };
        let pos_id = pos_id.or(written.pos_id.as_deref());

        if written.status.is_terminal() {
            self.forget_order(id, pos_id);
        }
        let Some(version) = written.version.as_deref() else {
            return;
        };
        if !written.status.is_terminal() {
            self.versions
                .record(VersionKey::Order(id.to_string()), version);
        }

        let Some(pos_id) = pos_id else {
            return;
        };
        let recorded = match self.managers.ordering() {
            Ok(ordering) => ordering.record_order_version(pos_id, version).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            warn!(order_id = %id, error = %e, "POS did not record order version");
        }
    }

    /// Records the version of a written transaction and hands it to the POS.
    async fn absorb_transaction(&self, written: &Transaction) {
        let (Some(id), Some(version)) = (written.id.as_deref(), written.version.as_deref()) else {
            return;
        };
        let key = VersionKey::Transaction(id.to_string());
        if written.status.is_terminal() {
            self.versions.forget(&key);
        } else {
            self.versions.record(key, version);
        }

        let recorded = match self.managers.transactions() {
            Ok(manager) => manager.record_transaction_version(id, version).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            warn!(transaction_id = %id, error = %e, "POS did not record transaction version");
        }
    }

    /// PUT with the latest known version.
    async fn write_order(&self, order: &Order) -> LinkResult<Order> {
        let mut outgoing = order.clone();
        self.stamp_order(&mut outgoing);
        let written = self.api.put_order(&outgoing).await?;
        self.absorb_order(&written, order.pos_id.as_deref()).await;
        Ok(written)
    }

    // =========================================================================
    // Reconciliation Sweep
    // =========================================================================

    /// Replays order-created handling for every unlinked order.
    ///
    /// Recovers pushes missed while the socket was down. Runs on every
    /// (re)connect; one failing order does not stop the sweep.
    pub async fn refresh_all_orders(&self) -> LinkResult<SweepReport> {
        self.sweep().instrument(self.span.clone()).await
    }

    async fn sweep(&self) -> LinkResult<SweepReport> {
        let unlinked = self.api.get_unlinked_orders().await?;
        let mut report = SweepReport::default();

        for order in unlinked {
            report.examined += 1;
            let Some(order_id) = order.id.clone() else {
                warn!("Unlinked order without id, skipping");
                report.failed += 1;
                continue;
            };

            let transactions = match self.api.get_order_transactions(&order_id).await {
                Ok(transactions) => transactions,
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Could not load transactions");
                    report.failed += 1;
                    continue;
                }
            };

            match self.process_new_order(order, transactions).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Sweep could not settle order");
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            accepted = report.accepted,
            rejected = report.rejected,
            failed = report.failed,
            "Reconciliation sweep finished"
        );
        Ok(report)
    }

    // =========================================================================
    // Menu, Location & Settings
    // =========================================================================

    /// Publishes the POS menu: products first, then surcounts.
    pub async fn publish_menu(&self, products: &[Product], surcounts: &[Surcount]) -> LinkResult<()> {
        self.api.put_menu_products(products).await?;
        self.api.put_menu_surcounts(surcounts).await?;
        info!(
            products = products.len(),
            surcounts = surcounts.len(),
            "Menu published"
        );
        Ok(())
    }

    pub async fn menu(&self) -> LinkResult<Vec<Product>> {
        self.api.get_menu().await
    }

    pub async fn location(&self) -> LinkResult<Location> {
        self.api.get_location().await
    }

    pub async fn settings(&self) -> LinkResult<PlatformSettings> {
        self.api.get_settings().await
    }
}
