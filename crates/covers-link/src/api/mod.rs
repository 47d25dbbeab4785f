//! # Platform REST API
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          api module                                     │
//! │                                                                         │
//! │  ReconciliationEngine ──► dyn PlatformApi ──► PlatformClient            │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │                                          HttpTransport::send            │
//! │                                                  │                      │
//! │                                          Endpoint::url (paths)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine only sees [`PlatformApi`], so tests drive it with a recording
//! fake instead of a server.

pub mod client;
pub mod endpoint;
pub mod http;

use async_trait::async_trait;
use covers_core::{
    Booking, Checkin, Location, Member, Order, PlatformSettings, PointsRedeem, Product, Reward,
    Surcount, TableAllocation, TableRejectionReason, Transaction,
};

use crate::error::LinkResult;

pub use client::PlatformClient;
pub use endpoint::{Endpoint, Resource};
pub use http::HttpTransport;

/// Typed operations against the platform.
///
/// Every write returns the entity as the platform stored it, so the caller
/// can pick up the new version token.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    // =========================================================================
    // Orders
    // =========================================================================
    /// GET /orders/{id}, consumer embedded.
    async fn get_order(&self, order_id: &str) -> LinkResult<Order>;

    /// GET /unlinked_orders
    async fn get_unlinked_orders(&self) -> LinkResult<Vec<Order>>;

    /// POST /orders, for POS-created orders only.
    async fn create_order(&self, order: &Order) -> LinkResult<Order>;

    /// PUT /orders/{id}
    async fn put_order(&self, order: &Order) -> LinkResult<Order>;

    /// PUT /orders/{id} with status rejected and a reason.
    async fn reject_order(&self, order: &Order, reason: &str) -> LinkResult<Order>;

    /// GET /orders/{id}/transactions
    async fn get_order_transactions(&self, order_id: &str) -> LinkResult<Vec<Transaction>>;

    // =========================================================================
    // Transactions
    // =========================================================================
    /// GET /transactions/{id}
    async fn get_transaction(&self, transaction_id: &str) -> LinkResult<Transaction>;

    /// POST /orders/{id}/transactions
    async fn create_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction>;

    /// PUT /orders/{id}/transactions/{tx} with status waiting.
    async fn request_payment(&self, transaction: &Transaction) -> LinkResult<Transaction>;

    /// PUT /orders/{id}/transactions/{tx} with status cancelled and a reason.
    async fn reject_payment(
        &self,
        transaction: &Transaction,
        reason: &str,
    ) -> LinkResult<Transaction>;

    /// PUT /transactions/{id} with status complete.
    async fn complete_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction>;

    /// PUT /transactions/{id} with status cancelled.
    async fn cancel_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction>;

    // =========================================================================
    // Loyalty
    // =========================================================================
    async fn get_member(&self, member_id: &str) -> LinkResult<Member>;

    async fn create_member(&self, member: &Member) -> LinkResult<Member>;

    async fn update_member(&self, member: &Member) -> LinkResult<Member>;

    async fn delete_member(&self, member_id: &str) -> LinkResult<()>;

    /// GET /members/{id}/rewards
    async fn get_rewards(&self, member_id: &str) -> LinkResult<Vec<Reward>>;

    /// POST /members/{id}/rewards
    async fn redeem_points(&self, member_id: &str, redeem: &PointsRedeem) -> LinkResult<Member>;

    /// POST /members/{id}/rewards/{reward}
    async fn redeem_reward(
        &self,
        member_id: &str,
        reward_id: &str,
        order_id: &str,
    ) -> LinkResult<Member>;

    // =========================================================================
    // Seating
    // =========================================================================
    async fn get_checkin(&self, checkin_id: &str) -> LinkResult<Checkin>;

    async fn list_checkins(&self) -> LinkResult<Vec<Checkin>>;

    async fn delete_checkin(&self, checkin_id: &str) -> LinkResult<()>;

    async fn list_tables(&self) -> LinkResult<Vec<TableAllocation>>;

    /// PUT /tables/{name} with status confirmed.
    async fn confirm_table(&self, allocation: &TableAllocation) -> LinkResult<TableAllocation>;

    /// DELETE /tables/{name} carrying the checkin and a reason.
    async fn delete_table(
        &self,
        allocation: &TableAllocation,
        reason: TableRejectionReason,
    ) -> LinkResult<()>;

    async fn get_booking(&self, booking_id: &str) -> LinkResult<Booking>;

    // =========================================================================
    // Location & Menu
    // =========================================================================
    async fn get_location(&self) -> LinkResult<Location>;

    async fn get_menu(&self) -> LinkResult<Vec<Product>>;

    async fn put_menu_products(&self, products: &[Product]) -> LinkResult<()>;

    async fn put_menu_surcounts(&self, surcounts: &[Surcount]) -> LinkResult<()>;

    /// GET /config
    async fn get_settings(&self) -> LinkResult<PlatformSettings>;
}
