//! # covers-link: Platform Link for Covers
//!
//! This crate keeps a restaurant POS and the hospitality platform in
//! agreement about orders, payments, seating, bookings and loyalty.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Link Architecture                                │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  LinkAgent (Main Orchestrator)                   │  │
//! │  │                                                                  │  │
//! │  │  Spawned by the host POS, one per location                       │  │
//! │  │  Refreshes every unlinked order on each socket open              │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ RealtimeChannel│  │ Reconciliation │  │   PlatformClient       │    │
//! │  │                │  │ Engine         │  │                        │    │
//! │  │ Socket with    │  │ Asks the POS,  │  │ Signed REST calls,     │    │
//! │  │ heartbeat and  │─►│ writes back    │─►│ typed HTTP errors      │    │
//! │  │ debounced      │  │ with versions  │  │                        │    │
//! │  │ reconnect      │  │                │  │                        │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  POS contracts: Ordering, Transaction, Reward, Reservation       │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  STATUS EVENTS (to the host POS):                                      │
//! │  • emit_status - socket opened, link degraded or recovered             │
//! │  • emit_error  - connect or refresh failures                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - `LinkAgent` orchestrator
//! - [`api`] - Endpoint table, HTTP transport and typed platform client
//! - [`auth`] - Signed authorization tokens
//! - [`config`] - Link configuration (TOML, environment overrides)
//! - [`contracts`] - Traits the POS implements
//! - [`engine`] - Order, payment, seating and loyalty reconciliation
//! - [`error`] - Link error types
//! - [`protocol`] - Socket frames and event envelopes
//! - [`realtime`] - Socket channel, heartbeat watchdog and event dispatch
//! - [`telemetry`] - Tracing setup and per-component spans
//!
//! ## Usage
//!
//! ```rust,ignore
//! use covers_link::{LinkAgentBuilder, LinkConfig, PosManagers};
//!
//! let config = LinkConfig::load_or_default(None);
//! let managers = PosManagers::new()
//!     .with_ordering(pos.clone())
//!     .with_transactions(pos.clone());
//!
//! let mut agent = LinkAgentBuilder::new(config)
//!     .with_managers(managers)
//!     .build()?;
//! let handle = agent.start().await?;
//!
//! // POS-initiated writes go through the engine
//! handle.engine().update_order(&order).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod api;
pub mod auth;
pub mod config;
pub mod contracts;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod realtime;
pub mod telemetry;

#[cfg(test)]
mod testkit;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{
    LinkAgent, LinkAgentBuilder, LinkAgentHandle, LinkEventEmitter, LinkStatus, NoOpEmitter,
};
pub use api::{PlatformApi, PlatformClient};
pub use config::{LinkConfig, PlatformSettings, PosSettings, RealtimeSettings};
pub use contracts::{
    OrderingManager, PosManagers, RewardManager, ReservationManager, TransactionManager,
};
pub use engine::{OrderOutcome, ReconciliationEngine, SweepReport, TransactionOutcome};
pub use error::{ApiError, ApiErrorKind, LinkError, LinkResult};
pub use protocol::{EventKind, PlatformEvent};
pub use realtime::{ChannelSignal, ChannelState, EventHandler, RealtimeChannel};
pub use telemetry::init_tracing;
