//! Routes decoded channel events into the engine.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, Instrument};

use super::ReconciliationEngine;
use crate::api::client::required;
use crate::error::LinkResult;
use crate::protocol::{EventKind, PlatformEvent};
use crate::realtime::EventHandler;

/// Subscribes the engine to every event kind.
#[derive(Debug, Clone)]
pub struct EngineHandler {
    engine: Arc<ReconciliationEngine>,
}

impl EngineHandler {
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        EngineHandler { engine }
    }

    async fn route(&self, event: &PlatformEvent) -> LinkResult<()> {
        let engine = &self.engine;
        let data = &event.data;

        match event.kind {
            EventKind::OrderCreated => {
                let order_id = required("order_id", data.order_id.as_deref())?;
                let outcome = engine.handle_order_created(order_id).await?;
                debug!(order_id = %order_id, ?outcome, "order_created handled");
            }
            EventKind::TransactionCreated => {
                let id = required("transaction_id", data.transaction_id.as_deref())?;
                engine.handle_transaction_created(id).await?;
            }
            EventKind::TransactionUpdated => {
                let id = required("transaction_id", data.transaction_id.as_deref())?;
                engine.handle_transaction_updated(id).await?;
            }
            EventKind::MemberCreated | EventKind::MemberUpdated => {
                let id = required("member_id", data.member_id.as_deref())?;
                engine.handle_member_event(event.kind, id).await?;
            }
            EventKind::BookingCreated | EventKind::BookingUpdated | EventKind::BookingDeleted => {
                let id = required("booking_id", data.booking_id.as_deref())?;
                engine.handle_booking_event(event.kind, id).await?;
            }
            EventKind::ConsumerCheckin => {
                let id = required("checkin_id", data.checkin_id.as_deref())?;
                engine.handle_checkin(id).await?;
            }
            EventKind::ConsumerCheckout => {
                let id = required("checkin_id", data.checkin_id.as_deref())?;
                engine.handle_checkout(id).await?;
            }
            EventKind::TableAllocation => {
                engine.handle_table_allocation(data).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventHandler for EngineHandler {
    async fn handle(&self, event: &PlatformEvent) -> LinkResult<()> {
        self.route(event).instrument(self.engine.span.clone()).await
    }
}
