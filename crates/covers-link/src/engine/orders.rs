//! Order workflows: order-created, order-status, payment requests and
//! POS-initiated order writes.

use covers_core::{
    validation::validate_order_for_write, Confirmation, Consumer, CoreError, CoreResult,
    OperatingMode, Order, OrderStatus, Transaction, TransactionStatus,
};
use tracing::{debug, info, warn, Instrument};

use super::{OrderOutcome, ReconciliationEngine};
use crate::api::client::required;
use crate::error::{LinkError, LinkResult};

/// Copy of `order` moved to `next`, if the state graph allows it.
fn transition(order: &Order, next: OrderStatus) -> CoreResult<Order> {
    if !order.status.can_transition_to(next) {
        return Err(CoreError::InvalidTransition {
            order_id: order.id.clone().unwrap_or_default(),
            from: order.status,
            to: next,
        });
    }
    let mut moved = order.clone();
    moved.status = next;
    Ok(moved)
}

impl ReconciliationEngine {
    // =========================================================================
    // Order Created
    // =========================================================================

    /// Handles an `order_created` push for `order_id`.
    ///
    /// A failed fetch is returned as an error; the order stays unlinked and
    /// the next sweep picks it up again.
    pub async fn handle_order_created(&self, order_id: &str) -> LinkResult<OrderOutcome> {
        let order = self.api.get_order(order_id).await?;
        let transactions = self.api.get_order_transactions(order_id).await?;
        self.process_new_order(order, transactions).await
    }

    /// Shared by push handling and the sweep.
    pub(crate) async fn process_new_order(
        &self,
        order: Order,
        transactions: Vec<Transaction>,
    ) -> LinkResult<OrderOutcome> {
        let order_id = required("order.id", order.id.as_deref())?.to_string();

        if order.is_linked() || order.status.is_terminal() {
            debug!(order_id = %order_id, status = %order.status, "Order already settled, skipping");
            return Ok(OrderOutcome::Skipped);
        }

        if order.order_type == covers_core::OrderType::DineIn {
            return self.handle_order_status(order).await;
        }

        if !order.status.is_awaiting_confirmation() {
            debug!(order_id = %order_id, status = %order.status, "Order no longer awaiting confirmation, skipping");
            return Ok(OrderOutcome::Skipped);
        }

        if !self.supports(order.order_type) {
            info!(order_id = %order_id, order_type = %order.order_type, "Rejecting unsupported order type");
            let reason = format!("order type {} is not supported", order.order_type);
            self.reject_new_order(&order, &transactions, &reason).await?;
            return Ok(OrderOutcome::Rejected);
        }

        let consumer = match self.resolve_consumer(&order).await {
            Ok(consumer) => consumer,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "Consumer not resolved, rejecting");
                self.reject_new_order(&order, &transactions, "consumer could not be resolved")
                    .await?;
                return Ok(OrderOutcome::Rejected);
            }
        };

        let accepted = transition(&order, OrderStatus::Accepted)?;
        match self.ask_new_order(&order, &consumer, &transactions).await {
            Ok(Confirmation::Accepted { pos_order_id }) => {
                self.accept_new_order(&order, accepted, &pos_order_id, &transactions)
                    .await
            }
            Ok(Confirmation::Declined { reason }) => {
                info!(order_id = %order_id, reason = %reason, "POS declined order");
                self.reject_new_order(&order, &transactions, &reason).await?;
                Ok(OrderOutcome::Rejected)
            }
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "POS failed to confirm order, rejecting");
                self.reject_new_order(&order, &transactions, &e.to_string())
                    .await?;
                Ok(OrderOutcome::Rejected)
            }
        }
    }

    async fn ask_new_order(
        &self,
        order: &Order,
        consumer: &Consumer,
        transactions: &[Transaction],
    ) -> CoreResult<Confirmation> {
        let ordering = self.managers.ordering()?;
        if transactions.is_empty() {
            ordering.confirm_new_order(order, consumer).await
        } else {
            ordering
                .confirm_new_order_with_full_payment(order, consumer, transactions)
                .await
        }
    }

    /// Embedded consumer first, then the one behind the checkin.
    async fn resolve_consumer(&self, order: &Order) -> LinkResult<Consumer> {
        if let Some(consumer) = &order.consumer {
            return Ok(consumer.clone());
        }
        let checkin_id = order
            .checkin_id
            .as_deref()
            .ok_or_else(|| CoreError::ConsumerNotFound("none".into()))?;

        let checkin = self.api.get_checkin(checkin_id).await?;
        Ok(checkin.consumer.unwrap_or(Consumer {
            id: checkin.consumer_id,
            ..Consumer::default()
        }))
    }

    /// Rejects the order once and every payment still open on it.
    async fn reject_new_order(
        &self,
        order: &Order,
        transactions: &[Transaction],
        reason: &str,
    ) -> LinkResult<()> {
        let mut outgoing = order.clone();
        self.stamp_order(&mut outgoing);
        let rejected = self.api.reject_order(&outgoing, reason).await?;
        self.absorb_order(&rejected, None).await;

        for transaction in transactions.iter().filter(|t| !t.status.is_terminal()) {
            if let Err(e) = self.reject_payment_once(transaction, reason).await {
                warn!(
                    transaction_id = ?transaction.id,
                    error = %e,
                    "Could not reject payment of rejected order"
                );
            }
        }
        Ok(())
    }

    async fn accept_new_order(
        &self,
        order: &Order,
        mut accepted: Order,
        pos_order_id: &str,
        transactions: &[Transaction],
    ) -> LinkResult<OrderOutcome> {
        accepted.pos_id = Some(pos_order_id.to_string());

        let Some(written) = self.write_acceptance(order, &accepted, transactions).await? else {
            return Ok(OrderOutcome::Rejected);
        };
        self.link_pos_order(pos_order_id, &written).await;

        for transaction in transactions.iter().filter(|t| !t.status.is_terminal()) {
            self.complete_payment_once(transaction).await?;
        }

        info!(order_id = ?written.id, pos_order_id = %pos_order_id, "Order accepted");
        Ok(OrderOutcome::Accepted)
    }

    /// PUTs an order the POS has taken. If the write fails, the POS order is
    /// cancelled and the platform order rejected so neither side keeps it
    /// alone; `None` means that rollback happened.
    async fn write_acceptance(
        &self,
        order: &Order,
        accepted: &Order,
        transactions: &[Transaction],
    ) -> LinkResult<Option<Order>> {
        let failure = match self.write_order(accepted).await {
            Ok(written) => return Ok(Some(written)),
            Err(e) => e,
        };
        warn!(order_id = ?order.id, error = %failure, "Accept write failed, rolling back");

        let cancelled = match self.managers.ordering() {
            Ok(ordering) => ordering.order_cancelled(accepted).await,
            Err(e) => Err(e),
        };
        if let Err(e) = cancelled {
            warn!(order_id = ?order.id, error = %e, "POS did not cancel order");
        }

        let reason = format!("order could not be accepted: {failure}");
        if let Err(e) = self.reject_new_order(order, transactions, &reason).await {
            warn!(order_id = ?order.id, error = %e, "Rollback rejection failed");
            return Err(failure);
        }
        Ok(None)
    }

    /// Remembers the platform id and tells the POS about it.
    async fn link_pos_order(&self, pos_order_id: &str, written: &Order) {
        let Some(order_id) = written.id.as_deref() else {
            return;
        };
        self.creations.remember(pos_order_id, order_id).await;

        let recorded = match self.managers.ordering() {
            Ok(ordering) => ordering.record_order_id(pos_order_id, order_id).await,
            Err(e) => Err(e),
        };
        if let Err(e) = recorded {
            warn!(order_id = %order_id, error = %e, "POS did not record order id");
        }
    }

    async fn complete_payment_once(&self, transaction: &Transaction) -> LinkResult<()> {
        let id = required("transaction.id", transaction.id.as_deref())?;
        if !self.settled.claim(id, TransactionStatus::Complete) {
            return Ok(());
        }

        let mut outgoing = transaction.clone();
        self.stamp_transaction(&mut outgoing);
        match self.api.complete_transaction(&outgoing).await {
            Ok(written) => {
                self.absorb_transaction(&written).await;
                Ok(())
            }
            Err(e) => {
                self.settled.release(id, TransactionStatus::Complete);
                Err(e)
            }
        }
    }

    // =========================================================================
    // Order Status
    // =========================================================================

    /// Reacts to an order's current status according to the operating mode.
    pub async fn handle_order_status(&self, order: Order) -> LinkResult<OrderOutcome> {
        let order_id = required("order.id", order.id.as_deref())?.to_string();

        match order.status {
            OrderStatus::Cancelled => {
                let ordering = self.managers.ordering()?;
                if let Some(updated_at) = order.updated_at {
                    ordering.record_order_updated_at(&order_id, updated_at).await?;
                }
                ordering.order_cancelled(&order).await?;
                self.forget_order(&order_id, order.pos_id.as_deref());
                info!(order_id = %order_id, "Order cancelled on platform");
                Ok(OrderOutcome::Cancelled)
            }
            OrderStatus::ReadyToPay => {
                let confirmed = self.managers.ordering()?.confirm_order_totals(&order).await?;
                self.request_payment_for_order(&confirmed).await
            }
            OrderStatus::New | OrderStatus::Pending => self.confirm_availability(order).await,
            other => {
                debug!(order_id = %order_id, status = %other, "No action for order status");
                Ok(OrderOutcome::Skipped)
            }
        }
    }

    async fn confirm_availability(&self, order: Order) -> LinkResult<OrderOutcome> {
        let mut accepted = transition(&order, OrderStatus::Accepted)?;
        let answer = match self.managers.ordering() {
            Ok(ordering) => ordering.confirm_order_availability(&order, self.mode).await,
            Err(e) => Err(e),
        };

        let pos_order_id = match answer {
            Ok(Confirmation::Accepted { pos_order_id }) => pos_order_id,
            Ok(Confirmation::Declined { reason }) => {
                self.reject_new_order(&order, &[], &reason).await?;
                return Ok(OrderOutcome::Rejected);
            }
            Err(e) => {
                warn!(order_id = ?order.id, error = %e, "Availability check failed, rejecting");
                self.reject_new_order(&order, &[], &e.to_string()).await?;
                return Ok(OrderOutcome::Rejected);
            }
        };

        accepted.pos_id = Some(pos_order_id.clone());
        let Some(written) = self.write_acceptance(&order, &accepted, &[]).await? else {
            return Ok(OrderOutcome::Rejected);
        };
        self.link_pos_order(&pos_order_id, &written).await;

        match self.mode {
            OperatingMode::Restaurant => Ok(OrderOutcome::Accepted),
            OperatingMode::Bistro => self.request_payment_for_order(&written).await,
        }
    }

    // =========================================================================
    // Payment Request
    // =========================================================================

    /// Moves the order to `waiting_for_payment` and settles it on the POS.
    ///
    /// ## Errors
    /// - `UnsupportedSettlement` in bistro mode when a remainder comes back
    /// - Transport errors other than 404/409, which mean a newer write won
    pub async fn request_payment_for_order(&self, order: &Order) -> LinkResult<OrderOutcome> {
        let waiting = transition(order, OrderStatus::WaitingForPayment)?;

        let written = match self.write_order(&waiting).await {
            Ok(written) => written,
            Err(e) if e.is_conflict() || e.is_not_found() => {
                warn!(order_id = ?order.id, error = %e, "Payment request superseded");
                return Ok(OrderOutcome::Superseded);
            }
            Err(e) => return Err(e),
        };

        let ordering = self.managers.ordering()?;
        let remainder = written.not_paying_total;
        match (self.mode, written.has_remainder()) {
            (OperatingMode::Restaurant, true) => {
                ordering
                    .record_partial_check_payment(&written, remainder)
                    .await?;
            }
            (OperatingMode::Bistro, true) => {
                return Err(LinkError::UnsupportedSettlement {
                    order_id: written.id.clone().unwrap_or_default(),
                    remainder,
                });
            }
            (_, false) => ordering.record_full_check_payment(&written).await?,
        }

        Ok(OrderOutcome::AwaitingPayment)
    }

    // =========================================================================
    // POS-Initiated Writes
    // =========================================================================

    /// Creates or updates a POS order on the platform.
    ///
    /// POSTs only while no platform id is known for the POS order; every
    /// later write is a PUT. Concurrent callers for one POS order queue on
    /// its creation slot, so a second POST never happens.
    pub async fn update_order(&self, order: &Order) -> LinkResult<Order> {
        self.upsert_order(order).instrument(self.span.clone()).await
    }

    async fn upsert_order(&self, order: &Order) -> LinkResult<Order> {
        validate_order_for_write(order)?;

        if order.id.is_some() {
            return self.write_order(order).await;
        }

        let pos_id = required("order.pos_id", order.pos_id.as_deref())?;
        let slot = self.creations.slot(pos_id);
        let mut known = slot.lock().await;

        if let Some(order_id) = known.clone() {
            let mut existing = order.clone();
            existing.id = Some(order_id);
            return self.write_order(&existing).await;
        }

        let created = self.api.create_order(order).await?;
        let order_id = required("order.id", created.id.as_deref())?.to_string();
        *known = Some(order_id.clone());
        drop(known);

        self.link_pos_order(pos_id, &created).await;
        self.absorb_order(&created, Some(pos_id)).await;
        info!(order_id = %order_id, pos_order_id = %pos_id, "Order created on platform");
        Ok(created)
    }

    /// Pushes the POS order open for `checkin_id`, if there is one.
    pub async fn sync_checkin_order(&self, checkin_id: &str) -> LinkResult<Option<Order>> {
        let Some(order) = self.managers.ordering()?.order_by_checkin(checkin_id).await? else {
            debug!(checkin_id = %checkin_id, "No POS order for checkin");
            return Ok(None);
        };
        self.update_order(&order).await.map(Some)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ApiError;
    use crate::testkit::{engine_with, order, transaction, ConfirmAnswer, ScriptedPos};
    use covers_core::{Money, OrderType};

    // Scenario: supported order, no payments, consumer resolves.
    #[tokio::test]
    async fn test_order_created_without_payments_is_accepted() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_order(order("o-1", OrderType::Delivery, OrderStatus::New));

        let outcome = engine.handle_order_created("o-1").await.unwrap();

        assert_eq!(outcome, OrderOutcome::Accepted);
        assert_eq!(pos.count("confirm_new_order o-1"), 1);
        assert_eq!(pos.count("confirm_new_order_with_full_payment o-1"), 0);
        assert_eq!(platform.count("PUT /orders/o-1 accepted"), 1);
        assert_eq!(platform.stored_order("o-1").unwrap().status, OrderStatus::Accepted);
        assert_eq!(pos.count("record_order_id p-1 o-1"), 1);
    }

    #[tokio::test]
    async fn test_order_with_payments_asks_full_payment_and_completes() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_order(order("o-1", OrderType::Pickup, OrderStatus::New));
        platform.add_transaction(transaction("t-1", "o-1", TransactionStatus::Pending));

        engine.handle_order_created("o-1").await.unwrap();
        engine.handle_order_created("o-1").await.unwrap();

        assert_eq!(pos.count("confirm_new_order_with_full_payment o-1"), 1);
        assert_eq!(platform.count("COMPLETE t-1"), 1);
    }

    // Scenario: unsupported type is rejected exactly once.
    #[tokio::test]
    async fn test_unsupported_type_rejected_once() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_order(order("o-1", OrderType::Unknown, OrderStatus::New));
        platform.add_transaction(transaction("t-1", "o-1", TransactionStatus::Pending));
        platform.add_transaction(transaction("t-2", "o-1", TransactionStatus::Complete));

        let outcome = engine.handle_order_created("o-1").await.unwrap();

        assert_eq!(outcome, OrderOutcome::Rejected);
        assert_eq!(platform.count("REJECT /orders/o-1"), 1);
        assert_eq!(platform.count("REJECT_PAYMENT t-1"), 1);
        assert_eq!(platform.count("REJECT_PAYMENT t-2"), 0);
        assert_eq!(pos.count("confirm_new_order"), 0);
    }

    #[tokio::test]
    async fn test_unresolved_consumer_rejects() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        let mut unknown = order("o-1", OrderType::Delivery, OrderStatus::New);
        unknown.consumer = None;
        unknown.checkin_id = Some("c-404".into());
        platform.add_order(unknown);

        let outcome = engine.handle_order_created("o-1").await.unwrap();

        assert_eq!(outcome, OrderOutcome::Rejected);
        assert_eq!(platform.count("GET /checkins/c-404"), 1);
        assert_eq!(platform.count("REJECT /orders/o-1"), 1);
        assert_eq!(pos.count("confirm_new_order o-1"), 0);
    }

    #[tokio::test]
    async fn test_consumer_resolved_through_checkin() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        let mut via_checkin = order("o-1", OrderType::Delivery, OrderStatus::New);
        via_checkin.consumer = None;
        via_checkin.checkin_id = Some("c-1".into());
        platform.add_order(via_checkin);
        platform.add_checkin("c-1", "u-7");

        let outcome = engine.handle_order_created("o-1").await.unwrap();
        assert_eq!(outcome, OrderOutcome::Accepted);
        assert_eq!(pos.count("confirm_new_order o-1 u-7"), 1);
    }

    #[tokio::test]
    async fn test_pos_failure_rejects_instead_of_leaving_pending() {
        let pos = Arc::new(ScriptedPos::with_confirm(ConfirmAnswer::Fail));
        let (engine, platform) = engine_with(pos, OperatingMode::Restaurant);
        platform.add_order(order("o-1", OrderType::Delivery, OrderStatus::New));

        let outcome = engine.handle_order_created("o-1").await.unwrap();
        assert_eq!(outcome, OrderOutcome::Rejected);
        assert_eq!(platform.count("REJECT /orders/o-1"), 1);
        assert_eq!(platform.count("PUT /orders/o-1 accepted"), 0);
    }

    // Never neither: a failed accept write rolls the POS back and rejects.
    #[tokio::test]
    async fn test_accept_write_failure_rejects_and_cancels_on_pos() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_order(order("o-1", OrderType::Delivery, OrderStatus::New));
        platform.add_transaction(transaction("t-1", "o-1", TransactionStatus::Pending));
        platform.fail_next_put(ApiError::from_status(503, "maintenance"));

        let outcome = engine.handle_order_created("o-1").await.unwrap();

        assert_eq!(outcome, OrderOutcome::Rejected);
        assert_eq!(platform.count("PUT /orders/o-1 accepted"), 1);
        assert_eq!(platform.count("REJECT /orders/o-1"), 1);
        assert_eq!(platform.count("REJECT_PAYMENT t-1"), 1);
        assert_eq!(platform.count("COMPLETE t-1"), 0);
        assert_eq!(platform.stored_order("o-1").unwrap().status, OrderStatus::Rejected);
        assert_eq!(pos.count("confirm_new_order_with_full_payment o-1"), 1);
        assert_eq!(pos.count("order_cancelled o-1"), 1);
        assert_eq!(pos.count("record_order_id"), 0);
    }

    #[tokio::test]
    async fn test_accept_write_and_rejection_failing_returns_error() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_order(order("o-1", OrderType::Delivery, OrderStatus::New));
        platform.fail_next_put(ApiError::network("connection reset"));
        platform.fail_next_put(ApiError::network("connection reset"));

        let err = engine.handle_order_created("o-1").await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(err.status(), None);
        assert_eq!(pos.count("order_cancelled o-1"), 1);
    }

    #[tokio::test]
    async fn test_availability_accept_failure_rolls_back() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Bistro);
        platform.fail_next_put(ApiError::from_status(409, "stale version"));

        let outcome = engine
            .handle_order_status(order("o-1", OrderType::DineIn, OrderStatus::New))
            .await
            .unwrap();

        assert_eq!(outcome, OrderOutcome::Rejected);
        assert_eq!(
            platform.calls(),
            vec!["PUT /orders/o-1 accepted", "REJECT /orders/o-1"]
        );
        assert_eq!(
            pos.calls(),
            vec!["confirm_order_availability o-1 bistro", "order_cancelled o-1"]
        );
    }

    // The sweep can surface unlinked orders that already moved on.
    #[tokio::test]
    async fn test_unlinked_order_past_confirmation_is_not_offered_to_pos() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_order(order("o-1", OrderType::Delivery, OrderStatus::WaitingForPayment));

        let outcome = engine.handle_order_created("o-1").await.unwrap();

        assert_eq!(outcome, OrderOutcome::Skipped);
        assert!(pos.calls().is_empty());
        assert_eq!(platform.count("PUT"), 0);
        assert_eq!(platform.count("REJECT"), 0);
    }

    #[tokio::test]
    async fn test_linked_order_redelivery_is_skipped() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_order(order("o-1", OrderType::Delivery, OrderStatus::New));

        engine.handle_order_created("o-1").await.unwrap();
        let second = engine.handle_order_created("o-1").await.unwrap();

        assert_eq!(second, OrderOutcome::Skipped);
        assert_eq!(platform.count("PUT /orders/o-1 accepted"), 1);
    }

    #[tokio::test]
    async fn test_dine_in_goes_through_availability() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_order(order("o-1", OrderType::DineIn, OrderStatus::Pending));

        let outcome = engine.handle_order_created("o-1").await.unwrap();

        assert_eq!(outcome, OrderOutcome::Accepted);
        assert_eq!(pos.count("confirm_order_availability o-1 restaurant"), 1);
        assert_eq!(platform.count("PUT /orders/o-1 waiting_for_payment"), 0);
    }

    #[tokio::test]
    async fn test_bistro_accepts_then_requests_payment() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Bistro);

        let outcome = engine
            .handle_order_status(order("o-1", OrderType::DineIn, OrderStatus::New))
            .await
            .unwrap();

        assert_eq!(outcome, OrderOutcome::AwaitingPayment);
        assert_eq!(
            platform.calls(),
            vec!["PUT /orders/o-1 accepted", "PUT /orders/o-1 waiting_for_payment"]
        );
        assert_eq!(pos.count("record_full_check_payment o-1"), 1);
    }

    #[tokio::test]
    async fn test_bistro_remainder_fails_fast() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Bistro);
        platform.set_not_paying("o-1", Money::from_cents(250));

        let err = engine
            .handle_order_status(order("o-1", OrderType::DineIn, OrderStatus::New))
            .await
            .unwrap_err();

        assert!(matches!(err, LinkError::UnsupportedSettlement { .. }));
        assert!(!err.is_retryable());
        assert_eq!(pos.count("record_full_check_payment o-1"), 0);
        assert_eq!(pos.count("record_partial_check_payment o-1"), 0);
    }

    // Scenario: restaurant remainder goes to partial payment.
    #[tokio::test]
    async fn test_restaurant_remainder_records_partial_payment() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.set_not_paying("o-1", Money::from_cents(450));

        let mut accepted = order("o-1", OrderType::DineIn, OrderStatus::Accepted);
        accepted.pos_id = Some("p-1".into());
        let outcome = engine.request_payment_for_order(&accepted).await.unwrap();

        assert_eq!(outcome, OrderOutcome::AwaitingPayment);
        assert_eq!(pos.count("record_partial_check_payment o-1 4.50"), 1);
        assert_eq!(pos.count("record_full_check_payment o-1"), 0);
    }

    #[tokio::test]
    async fn test_payment_request_conflict_is_superseded() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.fail_next_put(ApiError::from_status(409, "stale version"));

        let accepted = order("o-1", OrderType::DineIn, OrderStatus::Accepted);
        let outcome = engine.request_payment_for_order(&accepted).await.unwrap();

        assert_eq!(outcome, OrderOutcome::Superseded);
        assert!(pos.calls().is_empty());
    }

    #[tokio::test]
    async fn test_payment_request_not_found_is_superseded() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Bistro);
        platform.fail_next_put(ApiError::from_status(404, "order gone"));

        let accepted = order("o-1", OrderType::DineIn, OrderStatus::Accepted);
        let outcome = engine.request_payment_for_order(&accepted).await.unwrap();

        assert_eq!(outcome, OrderOutcome::Superseded);
        assert_eq!(platform.count("PUT /orders/o-1 waiting_for_payment"), 1);
        assert!(pos.calls().is_empty());
    }

    #[tokio::test]
    async fn test_payment_request_server_error_propagates() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos, OperatingMode::Restaurant);
        platform.fail_next_put(ApiError::from_status(503, "maintenance"));

        let accepted = order("o-1", OrderType::DineIn, OrderStatus::Accepted);
        let err = engine.request_payment_for_order(&accepted).await.unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_cancelled_status_only_notifies_pos() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);

        let mut cancelled = order("o-1", OrderType::Delivery, OrderStatus::Cancelled);
        cancelled.updated_at = Some(chrono::Utc::now());
        let outcome = engine.handle_order_status(cancelled).await.unwrap();

        assert_eq!(outcome, OrderOutcome::Cancelled);
        assert!(platform.calls().is_empty());
        assert_eq!(pos.count("record_order_updated_at o-1"), 1);
        assert_eq!(pos.count("order_cancelled o-1"), 1);
    }

    #[tokio::test]
    async fn test_ready_to_pay_confirms_totals_first() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);

        let outcome = engine
            .handle_order_status(order("o-1", OrderType::DineIn, OrderStatus::ReadyToPay))
            .await
            .unwrap();

        assert_eq!(outcome, OrderOutcome::AwaitingPayment);
        assert_eq!(
            pos.calls(),
            vec!["confirm_order_totals o-1", "record_full_check_payment o-1"]
        );
        assert_eq!(platform.count("PUT /orders/o-1 waiting_for_payment"), 1);
    }

    // Idempotent creation: one POST per POS order.
    #[tokio::test]
    async fn test_update_order_posts_once() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        let engine = Arc::new(engine);

        let mut local = order("ignored", OrderType::DineIn, OrderStatus::New);
        local.id = None;
        local.pos_id = Some("p-5".into());

        let first = {
            let engine = engine.clone();
            let local = local.clone();
            tokio::spawn(async move { engine.update_order(&local).await })
        };
        let second = {
            let engine = engine.clone();
            let local = local.clone();
            tokio::spawn(async move { engine.update_order(&local).await })
        };
        let a = first.await.unwrap().unwrap();
        let b = second.await.unwrap().unwrap();
        engine.update_order(&local).await.unwrap();

        assert_eq!(platform.count("POST /orders p-5"), 1);
        assert_eq!(platform.count("PUT /orders/o-new-1 new"), 2);
        assert_eq!(a.id.as_deref(), Some("o-new-1"));
        assert_eq!(b.id.as_deref(), Some("o-new-1"));
        assert_eq!(pos.count("record_order_id p-5 o-new-1"), 1);
    }

    // Version propagation: the next write carries the last recorded token.
    #[tokio::test]
    async fn test_writes_carry_latest_version() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);

        let mut linked = order("o-1", OrderType::DineIn, OrderStatus::Accepted);
        linked.pos_id = Some("p-1".into());
        linked.version = Some("stale".into());

        let written = engine.update_order(&linked).await.unwrap();
        assert_eq!(written.version.as_deref(), Some("v1"));
        assert_eq!(engine.order_version("o-1").as_deref(), Some("v1"));
        assert_eq!(pos.count("record_order_version p-1 v1"), 1);

        engine.update_order(&linked).await.unwrap();
        assert_eq!(platform.sent_versions("o-1"), vec![Some("stale".into()), Some("v1".into())]);
        assert_eq!(engine.order_version("o-1").as_deref(), Some("v2"));
    }

    // Conflict isolation: 409 and 404 surface as different kinds.
    #[tokio::test]
    async fn test_put_conflict_distinct_from_not_found() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos, OperatingMode::Restaurant);
        let linked = order("o-1", OrderType::DineIn, OrderStatus::Accepted);

        platform.fail_next_put(ApiError::from_status(409, "version mismatch"));
        let conflict = engine.update_order(&linked).await.unwrap_err();
        assert!(matches!(conflict, LinkError::Conflict(_)));

        platform.fail_next_put(ApiError::from_status(404, "gone"));
        let missing = engine.update_order(&linked).await.unwrap_err();
        assert!(matches!(missing, LinkError::Transport(_)));
        assert!(!missing.is_conflict());
        assert_eq!(missing.status(), Some(404));
    }

    #[tokio::test]
    async fn test_sync_checkin_order_pushes_pos_tab() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let mut tab = order("ignored", OrderType::DineIn, OrderStatus::New);
        tab.id = None;
        tab.pos_id = Some("p-3".into());
        pos.set_checkin_order("c-1", tab);
        let (engine, platform) = engine_with(pos, OperatingMode::Restaurant);

        let pushed = engine.sync_checkin_order("c-1").await.unwrap();
        assert!(pushed.is_some());
        assert_eq!(platform.count("POST /orders p-3"), 1);
        assert!(engine.sync_checkin_order("c-2").await.unwrap().is_none());
    }

    #[test]
    fn test_transition_guards_state_graph() {
        let paid = order("o-1", OrderType::Delivery, OrderStatus::Paid);
        let err = transition(&paid, OrderStatus::WaitingForPayment).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        let accepted = order("o-1", OrderType::Delivery, OrderStatus::Accepted);
        let moved = transition(&accepted, OrderStatus::WaitingForPayment).unwrap();
        assert_eq!(moved.status, OrderStatus::WaitingForPayment);
    }
}
