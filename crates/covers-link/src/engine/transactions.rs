//! Payment workflows.
//!
//! ```text
//! pending ──► TransactionManager::ready_to_pay
//!               ├── Some(tx) ──► request payment (PUT waiting)
//!               ├── None     ──► reject payment (once)
//!               └── Err      ──► reject payment (once)
//!
//! complete / cancelled ──► POS notified once per terminal state
//! ```

use covers_core::{validation::validate_transaction, Transaction, TransactionStatus};
use tracing::{debug, info, warn};

use super::{ReconciliationEngine, TransactionOutcome};
use crate::api::client::required;
use crate::error::LinkResult;

impl ReconciliationEngine {
    // =========================================================================
    // Push Handling
    // =========================================================================

    pub async fn handle_transaction_created(
        &self,
        transaction_id: &str,
    ) -> LinkResult<TransactionOutcome> {
        let transaction = self.api.get_transaction(transaction_id).await?;
        self.handle_transaction_status(transaction).await
    }

    pub async fn handle_transaction_updated(
        &self,
        transaction_id: &str,
    ) -> LinkResult<TransactionOutcome> {
        let transaction = self.api.get_transaction(transaction_id).await?;
        self.handle_transaction_status(transaction).await
    }

    async fn handle_transaction_status(
        &self,
        transaction: Transaction,
    ) -> LinkResult<TransactionOutcome> {
        match transaction.status {
            TransactionStatus::Pending => self.handle_pending_transaction(&transaction).await,
            TransactionStatus::Complete | TransactionStatus::Cancelled => {
                self.reflect_terminal(&transaction).await
            }
            TransactionStatus::Waiting => {
                self.absorb_transaction(&transaction).await;
                debug!(transaction_id = ?transaction.id, "Payment already requested");
                Ok(TransactionOutcome::Skipped)
            }
        }
    }

    /// Asks the POS whether it can take the payment. The platform always gets
    /// a payment request or a rejection back.
    pub async fn handle_pending_transaction(
        &self,
        transaction: &Transaction,
    ) -> LinkResult<TransactionOutcome> {
        let answer = match self.managers.transactions() {
            Ok(manager) => manager.ready_to_pay(transaction).await,
            Err(e) => Err(e),
        };

        match answer {
            Ok(Some(ready)) => {
                let mut outgoing = ready;
                self.stamp_transaction(&mut outgoing);
                let written = self.api.request_payment(&outgoing).await?;
                self.absorb_transaction(&written).await;
                info!(transaction_id = ?written.id, "Payment requested");
                Ok(TransactionOutcome::PaymentRequested)
            }
            Ok(None) => {
                info!(transaction_id = ?transaction.id, "POS declined payment");
                self.reject_payment_once(transaction, "declined by POS").await
            }
            Err(e) => {
                warn!(transaction_id = ?transaction.id, error = %e, "POS cannot take payment, rejecting");
                self.reject_payment_once(transaction, &e.to_string()).await
            }
        }
    }

    /// Tells the POS about a completed or cancelled payment, once.
    async fn reflect_terminal(&self, transaction: &Transaction) -> LinkResult<TransactionOutcome> {
        let id = required("transaction.id", transaction.id.as_deref())?;
        if !self.settled.claim(id, transaction.status) {
            debug!(transaction_id = %id, status = %transaction.status, "Already reflected");
            return Ok(TransactionOutcome::Skipped);
        }
        self.absorb_transaction(transaction).await;

        let manager = match self.managers.transactions() {
            Ok(manager) => manager,
            Err(e) => {
                self.settled.release(id, transaction.status);
                return Err(e.into());
            }
        };

        let (result, outcome) = if transaction.status == TransactionStatus::Complete {
            (
                manager.payment_completed(transaction).await,
                TransactionOutcome::Completed,
            )
        } else {
            (
                manager.cancel_payment(transaction).await,
                TransactionOutcome::Cancelled,
            )
        };

        if let Err(e) = result {
            self.settled.release(id, transaction.status);
            return Err(e.into());
        }
        Ok(outcome)
    }

    /// Rejects a payment on the platform at most once.
    pub(crate) async fn reject_payment_once(
        &self,
        transaction: &Transaction,
        reason: &str,
    ) -> LinkResult<TransactionOutcome> {
        let id = required("transaction.id", transaction.id.as_deref())?;
        if !self.settled.claim(id, TransactionStatus::Cancelled) {
            return Ok(TransactionOutcome::Skipped);
        }

        let mut outgoing = transaction.clone();
        self.stamp_transaction(&mut outgoing);
        match self.api.reject_payment(&outgoing, reason).await {
            Ok(written) => {
                self.absorb_transaction(&written).await;
                Ok(TransactionOutcome::Rejected)
            }
            Err(e) => {
                self.settled.release(id, TransactionStatus::Cancelled);
                Err(e)
            }
        }
    }

    // =========================================================================
    // POS-Initiated
    // =========================================================================

    /// Creates a POS-initiated payment on the platform.
    pub async fn create_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        validate_transaction(transaction)?;
        let created = self.api.create_transaction(transaction).await?;
        self.absorb_transaction(&created).await;
        Ok(created)
    }

    /// Marks a payment complete, carrying the latest version.
    pub async fn complete_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        let mut outgoing = transaction.clone();
        self.stamp_transaction(&mut outgoing);
        let written = self.api.complete_transaction(&outgoing).await?;
        self.absorb_transaction(&written).await;
        if let Some(id) = written.id.as_deref() {
            self.settled.claim(id, TransactionStatus::Complete);
        }
        Ok(written)
    }

    /// Cancels a payment, carrying the latest version.
    pub async fn cancel_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        let mut outgoing = transaction.clone();
        self.stamp_transaction(&mut outgoing);
        let written = self.api.cancel_transaction(&outgoing).await?;
        self.absorb_transaction(&written).await;
        if let Some(id) = written.id.as_deref() {
            self.settled.claim(id, TransactionStatus::Cancelled);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::{ApiError, LinkError};
    use crate::testkit::{engine_with, transaction, ReadyAnswer, ScriptedPos};
    use covers_core::OperatingMode;

    // Scenario: POS says the order is not on the POS.
    #[tokio::test]
    async fn test_missing_pos_order_rejects_payment_once() {
        let pos = Arc::new(ScriptedPos::accepting("p-1").ready(ReadyAnswer::OrderMissing));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_transaction(transaction("t-1", "o-1", TransactionStatus::Pending));

        let outcome = engine.handle_transaction_created("t-1").await.unwrap();
        engine.handle_transaction_updated("t-1").await.unwrap();

        assert_eq!(outcome, TransactionOutcome::Rejected);
        assert_eq!(platform.count("REJECT_PAYMENT t-1"), 1);
        assert_eq!(platform.count("REQUEST_PAYMENT"), 0);
    }

    #[tokio::test]
    async fn test_declined_payment_is_rejected() {
        let pos = Arc::new(ScriptedPos::accepting("p-1").ready(ReadyAnswer::Decline));
        let (engine, platform) = engine_with(pos, OperatingMode::Restaurant);

        let pending = transaction("t-1", "o-1", TransactionStatus::Pending);
        let outcome = engine.handle_pending_transaction(&pending).await.unwrap();

        assert_eq!(outcome, TransactionOutcome::Rejected);
        assert_eq!(platform.count("REJECT_PAYMENT t-1"), 1);
    }

    #[tokio::test]
    async fn test_ready_payment_is_requested_with_version() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);

        let pending = transaction("t-1", "o-1", TransactionStatus::Pending);
        let outcome = engine.handle_pending_transaction(&pending).await.unwrap();

        assert_eq!(outcome, TransactionOutcome::PaymentRequested);
        assert_eq!(platform.count("REQUEST_PAYMENT t-1"), 1);
        assert_eq!(engine.transaction_version("t-1").as_deref(), Some("v1"));
        assert_eq!(pos.count("record_transaction_version t-1 v1"), 1);
    }

    #[tokio::test]
    async fn test_failed_rejection_can_be_retried() {
        let pos = Arc::new(ScriptedPos::accepting("p-1").ready(ReadyAnswer::Decline));
        let (engine, platform) = engine_with(pos, OperatingMode::Restaurant);
        platform.fail_next_put(ApiError::network("connection reset"));

        let pending = transaction("t-1", "o-1", TransactionStatus::Pending);
        let err = engine.handle_pending_transaction(&pending).await.unwrap_err();
        assert!(matches!(err, LinkError::Transport(_)));

        engine.handle_pending_transaction(&pending).await.unwrap();
        assert_eq!(platform.count("REJECT_PAYMENT t-1"), 2);
    }

    #[tokio::test]
    async fn test_terminal_states_reflected_once() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos.clone(), OperatingMode::Restaurant);
        platform.add_transaction(transaction("t-1", "o-1", TransactionStatus::Complete));
        platform.add_transaction(transaction("t-2", "o-1", TransactionStatus::Cancelled));

        assert_eq!(
            engine.handle_transaction_updated("t-1").await.unwrap(),
            TransactionOutcome::Completed
        );
        assert_eq!(
            engine.handle_transaction_updated("t-1").await.unwrap(),
            TransactionOutcome::Skipped
        );
        assert_eq!(
            engine.handle_transaction_updated("t-2").await.unwrap(),
            TransactionOutcome::Cancelled
        );

        assert_eq!(pos.count("payment_completed t-1"), 1);
        assert_eq!(pos.count("cancel_payment t-2"), 1);
    }

    #[tokio::test]
    async fn test_missing_transaction_manager_still_rejects() {
        let (engine, platform) = crate::testkit::engine_without_managers();
        let pending = transaction("t-1", "o-1", TransactionStatus::Pending);

        let outcome = engine.handle_pending_transaction(&pending).await.unwrap();
        assert_eq!(outcome, TransactionOutcome::Rejected);
        assert_eq!(platform.count("REJECT_PAYMENT t-1"), 1);
    }

    #[tokio::test]
    async fn test_create_transaction_validates() {
        let pos = Arc::new(ScriptedPos::accepting("p-1"));
        let (engine, platform) = engine_with(pos, OperatingMode::Restaurant);

        let mut zero = transaction("t-1", "o-1", TransactionStatus::Pending);
        zero.amount = covers_core::Money::zero();
        assert!(matches!(
            engine.create_transaction(&zero).await,
            Err(LinkError::Domain(_))
        ));
        assert!(platform.calls().is_empty());
    }
}
