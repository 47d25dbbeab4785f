//! Seating: checkins, table allocations and bookings.

use covers_core::{
    Checkin, TableAllocation, TableAllocationStatus, TableDecision, TableRejectionReason,
};
use tracing::{debug, info, warn};

use super::ReconciliationEngine;
use crate::error::{LinkError, LinkResult};
use crate::protocol::{EventData, EventKind};

impl ReconciliationEngine {
    // =========================================================================
    // Checkins
    // =========================================================================

    pub async fn handle_checkin(&self, checkin_id: &str) -> LinkResult<()> {
        let checkin = self.api.get_checkin(checkin_id).await?;
        self.managers
            .reservations()?
            .consumer_checked_in(&checkin)
            .await?;
        info!(checkin_id = %checkin_id, "Consumer checked in");
        Ok(())
    }

    /// Tells the POS, then removes the checkin from the platform.
    pub async fn handle_checkout(&self, checkin_id: &str) -> LinkResult<()> {
        let notified = match self.managers.reservations() {
            Ok(manager) => manager.consumer_checked_out(checkin_id).await,
            Err(e) => Err(e),
        };
        if let Err(e) = notified {
            warn!(checkin_id = %checkin_id, error = %e, "POS did not take checkout");
        }

        self.api.delete_checkin(checkin_id).await?;
        info!(checkin_id = %checkin_id, "Consumer checked out");
        Ok(())
    }

    pub async fn checkins(&self) -> LinkResult<Vec<Checkin>> {
        self.api.list_checkins().await
    }

    // =========================================================================
    // Tables
    // =========================================================================

    /// Answers a `table_allocation` push with a confirm or a rejection.
    ///
    /// A POS failure counts as `table_does_not_exist` so the guest is never
    /// left waiting for a table.
    pub async fn handle_table_allocation(&self, data: &EventData) -> LinkResult<TableDecision> {
        let allocation = self.pending_allocation(data).await?;

        let decision = match self.managers.reservations() {
            Ok(manager) => manager.confirm_table_allocation(&allocation).await,
            Err(e) => Err(e),
        };
        let decision = decision.unwrap_or_else(|e| {
            warn!(table = %allocation.table_name, error = %e, "POS failed on table, rejecting");
            TableDecision::Reject(TableRejectionReason::TableDoesNotExist)
        });

        match decision {
            TableDecision::Confirm => {
                self.api.confirm_table(&allocation).await?;
                info!(table = %allocation.table_name, checkin_id = %allocation.checkin_id, "Table confirmed");
            }
            TableDecision::Reject(reason) => {
                self.api.delete_table(&allocation, reason).await?;
                info!(table = %allocation.table_name, reason = %reason, "Table rejected");
            }
        }
        Ok(decision)
    }

    /// The allocation named by the push; looked up when the push omits the
    /// table name.
    async fn pending_allocation(&self, data: &EventData) -> LinkResult<TableAllocation> {
        let checkin_id = crate::api::client::required("checkin_id", data.checkin_id.as_deref())?;

        if let Some(table_name) = data.table_name.as_deref() {
            return Ok(TableAllocation {
                table_name: table_name.to_string(),
                checkin_id: checkin_id.to_string(),
                consumer_id: data.consumer_id.clone(),
                status: TableAllocationStatus::WaitingForConfirmation,
                rejection_reason: None,
            });
        }

        self.api
            .list_tables()
            .await?
            .into_iter()
            .find(|t| {
                t.checkin_id == checkin_id && t.status == TableAllocationStatus::WaitingForConfirmation
            })
            .ok_or_else(|| LinkError::NullResponse(format!("table allocation for {}", checkin_id)))
    }

    /// The POS freed a table: remove the allocation on the platform.
    pub async fn deallocate_table(&self, allocation: &TableAllocation) -> LinkResult<()> {
        self.api
            .delete_table(allocation, TableRejectionReason::CheckinDeallocatedByPos)
            .await?;
        info!(table = %allocation.table_name, "Table deallocated by POS");
        Ok(())
    }

    pub async fn tables(&self) -> LinkResult<Vec<TableAllocation>> {
        self.api.list_tables().await
    }

    // =========================================================================
    // Bookings
    // =========================================================================

    pub async fn handle_booking_event(&self, kind: EventKind, booking_id: &str) -> LinkResult<()> {
        let reservations = self.managers.reservations()?;

        match kind {
            EventKind::BookingDeleted => reservations.booking_deleted(booking_id).await?,
            EventKind::BookingCreated => {
                let booking = self.api.get_booking(booking_id).await?;
                reservations.booking_created(&booking).await?;
            }
            _ => {
                let booking = self.api.get_booking(booking_id).await?;
                reservations.booking_updated(&booking).await?;
            }
        }
        debug!(booking_id = %booking_id, kind = %kind, "Booking forwarded");
        Ok(())
    }
}
