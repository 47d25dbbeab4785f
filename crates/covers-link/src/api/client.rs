//! `PlatformApi` over HTTP.

use async_trait::async_trait;
use covers_core::validation::{validate_order_for_write, validate_points_redeem, validate_transaction};
use covers_core::{
    Booking, Checkin, Location, Member, Order, OrderStatus, PlatformSettings, PointsRedeem,
    Product, Reward, Surcount, TableAllocation, TableAllocationStatus, TableRejectionReason,
    Transaction, TransactionStatus, ValidationError,
};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::endpoint::{Endpoint, Resource};
use super::http::HttpTransport;
use super::PlatformApi;
use crate::error::{LinkError, LinkResult};

/// REST client for the platform.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    transport: HttpTransport,
}

impl PlatformClient {
    pub fn new(transport: HttpTransport) -> Self {
        PlatformClient { transport }
    }

    async fn call(
        &self,
        endpoint: &Endpoint,
        method: Method,
        payload: Option<Value>,
    ) -> LinkResult<Option<String>> {
        Ok(self
            .transport
            .send(endpoint, method, payload.as_ref())
            .await?)
    }

    /// Sends and decodes; an empty body is a `NullResponse`.
    async fn fetch<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        method: Method,
        payload: Option<Value>,
    ) -> LinkResult<T> {
        let body = self
            .call(&endpoint, method, payload)
            .await?
            .ok_or_else(|| LinkError::NullResponse(endpoint.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Sends and ignores whatever comes back.
    async fn execute(
        &self,
        endpoint: Endpoint,
        method: Method,
        payload: Option<Value>,
    ) -> LinkResult<()> {
        self.call(&endpoint, method, payload).await?;
        Ok(())
    }
}

/// Rejects a missing or blank identifier.
pub(crate) fn required<'a>(field: &str, value: Option<&'a str>) -> LinkResult<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::Required {
            field: field.to_string(),
        }
        .into()),
    }
}

fn transaction_endpoint(transaction: &Transaction) -> LinkResult<Endpoint> {
    let tx_id = required("transaction.id", transaction.id.as_deref())?;
    Ok(Endpoint::new(Resource::OrderTransactions)
        .id(&transaction.order_id)
        .id(tx_id))
}

fn with_status(transaction: &Transaction, status: TransactionStatus) -> LinkResult<Value> {
    let mut updated = transaction.clone();
    updated.status = status;
    Ok(serde_json::to_value(updated)?)
}

#[async_trait]
impl PlatformApi for PlatformClient {
    // =========================================================================
    // Orders
    // =========================================================================

    async fn get_order(&self, order_id: &str) -> LinkResult<Order> {
        let endpoint = Endpoint::new(Resource::Orders)
            .id(order_id)
            .query("include", "consumer");
        self.fetch(endpoint, Method::GET, None).await
    }

    async fn get_unlinked_orders(&self) -> LinkResult<Vec<Order>> {
        let endpoint = Endpoint::new(Resource::UnlinkedOrders);
        Ok(self
            .call(&endpoint, Method::GET, None)
            .await?
            .map(|body| serde_json::from_str(&body))
            .transpose()?
            .unwrap_or_default())
    }

    async fn create_order(&self, order: &Order) -> LinkResult<Order> {
        validate_order_for_write(order)?;
        let payload = serde_json::to_value(order)?;
        self.fetch(Endpoint::new(Resource::Orders), Method::POST, Some(payload))
            .await
    }

    async fn put_order(&self, order: &Order) -> LinkResult<Order> {
        let id = required("order.id", order.id.as_deref())?;
        validate_order_for_write(order)?;
        let payload = serde_json::to_value(order)?;
        self.fetch(
            Endpoint::new(Resource::Orders).id(id),
            Method::PUT,
            Some(payload),
        )
        .await
    }

    async fn reject_order(&self, order: &Order, reason: &str) -> LinkResult<Order> {
        let id = required("order.id", order.id.as_deref())?;
        let payload = json!({
            "status": OrderStatus::Rejected,
            "reason": reason,
            "version": order.version,
        });
        self.fetch(
            Endpoint::new(Resource::Orders).id(id),
            Method::PUT,
            Some(payload),
        )
        .await
    }

    async fn get_order_transactions(&self, order_id: &str) -> LinkResult<Vec<Transaction>> {
        let endpoint = Endpoint::new(Resource::OrderTransactions).id(order_id);
        Ok(self
            .call(&endpoint, Method::GET, None)
            .await?
            .map(|body| serde_json::from_str(&body))
            .transpose()?
            .unwrap_or_default())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    async fn get_transaction(&self, transaction_id: &str) -> LinkResult<Transaction> {
        self.fetch(
            Endpoint::new(Resource::Transactions).id(transaction_id),
            Method::GET,
            None,
        )
        .await
    }

    async fn create_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        validate_transaction(transaction)?;
        let payload = serde_json::to_value(transaction)?;
        self.fetch(
            Endpoint::new(Resource::OrderTransactions).id(&transaction.order_id),
            Method::POST,
            Some(payload),
        )
        .await
    }

    async fn request_payment(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        validate_transaction(transaction)?;
        let payload = with_status(transaction, TransactionStatus::Waiting)?;
        self.fetch(transaction_endpoint(transaction)?, Method::PUT, Some(payload))
            .await
    }

    async fn reject_payment(
        &self,
        transaction: &Transaction,
        reason: &str,
    ) -> LinkResult<Transaction> {
        let mut payload = with_status(transaction, TransactionStatus::Cancelled)?;
        if let Value::Object(map) = &mut payload {
            map.insert("reason".to_string(), Value::String(reason.to_string()));
        }
        self.fetch(transaction_endpoint(transaction)?, Method::PUT, Some(payload))
            .await
    }

    async fn complete_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        let id = required("transaction.id", transaction.id.as_deref())?;
        let payload = with_status(transaction, TransactionStatus::Complete)?;
        self.fetch(
            Endpoint::new(Resource::Transactions).id(id),
            Method::PUT,
            Some(payload),
        )
        .await
    }

    async fn cancel_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        let id = required("transaction.id", transaction.id.as_deref())?;
        let payload = with_status(transaction, TransactionStatus::Cancelled)?;
        self.fetch(
            Endpoint::new(Resource::Transactions).id(id),
            Method::PUT,
            Some(payload),
        )
        .await
    }

    // =========================================================================
    // Loyalty
    // =========================================================================

    async fn get_member(&self, member_id: &str) -> LinkResult<Member> {
        self.fetch(
            Endpoint::new(Resource::Members).id(member_id),
            Method::GET,
            None,
        )
        .await
    }

    async fn create_member(&self, member: &Member) -> LinkResult<Member> {
        let payload = serde_json::to_value(member)?;
        self.fetch(Endpoint::new(Resource::Members), Method::POST, Some(payload))
            .await
    }

    async fn update_member(&self, member: &Member) -> LinkResult<Member> {
        let id = required("member.id", member.id.as_deref())?;
        let payload = serde_json::to_value(member)?;
        self.fetch(
            Endpoint::new(Resource::Members).id(id),
            Method::PUT,
            Some(payload),
        )
        .await
    }

    async fn delete_member(&self, member_id: &str) -> LinkResult<()> {
        self.execute(
            Endpoint::new(Resource::Members).id(member_id),
            Method::DELETE,
            None,
        )
        .await
    }

    async fn get_rewards(&self, member_id: &str) -> LinkResult<Vec<Reward>> {
        let endpoint = Endpoint::new(Resource::MemberRewards).id(member_id);
        Ok(self
            .call(&endpoint, Method::GET, None)
            .await?
            .map(|body| serde_json::from_str(&body))
            .transpose()?
            .unwrap_or_default())
    }

    async fn redeem_points(&self, member_id: &str, redeem: &PointsRedeem) -> LinkResult<Member> {
        validate_points_redeem(redeem)?;
        let payload = serde_json::to_value(redeem)?;
        self.fetch(
            Endpoint::new(Resource::MemberRewards).id(member_id),
            Method::POST,
            Some(payload),
        )
        .await
    }

    async fn redeem_reward(
        &self,
        member_id: &str,
        reward_id: &str,
        order_id: &str,
    ) -> LinkResult<Member> {
        self.fetch(
            Endpoint::new(Resource::MemberRewards)
                .id(member_id)
                .id(reward_id),
            Method::POST,
            Some(json!({ "order_id": order_id })),
        )
        .await
    }

    // =========================================================================
    // Seating
    // =========================================================================

    async fn get_checkin(&self, checkin_id: &str) -> LinkResult<Checkin> {
        self.fetch(
            Endpoint::new(Resource::Checkins)
                .id(checkin_id)
                .query("include", "consumer"),
            Method::GET,
            None,
        )
        .await
    }

    async fn list_checkins(&self) -> LinkResult<Vec<Checkin>> {
        let endpoint = Endpoint::new(Resource::Checkins);
        Ok(self
            .call(&endpoint, Method::GET, None)
            .await?
            .map(|body| serde_json::from_str(&body))
            .transpose()?
            .unwrap_or_default())
    }

    async fn delete_checkin(&self, checkin_id: &str) -> LinkResult<()> {
        self.execute(
            Endpoint::new(Resource::Checkins).id(checkin_id),
            Method::DELETE,
            None,
        )
        .await
    }

    async fn list_tables(&self) -> LinkResult<Vec<TableAllocation>> {
        let endpoint = Endpoint::new(Resource::Tables);
        Ok(self
            .call(&endpoint, Method::GET, None)
            .await?
            .map(|body| serde_json::from_str(&body))
            .transpose()?
            .unwrap_or_default())
    }

    async fn confirm_table(&self, allocation: &TableAllocation) -> LinkResult<TableAllocation> {
        let mut confirmed = allocation.clone();
        confirmed.status = TableAllocationStatus::Confirmed;
        confirmed.rejection_reason = None;
        let payload = serde_json::to_value(&confirmed)?;
        self.fetch(
            Endpoint::new(Resource::Tables).id(&allocation.table_name),
            Method::PUT,
            Some(payload),
        )
        .await
    }

    async fn delete_table(
        &self,
        allocation: &TableAllocation,
        reason: TableRejectionReason,
    ) -> LinkResult<()> {
        let payload = json!({
            "checkin_id": allocation.checkin_id,
            "rejection_reason": reason,
        });
        self.execute(
            Endpoint::new(Resource::Tables).id(&allocation.table_name),
            Method::DELETE,
            Some(payload),
        )
        .await
    }

    async fn get_booking(&self, booking_id: &str) -> LinkResult<Booking> {
        self.fetch(
            Endpoint::new(Resource::Bookings).id(booking_id),
            Method::GET,
            None,
        )
        .await
    }

    // =========================================================================
    // Location & Menu
    // =========================================================================

    async fn get_location(&self) -> LinkResult<Location> {
        self.fetch(Endpoint::new(Resource::Location), Method::GET, None)
            .await
    }

    async fn get_menu(&self) -> LinkResult<Vec<Product>> {
        self.fetch(Endpoint::new(Resource::Menu), Method::GET, None)
            .await
    }

    async fn put_menu_products(&self, products: &[Product]) -> LinkResult<()> {
        let payload = serde_json::to_value(products)?;
        self.execute(
            Endpoint::new(Resource::MenuProducts),
            Method::PUT,
            Some(payload),
        )
        .await
    }

    async fn put_menu_surcounts(&self, surcounts: &[Surcount]) -> LinkResult<()> {
        let payload = serde_json::to_value(surcounts)?;
        self.execute(
            Endpoint::new(Resource::MenuSurcounts),
            Method::PUT,
            Some(payload),
        )
        .await
    }

    async fn get_settings(&self) -> LinkResult<PlatformSettings> {
        self.fetch(Endpoint::new(Resource::Config), Method::GET, None)
            .await
    }
}
