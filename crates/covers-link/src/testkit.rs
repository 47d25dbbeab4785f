//! Test doubles: a recording platform, a scripted POS, a scripted socket.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use covers_core::{
    Booking, BookingStatus, Checkin, CheckinStatus, Confirmation, Consumer, CoreError, CoreResult,
    Location, Member, Money, OperatingMode, Order, OrderStatus, OrderType, PlatformSettings,
    PointsRedeem, Product, Reward, Surcount, TableAllocation, TableAllocationStatus,
    TableDecision, TableRejectionReason, Transaction, TransactionStatus,
};
use tokio::sync::mpsc;
use tracing::Span;
use url::Url;

use crate::api::PlatformApi;
use crate::contracts::{
    OrderingManager, PosManagers, ReservationManager, RewardManager, TransactionManager,
};
use crate::engine::ReconciliationEngine;
use crate::error::{ApiError, LinkError, LinkResult};
use crate::protocol::PlatformEvent;
use crate::realtime::{
    EventHandler, EventRegistry, EventRegistryBuilder, SocketConnector, SocketFrame, SocketLink,
    SocketSink,
};

// =============================================================================
// Builders
// =============================================================================

pub fn order(id: &str, order_type: OrderType, status: OrderStatus) -> Order {
    Order {
        id: Some(id.to_string()),
        order_type,
        status,
        consumer: Some(Consumer {
            id: "u-1".into(),
            ..Consumer::default()
        }),
        ..Order::default()
    }
}

pub fn transaction(id: &str, order_id: &str, status: TransactionStatus) -> Transaction {
    Transaction {
        id: Some(id.to_string()),
        order_id: order_id.to_string(),
        amount: Money::from_cents(1_000),
        status,
        partner_initiated: true,
        accept_less_than_total: false,
        version: None,
        updated_at: None,
    }
}

/// Engine wired to `pos` for every manager, supporting delivery and pickup.
pub fn engine_with(
    pos: Arc<ScriptedPos>,
    mode: OperatingMode,
) -> (ReconciliationEngine, Arc<FakePlatform>) {
    let platform = Arc::new(FakePlatform::default());
    let managers = PosManagers::new()
        .with_ordering(pos.clone())
        .with_transactions(pos.clone())
        .with_rewards(pos.clone())
        .with_reservations(pos);
    let engine = ReconciliationEngine::new(
        platform.clone(),
        managers,
        mode,
        vec![OrderType::Delivery, OrderType::Pickup],
        Span::none(),
    );
    (engine, platform)
}

pub fn engine_without_managers() -> (ReconciliationEngine, Arc<FakePlatform>) {
    let platform = Arc::new(FakePlatform::default());
    let engine = ReconciliationEngine::new(
        platform.clone(),
        PosManagers::new(),
        OperatingMode::Restaurant,
        vec![OrderType::Delivery],
        Span::none(),
    );
    (engine, platform)
}

// =============================================================================
// Fake Platform
// =============================================================================

#[derive(Default)]
struct PlatformState {
    calls: Vec<String>,
    orders: HashMap<String, Order>,
    unlinked: Vec<Order>,
    transactions: Vec<Transaction>,
    checkins: HashMap<String, Checkin>,
    bookings: HashMap<String, Booking>,
    tables: Vec<TableAllocation>,
    not_paying: HashMap<String, Money>,
    write_failures: VecDeque<ApiError>,
    failing_transaction_lists: HashSet<String>,
    sent_versions: HashMap<String, Vec<Option<String>>>,
    versions: u64,
    created: u64,
}

impl PlatformState {
    fn next_version(&mut self) -> String {
        self.versions += 1;
        format!("v{}", self.versions)
    }

    /// Logs the call, then fails it if a failure is queued.
    fn write(&mut self, call: String) -> LinkResult<()> {
        self.calls.push(call);
        match self.write_failures.pop_front() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn store_transaction(&mut self, transaction: &Transaction) {
        if let Some(existing) = self
            .transactions
            .iter_mut()
            .find(|t| t.id == transaction.id)
        {
            *existing = transaction.clone();
        } else {
            self.transactions.push(transaction.clone());
        }
    }

    fn settle(
        &mut self,
        call: &str,
        transaction: &Transaction,
        status: TransactionStatus,
    ) -> LinkResult<Transaction> {
        let id = transaction.id.clone().unwrap_or_default();
        self.write(format!("{} {}", call, id))?;
        let mut written = transaction.clone();
        written.status = status;
        written.version = Some(self.next_version());
        self.store_transaction(&written);
        Ok(written)
    }
}

fn not_found(what: &str) -> LinkError {
    ApiError::from_status(404, format!("{} not found", what)).into()
}

/// In-memory platform that records every call as a short line such as
/// `PUT /orders/o-1 accepted`.
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<PlatformState>,
}

impl FakePlatform {
    fn state(&self) -> std::sync::MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Calls starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn add_order(&self, order: Order) {
        let id = order.id.clone().unwrap_or_default();
        self.state().orders.insert(id, order);
    }

    pub fn add_unlinked(&self, order: Order) {
        self.state().unlinked.push(order);
    }

    pub fn add_transaction(&self, transaction: Transaction) {
        self.state().transactions.push(transaction);
    }

    pub fn add_checkin(&self, checkin_id: &str, consumer_id: &str) {
        self.state().checkins.insert(
            checkin_id.to_string(),
            Checkin {
                id: checkin_id.to_string(),
                consumer_id: consumer_id.to_string(),
                location_id: "loc-1".into(),
                expires_at: None,
                status: CheckinStatus::Active,
                consumer: None,
            },
        );
    }

    pub fn add_booking(&self, booking_id: &str) {
        self.state().bookings.insert(
            booking_id.to_string(),
            Booking {
                id: booking_id.to_string(),
                consumer: None,
                party_size: 4,
                start_time: Utc::now(),
                status: BookingStatus::Requested,
            },
        );
    }

    pub fn add_table(&self, table_name: &str, checkin_id: &str) {
        self.state().tables.push(TableAllocation {
            table_name: table_name.to_string(),
            checkin_id: checkin_id.to_string(),
            consumer_id: None,
            status: TableAllocationStatus::WaitingForConfirmation,
            rejection_reason: None,
        });
    }

    /// Every order write response for `order_id` carries this remainder.
    pub fn set_not_paying(&self, order_id: &str, amount: Money) {
        self.state().not_paying.insert(order_id.to_string(), amount);
    }

    /// The next write (PUT or settle call) fails with `error`.
    pub fn fail_next_put(&self, error: ApiError) {
        self.state().write_failures.push_back(error);
    }

    pub fn fail_transactions_for(&self, order_id: &str) {
        self.state()
            .failing_transaction_lists
            .insert(order_id.to_string());
    }

    pub fn stored_order(&self, order_id: &str) -> Option<Order> {
        self.state().orders.get(order_id).cloned()
    }

    /// Version tokens sent with each PUT of `order_id`, in order.
    pub fn sent_versions(&self, order_id: &str) -> Vec<Option<String>> {
        self.state()
            .sent_versions
            .get(order_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn get_order(&self, order_id: &str) -> LinkResult<Order> {
        let mut state = self.state();
        state.calls.push(format!("GET /orders/{}", order_id));
        state
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| not_found(order_id))
    }

    async fn get_unlinked_orders(&self) -> LinkResult<Vec<Order>> {
        let mut state = self.state();
        state.calls.push("GET /unlinked_orders".into());
        Ok(state.unlinked.clone())
    }

    async fn create_order(&self, order: &Order) -> LinkResult<Order> {
        let mut state = self.state();
        state.write(format!(
            "POST /orders {}",
            order.pos_id.as_deref().unwrap_or_default()
        ))?;
        state.created += 1;
        let mut created = order.clone();
        created.id = Some(format!("o-new-{}", state.created));
        created.version = Some(state.next_version());
        state
            .orders
            .insert(created.id.clone().unwrap_or_default(), created.clone());
        Ok(created)
    }

    async fn put_order(&self, order: &Order) -> LinkResult<Order> {
        let mut state = self.state();
        let id = order.id.clone().unwrap_or_default();
        state
            .sent_versions
            .entry(id.clone())
            .or_default()
            .push(order.version.clone());
        state.write(format!("PUT /orders/{} {}", id, order.status))?;

        let mut written = order.clone();
        written.version = Some(state.next_version());
        if let Some(remainder) = state.not_paying.get(&id) {
            written.not_paying_total = *remainder;
        }
        state.orders.insert(id, written.clone());
        Ok(written)
    }

    async fn reject_order(&self, order: &Order, _reason: &str) -> LinkResult<Order> {
        let mut state = self.state();
        let id = order.id.clone().unwrap_or_default();
        state.write(format!("REJECT /orders/{}", id))?;
        let mut written = order.clone();
        written.status = OrderStatus::Rejected;
        written.version = Some(state.next_version());
        state.orders.insert(id, written.clone());
        Ok(written)
    }

    async fn get_order_transactions(&self, order_id: &str) -> LinkResult<Vec<Transaction>> {
        let mut state = self.state();
        state
            .calls
            .push(format!("GET /orders/{}/transactions", order_id));
        if state.failing_transaction_lists.contains(order_id) {
            return Err(ApiError::from_status(500, "transactions unavailable").into());
        }
        Ok(state
            .transactions
            .iter()
            .filter(|t| t.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn get_transaction(&self, transaction_id: &str) -> LinkResult<Transaction> {
        let mut state = self.state();
        state.calls.push(format!("GET /transactions/{}", transaction_id));
        state
            .transactions
            .iter()
            .find(|t| t.id.as_deref() == Some(transaction_id))
            .cloned()
            .ok_or_else(|| not_found(transaction_id))
    }

    async fn create_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        let mut state = self.state();
        state.write(format!("POST /orders/{}/transactions", transaction.order_id))?;
        state.created += 1;
        let mut created = transaction.clone();
        created.id = Some(format!("t-new-{}", state.created));
        created.version = Some(state.next_version());
        state.store_transaction(&created);
        Ok(created)
    }

    async fn request_payment(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        self.state()
            .settle("REQUEST_PAYMENT", transaction, TransactionStatus::Waiting)
    }

    async fn reject_payment(
        &self,
        transaction: &Transaction,
        _reason: &str,
    ) -> LinkResult<Transaction> {
        self.state()
            .settle("REJECT_PAYMENT", transaction, TransactionStatus::Cancelled)
    }

    async fn complete_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        self.state()
            .settle("COMPLETE", transaction, TransactionStatus::Complete)
    }

    async fn cancel_transaction(&self, transaction: &Transaction) -> LinkResult<Transaction> {
        self.state()
            .settle("CANCEL", transaction, TransactionStatus::Cancelled)
    }

    async fn get_member(&self, member_id: &str) -> LinkResult<Member> {
        self.state().calls.push(format!("GET /members/{}", member_id));
        Ok(Member {
            id: Some(member_id.to_string()),
            ..Member::default()
        })
    }

    async fn create_member(&self, member: &Member) -> LinkResult<Member> {
        self.state().write("POST /members".into())?;
        let mut created = member.clone();
        created.id = Some("m-new".into());
        Ok(created)
    }

    async fn update_member(&self, member: &Member) -> LinkResult<Member> {
        self.state().write(format!(
            "PUT /members/{}",
            member.id.as_deref().unwrap_or_default()
        ))?;
        Ok(member.clone())
    }

    async fn delete_member(&self, member_id: &str) -> LinkResult<()> {
        self.state().write(format!("DELETE /members/{}", member_id))
    }

    async fn get_rewards(&self, member_id: &str) -> LinkResult<Vec<Reward>> {
        self.state()
            .calls
            .push(format!("GET /members/{}/rewards", member_id));
        Ok(Vec::new())
    }

    async fn redeem_points(&self, member_id: &str, redeem: &PointsRedeem) -> LinkResult<Member> {
        self.state()
            .write(format!("REDEEM_POINTS {} {}", member_id, redeem.order_id))?;
        Ok(Member {
            id: Some(member_id.to_string()),
            ..Member::default()
        })
    }

    async fn redeem_reward(
        &self,
        member_id: &str,
        reward_id: &str,
        order_id: &str,
    ) -> LinkResult<Member> {
        self.state().write(format!(
            "REDEEM_REWARD {} {} {}",
            member_id, reward_id, order_id
        ))?;
        Ok(Member {
            id: Some(member_id.to_string()),
            ..Member::default()
        })
    }

    async fn get_checkin(&self, checkin_id: &str) -> LinkResult<Checkin> {
        let mut state = self.state();
        state.calls.push(format!("GET /checkins/{}", checkin_id));
        state
            .checkins
            .get(checkin_id)
            .cloned()
            .ok_or_else(|| not_found(checkin_id))
    }

    async fn list_checkins(&self) -> LinkResult<Vec<Checkin>> {
        let mut state = self.state();
        state.calls.push("GET /checkins".into());
        Ok(state.checkins.values().cloned().collect())
    }

    async fn delete_checkin(&self, checkin_id: &str) -> LinkResult<()> {
        let mut state = self.state();
        state.write(format!("DELETE /checkins/{}", checkin_id))?;
        state.checkins.remove(checkin_id);
        Ok(())
    }

    async fn list_tables(&self) -> LinkResult<Vec<TableAllocation>> {
        let mut state = self.state();
        state.calls.push("GET /tables".into());
        Ok(state.tables.clone())
    }

    async fn confirm_table(&self, allocation: &TableAllocation) -> LinkResult<TableAllocation> {
        self.state()
            .write(format!("CONFIRM_TABLE {}", allocation.table_name))?;
        let mut confirmed = allocation.clone();
        confirmed.status = TableAllocationStatus::Confirmed;
        Ok(confirmed)
    }

    async fn delete_table(
        &self,
        allocation: &TableAllocation,
        reason: TableRejectionReason,
    ) -> LinkResult<()> {
        self.state()
            .write(format!("DELETE /tables/{} {}", allocation.table_name, reason))
    }

    async fn get_booking(&self, booking_id: &str) -> LinkResult<Booking> {
        let mut state = self.state();
        state.calls.push(format!("GET /bookings/{}", booking_id));
        state
            .bookings
            .get(booking_id)
            .cloned()
            .ok_or_else(|| not_found(booking_id))
    }

    async fn get_location(&self) -> LinkResult<Location> {
        self.state().calls.push("GET /location".into());
        Ok(Location {
            id: "loc-1".into(),
            name: "Harbour Kitchen".into(),
            timezone: Some("Europe/London".into()),
        })
    }

    async fn get_menu(&self) -> LinkResult<Vec<Product>> {
        self.state().calls.push("GET /menu".into());
        Ok(Vec::new())
    }

    async fn put_menu_products(&self, products: &[Product]) -> LinkResult<()> {
        self.state()
            .write(format!("PUT /menu/products {}", products.len()))
    }

    async fn put_menu_surcounts(&self, surcounts: &[Surcount]) -> LinkResult<()> {
        self.state()
            .write(format!("PUT /menu/surcounts {}", surcounts.len()))
    }

    async fn get_settings(&self) -> LinkResult<PlatformSettings> {
        self.state().calls.push("GET /config".into());
        Ok(PlatformSettings::default())
    }
}

// =============================================================================
// Scripted POS
// =============================================================================

#[derive(Debug, Clone)]
pub enum ConfirmAnswer {
    Accept(String),
    Decline(String),
    Fail,
}

#[derive(Debug, Clone, Copy)]
pub enum ReadyAnswer {
    Ready,
    Decline,
    OrderMissing,
}

/// One object playing all four POS managers, answering from a script and
/// logging every callback.
pub struct ScriptedPos {
    calls: Mutex<Vec<String>>,
    confirm: ConfirmAnswer,
    ready: ReadyAnswer,
    table: Option<TableDecision>,
    checkin_orders: Mutex<HashMap<String, Order>>,
}

impl ScriptedPos {
    pub fn accepting(pos_order_id: &str) -> Self {
        Self::with_confirm(ConfirmAnswer::Accept(pos_order_id.to_string()))
    }

    pub fn with_confirm(confirm: ConfirmAnswer) -> Self {
        ScriptedPos {
            calls: Mutex::new(Vec::new()),
            confirm,
            ready: ReadyAnswer::Ready,
            table: Some(TableDecision::Confirm),
            checkin_orders: Mutex::new(HashMap::new()),
        }
    }

    pub fn ready(mut self, answer: ReadyAnswer) -> Self {
        self.ready = answer;
        self
    }

    /// `None` makes the table callback fail.
    pub fn table(mut self, decision: Option<TableDecision>) -> Self {
        self.table = decision;
        self
    }

    pub fn set_checkin_order(&self, checkin_id: &str, order: Order) {
        self.checkin_orders
            .lock()
            .unwrap()
            .insert(checkin_id.to_string(), order);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn answer(&self) -> CoreResult<Confirmation> {
        match &self.confirm {
            ConfirmAnswer::Accept(pos_order_id) => Ok(Confirmation::Accepted {
                pos_order_id: pos_order_id.clone(),
            }),
            ConfirmAnswer::Decline(reason) => Ok(Confirmation::Declined {
                reason: reason.clone(),
            }),
            ConfirmAnswer::Fail => Err(CoreError::Rejected("kitchen offline".into())),
        }
    }
}

fn id_of(order: &Order) -> &str {
    order.id.as_deref().unwrap_or_default()
}

#[async_trait]
impl OrderingManager for ScriptedPos {
    async fn confirm_new_order(
        &self,
        order: &Order,
        consumer: &Consumer,
    ) -> CoreResult<Confirmation> {
        self.log(format!("confirm_new_order {} {}", id_of(order), consumer.id));
        self.answer()
    }

    async fn confirm_new_order_with_full_payment(
        &self,
        order: &Order,
        _consumer: &Consumer,
        _transactions: &[Transaction],
    ) -> CoreResult<Confirmation> {
        self.log(format!("confirm_new_order_with_full_payment {}", id_of(order)));
        self.answer()
    }

    async fn confirm_order_availability(
        &self,
        order: &Order,
        mode: OperatingMode,
    ) -> CoreResult<Confirmation> {
        self.log(format!("confirm_order_availability {} {}", id_of(order), mode));
        self.answer()
    }

    async fn order_cancelled(&self, order: &Order) -> CoreResult<()> {
        self.log(format!("order_cancelled {}", id_of(order)));
        Ok(())
    }

    async fn confirm_order_totals(&self, order: &Order) -> CoreResult<Order> {
        self.log(format!("confirm_order_totals {}", id_of(order)));
        Ok(order.clone())
    }

    async fn record_full_check_payment(&self, order: &Order) -> CoreResult<()> {
        self.log(format!("record_full_check_payment {}", id_of(order)));
        Ok(())
    }

    async fn record_partial_check_payment(
        &self,
        order: &Order,
        remainder: Money,
    ) -> CoreResult<()> {
        self.log(format!(
            "record_partial_check_payment {} {}",
            id_of(order),
            remainder
        ));
        Ok(())
    }

    async fn record_order_id(&self, pos_order_id: &str, order_id: &str) -> CoreResult<()> {
        self.log(format!("record_order_id {} {}", pos_order_id, order_id));
        Ok(())
    }

    async fn record_order_version(&self, pos_order_id: &str, version: &str) -> CoreResult<()> {
        self.log(format!("record_order_version {} {}", pos_order_id, version));
        Ok(())
    }

    async fn record_order_updated_at(
        &self,
        order_id: &str,
        _updated_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.log(format!("record_order_updated_at {}", order_id));
        Ok(())
    }

    async fn order_by_checkin(&self, checkin_id: &str) -> CoreResult<Option<Order>> {
        self.log(format!("order_by_checkin {}", checkin_id));
        Ok(self.checkin_orders.lock().unwrap().get(checkin_id).cloned())
    }
}

#[async_trait]
impl TransactionManager for ScriptedPos {
    async fn ready_to_pay(&self, transaction: &Transaction) -> CoreResult<Option<Transaction>> {
        let id = transaction.id.clone().unwrap_or_default();
        self.log(format!("ready_to_pay {}", id));
        match self.ready {
            ReadyAnswer::Ready => Ok(Some(transaction.clone())),
            ReadyAnswer::Decline => Ok(None),
            ReadyAnswer::OrderMissing => Err(CoreError::OrderNotOnPos(transaction.order_id.clone())),
        }
    }

    async fn record_transaction_version(
        &self,
        transaction_id: &str,
        version: &str,
    ) -> CoreResult<()> {
        self.log(format!(
            "record_transaction_version {} {}",
            transaction_id, version
        ));
        Ok(())
    }

    async fn payment_completed(&self, transaction: &Transaction) -> CoreResult<()> {
        self.log(format!(
            "payment_completed {}",
            transaction.id.as_deref().unwrap_or_default()
        ));
        Ok(())
    }

    async fn cancel_payment(&self, transaction: &Transaction) -> CoreResult<()> {
        self.log(format!(
            "cancel_payment {}",
            transaction.id.as_deref().unwrap_or_default()
        ));
        Ok(())
    }
}

#[async_trait]
impl RewardManager for ScriptedPos {
    async fn member_created(&self, member: &Member) -> CoreResult<()> {
        self.log(format!(
            "member_created {}",
            member.id.as_deref().unwrap_or_default()
        ));
        Ok(())
    }

    async fn member_updated(&self, member: &Member) -> CoreResult<()> {
        self.log(format!(
            "member_updated {}",
            member.id.as_deref().unwrap_or_default()
        ));
        Ok(())
    }
}

#[async_trait]
impl ReservationManager for ScriptedPos {
    async fn booking_created(&self, booking: &Booking) -> CoreResult<()> {
        self.log(format!("booking_created {}", booking.id));
        Ok(())
    }

    async fn booking_updated(&self, booking: &Booking) -> CoreResult<()> {
        self.log(format!("booking_updated {}", booking.id));
        Ok(())
    }

    async fn booking_deleted(&self, booking_id: &str) -> CoreResult<()> {
        self.log(format!("booking_deleted {}", booking_id));
        Ok(())
    }

    async fn consumer_checked_in(&self, checkin: &Checkin) -> CoreResult<()> {
        self.log(format!("consumer_checked_in {}", checkin.id));
        Ok(())
    }

    async fn consumer_checked_out(&self, checkin_id: &str) -> CoreResult<()> {
        self.log(format!("consumer_checked_out {}", checkin_id));
        Ok(())
    }

    async fn confirm_table_allocation(
        &self,
        allocation: &TableAllocation,
    ) -> CoreResult<TableDecision> {
        self.log(format!(
            "confirm_table_allocation {} {}",
            allocation.table_name, allocation.checkin_id
        ));
        self.table
            .ok_or_else(|| CoreError::Rejected("table service unavailable".into()))
    }
}

// =============================================================================
// Event Recording
// =============================================================================

#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<PlatformEvent>>,
}

impl RecordingHandler {
    /// Polls until `n` events arrived or about a second passed.
    pub async fn wait_for(&self, n: usize) -> Vec<PlatformEvent> {
        for _ in 0..200 {
            {
                let events = self.events.lock().unwrap();
                if events.len() >= n {
                    return events.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &PlatformEvent) -> LinkResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn recording_registry() -> (EventRegistry, Arc<RecordingHandler>) {
    let recorder = Arc::new(RecordingHandler::default());
    let registry = EventRegistryBuilder::new()
        .subscribe_all(recorder.clone())
        .build()
        .unwrap();
    (registry, recorder)
}

// =============================================================================
// Scripted Socket
// =============================================================================

struct ScriptedSink {
    sent: Arc<Mutex<Vec<String>>>,
    fail: Arc<AtomicBool>,
    stall: Arc<AtomicBool>,
}

#[async_trait]
impl SocketSink for ScriptedSink {
    async fn send_text(&mut self, text: String) -> LinkResult<()> {
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(LinkError::WebSocketError("scripted send failure".into()));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) {}
}

/// Connector whose sockets live in memory.
#[derive(Default)]
pub struct ScriptedConnector {
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
    sends_fail: Arc<AtomicBool>,
    sends_stall: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<String>>>,
    inbound: Mutex<Option<mpsc::Sender<SocketFrame>>>,
}

impl ScriptedConnector {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The next `n` connects fail.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.sends_fail.store(fail, Ordering::SeqCst);
    }

    /// Sends never complete while set.
    pub fn stall_sends(&self, stall: bool) {
        self.sends_stall.store(stall, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Delivers a text frame on the current socket.
    pub async fn push(&self, text: &str) {
        let inbound = self.inbound.lock().unwrap().clone();
        if let Some(tx) = inbound {
            tx.send(SocketFrame::Text(text.to_string())).await.unwrap();
        }
    }

    /// The peer closes the current socket.
    pub async fn close_remote(&self) {
        let inbound = self.inbound.lock().unwrap().clone();
        if let Some(tx) = inbound {
            tx.send(SocketFrame::Closed).await.unwrap();
        }
    }
}

#[async_trait]
impl SocketConnector for ScriptedConnector {
    async fn connect(&self, _url: &Url) -> LinkResult<SocketLink> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(LinkError::ConnectionFailed("scripted refusal".into()));
        }

        let (tx, rx) = mpsc::channel(64);
        *self.inbound.lock().unwrap() = Some(tx);
        Ok(SocketLink {
            sink: Box::new(ScriptedSink {
                sent: self.sent.clone(),
                fail: self.sends_fail.clone(),
                stall: self.sends_stall.clone(),
            }),
            incoming: rx,
        })
    }
}
