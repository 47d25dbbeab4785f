//! # Version Ledger & Creation Guard
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  VersionLedger                                                          │
//! │  ─────────────                                                          │
//! │  write response ──► record(Order("o-1"), "v7")                          │
//! │  next write     ──► stamp: order.version = latest(Order("o-1"))         │
//! │                                                                         │
//! │  CreationGuard                                                          │
//! │  ─────────────                                                          │
//! │  update_order(pos "p-1", id None)                                       │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  slot("p-1").lock() ──► Some(id)? ──yes──► PUT /orders/{id}             │
//! │                              │ no                                       │
//! │                              ▼                                          │
//! │                         POST /orders, slot = Some(new id)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use covers_core::TransactionStatus;

/// Terminal transaction states remembered before the oldest are dropped.
pub const SETTLED_CAPACITY: usize = 4096;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entity a version token belongs to, by platform id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionKey {
    Order(String),
    Transaction(String),
}

/// Latest version token seen for each entity still in play. Entries are
/// dropped once the entity reaches a terminal state.
#[derive(Debug, Default)]
pub struct VersionLedger {
    tokens: Mutex<HashMap<VersionKey, String>>,
}

impl VersionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, key: VersionKey, version: &str) {
        lock(&self.tokens).insert(key, version.to_string());
    }

    pub fn latest(&self, key: &VersionKey) -> Option<String> {
        lock(&self.tokens).get(key).cloned()
    }

    pub fn forget(&self, key: &VersionKey) {
        lock(&self.tokens).remove(key);
    }

    pub fn len(&self) -> usize {
        lock(&self.tokens).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holder of the platform id for one POS order. Locking it serializes every
/// writer that may need to create the order.
pub type CreationSlot = Arc<tokio::sync::Mutex<Option<String>>>;

/// Per-POS-order creation slots, kept until the order is finished.
#[derive(Debug, Default)]
pub struct CreationGuard {
    slots: Mutex<HashMap<String, CreationSlot>>,
}

impl CreationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `pos_id`, created empty on first use.
    pub fn slot(&self, pos_id: &str) -> CreationSlot {
        lock(&self.slots)
            .entry(pos_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    /// Records an id learned outside `update_order`, e.g. when accepting a
    /// platform order.
    pub async fn remember(&self, pos_id: &str, order_id: &str) {
        let slot = self.slot(pos_id);
        let mut known = slot.lock().await;
        *known = Some(order_id.to_string());
    }

    pub async fn known_id(&self, pos_id: &str) -> Option<String> {
        self.slot(pos_id).lock().await.clone()
    }

    /// Drops the slot of a finished order. The POS holds the platform id
    /// from here on.
    pub fn forget(&self, pos_id: &str) {
        lock(&self.slots).remove(pos_id);
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
struct SettledSet {
    seen: HashSet<(String, TransactionStatus)>,
    order: VecDeque<(String, TransactionStatus)>,
}

/// Terminal transaction states already reflected to the POS or platform.
///
/// Holds at most `capacity` claims; the oldest go first, so a redelivery
/// long after settlement may be reflected again.
#[derive(Debug)]
pub struct SettledTransactions {
    claims: Mutex<SettledSet>,
    capacity: usize,
}

impl Default for SettledTransactions {
    fn default() -> Self {
        Self::with_capacity(SETTLED_CAPACITY)
    }
}

impl SettledTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SettledTransactions {
            claims: Mutex::new(SettledSet::default()),
            capacity: capacity.max(1),
        }
    }

    /// Returns true the first time `(id, status)` is claimed.
    pub fn claim(&self, transaction_id: &str, status: TransactionStatus) -> bool {
        let mut claims = lock(&self.claims);
        let key = (transaction_id.to_string(), status);
        if !claims.seen.insert(key.clone()) {
            return false;
        }
        claims.order.push_back(key);

        while claims.order.len() > self.capacity {
            if let Some(oldest) = claims.order.pop_front() {
                claims.seen.remove(&oldest);
            }
        }
        true
    }

    /// Gives a claim back after the action it guarded failed.
    pub fn release(&self, transaction_id: &str, status: TransactionStatus) {
        let mut claims = lock(&self.claims);
        let key = (transaction_id.to_string(), status);
        if claims.seen.remove(&key) {
            claims.order.retain(|k| k != &key);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.claims).seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
