//! # Event Registry
//!
//! Publish/subscribe table from [`EventKind`] to handler.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EventRegistryBuilder                                                   │
//! │    .subscribe(OrderCreated, h1)                                         │
//! │    .subscribe_all(h2)            fills every kind not yet taken         │
//! │    .build()  ──► Err(MissingHandler(kind)) if any kind is uncovered     │
//! │                                                                         │
//! │  EventRegistry::dispatch(event) ──► exactly one handler per event       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Coverage is checked once at startup, so a frame can never arrive for a
//! kind nobody listens to.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{LinkError, LinkResult};
use crate::protocol::{EventKind, PlatformEvent};

/// Receives decoded push events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &PlatformEvent) -> LinkResult<()>;
}

/// Collects subscriptions before the channel starts.
#[derive(Default)]
pub struct EventRegistryBuilder {
    handlers: BTreeMap<EventKind, Arc<dyn EventHandler>>,
}

impl EventRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for one kind, replacing any earlier subscription.
    pub fn subscribe(mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Registers `handler` for every kind that has no subscriber yet.
    pub fn subscribe_all(mut self, handler: Arc<dyn EventHandler>) -> Self {
        for kind in EventKind::ALL {
            self.handlers
                .entry(kind)
                .or_insert_with(|| Arc::clone(&handler));
        }
        self
    }

    /// Fails with `MissingHandler` naming the first uncovered kind.
    pub fn build(self) -> LinkResult<EventRegistry> {
        if let Some(kind) = EventKind::ALL
            .into_iter()
            .find(|kind| !self.handlers.contains_key(kind))
        {
            return Err(LinkError::MissingHandler(kind));
        }
        Ok(EventRegistry {
            handlers: self.handlers,
        })
    }
}

/// Validated subscription table.
pub struct EventRegistry {
    handlers: BTreeMap<EventKind, Arc<dyn EventHandler>>,
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EventRegistry {
    /// Hands the event to its handler and returns the handler's result.
    pub async fn dispatch(&self, event: &PlatformEvent) -> LinkResult<()> {
        let handler = self
            .handlers
            .get(&event.kind)
            .ok_or(LinkError::MissingHandler(event.kind))?;
        debug!(kind = %event.kind, "Dispatching platform event");
        handler.handle(event).await
    }
}
