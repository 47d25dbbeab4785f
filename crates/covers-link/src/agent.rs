//! # Link Agent
//!
//! Wires the HTTP client, the reconciliation engine and the realtime channel
//! together and keeps them running for one location.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LinkAgent Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         LinkAgent                                │  │
//! │  │                                                                  │  │
//! │  │  • Builds the client, engine and channel from LinkConfig         │  │
//! │  │  • Opens the socket and starts the heartbeat                     │  │
//! │  │  • Reacts to channel signals                                     │  │
//! │  │  • Emits status events to the host POS                           │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ PlatformClient │  │ Reconciliation │  │   RealtimeChannel      │    │
//! │  │    (REST)      │  │    Engine      │  │   (socket)             │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Signed calls   │  │ Order and      │  │ Heartbeat, reconnect,  │    │
//! │  │ to the platform│  │ payment flows  │  │ event dispatch         │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  CHANNEL SIGNALS:                                                      │
//! │  ────────────────                                                      │
//! │  Connected       - refresh all unlinked orders                         │
//! │  Disconnected    - mark the link down, heartbeat reconnects            │
//! │  TimeoutReached  - mark the link degraded, try to reconnect            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use covers_core::OperatingMode;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn, Instrument};

use crate::api::{HttpTransport, PlatformApi, PlatformClient};
use crate::auth::TokenSigner;
use crate::config::LinkConfig;
use crate::contracts::PosManagers;
use crate::engine::{EngineHandler, ReconciliationEngine, SweepReport};
use crate::error::{LinkError, LinkResult};
use crate::realtime::{
    ChannelSignal, ChannelState, Clock, EventRegistryBuilder, RealtimeChannel, SocketConnector,
    SystemClock, WsConnector,
};
use crate::telemetry::{component_span, link_span};

// =============================================================================
// Link Status
// =============================================================================

/// Current link status for external queries.
#[derive(Debug, Clone)]
pub struct LinkStatus {
    /// Last known channel state.
    pub channel_state: ChannelState,

    /// Whether the socket is open.
    pub is_connected: bool,

    /// Set when the platform went silent past the timeout; cleared on the
    /// next successful open.
    pub degraded: bool,

    /// Number of opens after the first one.
    pub reconnects: u64,

    /// Result of the most recent reconciliation sweep.
    pub last_sweep: Option<SweepReport>,

    /// Last error message (if any).
    pub last_error: Option<String>,

    pub mode: OperatingMode,
}

impl Default for LinkStatus {
    fn default() -> Self {
        LinkStatus {
            channel_state: ChannelState::Disconnected,
            is_connected: false,
            degraded: false,
            reconnects: 0,
            last_sweep: None,
            last_error: None,
            mode: OperatingMode::default(),
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Trait for surfacing link events to the host POS.
pub trait LinkEventEmitter: Send + Sync {
    /// Emits a link status change event.
    fn emit_status(&self, status: &LinkStatus);

    /// Emits a link error event.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl LinkEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &LinkStatus) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Link Agent
// =============================================================================

/// Runs the integration for one location.
pub struct LinkAgent {
    config: Arc<LinkConfig>,
    managers: PosManagers,
    status: Arc<RwLock<LinkStatus>>,
    emitter: Arc<dyn LinkEventEmitter>,
    connector: Arc<dyn SocketConnector>,
    clock: Arc<dyn Clock>,

    /// Replaces the HTTP client when set.
    api: Option<Arc<dyn PlatformApi>>,

    shutdown_tx: Option<mpsc::Sender<()>>,
    engine: Option<Arc<ReconciliationEngine>>,
    channel: Option<RealtimeChannel>,
}

impl LinkAgent {
    /// Creates an agent that talks to the configured platform.
    pub fn new(config: LinkConfig, managers: PosManagers) -> Self {
        Self::with_emitter(config, managers, Arc::new(NoOpEmitter))
    }

    /// Creates an agent with a custom event emitter.
    pub fn with_emitter(
        config: LinkConfig,
        managers: PosManagers,
        emitter: Arc<dyn LinkEventEmitter>,
    ) -> Self {
        let status = LinkStatus {
            mode: config.mode(),
            ..Default::default()
        };

        LinkAgent {
            config: Arc::new(config),
            managers,
            status: Arc::new(RwLock::new(status)),
            emitter,
            connector: Arc::new(WsConnector),
            clock: Arc::new(SystemClock),
            api: None,
            shutdown_tx: None,
            engine: None,
            channel: None,
        }
    }

    pub async fn status(&self) -> LinkStatus {
        self.status.read().await.clone()
    }

    /// The running engine, for POS-initiated operations.
    pub fn engine(&self) -> Option<Arc<ReconciliationEngine>> {
        self.engine.clone()
    }

    /// Starts the link.
    ///
    /// A refused first connect is not an error: the heartbeat keeps retrying
    /// and the first successful open triggers a full refresh.
    pub async fn start(&mut self) -> LinkResult<LinkAgentHandle> {
        if self.shutdown_tx.is_some() {
            return Err(LinkError::InvalidConfig("Link agent already started".into()));
        }
        self.config.validate()?;

        let span = link_span(&self.config.platform.location_id, &self.config.platform.vendor);
        info!(
            parent: &span,
            mode = %self.config.mode(),
            base_url = %self.config.platform.base_url,
            "Starting link agent"
        );

        let api = match &self.api {
            Some(api) => api.clone(),
            None => {
                let signer = Arc::new(TokenSigner::from_settings(&self.config.platform));
                let transport =
                    HttpTransport::new(&self.config, signer, component_span(&span, "http"))?;
                Arc::new(PlatformClient::new(transport)) as Arc<dyn PlatformApi>
            }
        };

        let engine = Arc::new(ReconciliationEngine::from_config(
            api,
            self.managers.clone(),
            &self.config,
            component_span(&span, "engine"),
        ));

        let registry = EventRegistryBuilder::new()
            .subscribe_all(Arc::new(EngineHandler::new(engine.clone())))
            .build()?;

        let (signal_tx, signal_rx) = mpsc::channel(16);
        let channel = RealtimeChannel::new(
            self.config.socket_url_with_token()?,
            &self.config.realtime,
            self.connector.clone(),
            self.clock.clone(),
            Arc::new(registry),
            signal_tx,
            component_span(&span, "realtime"),
        );

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        self.shutdown_tx = Some(shutdown_tx.clone());
        self.engine = Some(engine.clone());
        self.channel = Some(channel.clone());

        tokio::spawn(
            Self::signal_loop(
                engine.clone(),
                channel.clone(),
                self.status.clone(),
                self.emitter.clone(),
                signal_rx,
                shutdown_rx,
            )
            .instrument(span.clone()),
        );

        if let Err(e) = channel.connect().await {
            warn!(parent: &span, error = %e, "Initial connect failed, heartbeat will retry");
            self.status.write().await.last_error = Some(e.to_string());
            self.emitter.emit_error(&e.to_string(), true);
        }
        channel.start_heartbeat();

        info!(parent: &span, "Link agent started");
        Ok(LinkAgentHandle::new(
            shutdown_tx,
            self.status.clone(),
            engine,
        ))
    }

    /// Closes the channel and stops the signal loop.
    pub async fn shutdown(&mut self) -> LinkResult<()> {
        info!("Shutting down link agent");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }

        {
            let mut s = self.status.write().await;
            s.channel_state = ChannelState::Disconnected;
            s.is_connected = false;
        }

        info!("Link agent stopped");
        Ok(())
    }

    /// Reacts to channel signals until shutdown.
    async fn signal_loop(
        engine: Arc<ReconciliationEngine>,
        channel: RealtimeChannel,
        status: Arc<RwLock<LinkStatus>>,
        emitter: Arc<dyn LinkEventEmitter>,
        mut signal_rx: mpsc::Receiver<ChannelSignal>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                Some(signal) = signal_rx.recv() => match signal {
                    ChannelSignal::Connected { reconnect } => {
                        {
                            let mut s = status.write().await;
                            s.channel_state = ChannelState::Open;
                            s.is_connected = true;
                            s.degraded = false;
                            if reconnect {
                                s.reconnects += 1;
                            }
                        }
                        emitter.emit_status(&status.read().await.clone());

                        // Orders created while the socket was down never
                        // produced an event.
                        match engine.refresh_all_orders().await {
                            Ok(report) => {
                                debug!(?report, "Refresh after connect done");
                                status.write().await.last_sweep = Some(report);
                            }
                            Err(e) => {
                                error!(error = %e, "Refresh after connect failed");
                                status.write().await.last_error = Some(e.to_string());
                                emitter.emit_error(&e.to_string(), true);
                            }
                        }
                    }

                    ChannelSignal::Disconnected => {
                        {
                            let mut s = status.write().await;
                            s.channel_state = ChannelState::Disconnected;
                            s.is_connected = false;
                        }
                        emitter.emit_status(&status.read().await.clone());
                        info!("Platform socket lost, heartbeat will reconnect");
                    }

                    ChannelSignal::TimeoutReached => {
                        let state = channel.state().await;
                        {
                            let mut s = status.write().await;
                            s.degraded = true;
                            s.channel_state = state;
                            s.is_connected = state == ChannelState::Open;
                        }
                        emitter.emit_error("No communication with the platform", true);

                        if let Err(e) = channel.connect().await {
                            debug!(error = %e, "Reconnect after timeout failed");
                        }
                    }
                },

                _ = shutdown_rx.recv() => {
                    info!("Signal loop received shutdown");
                    break;
                }
            }
        }

        info!("Signal loop stopped");
    }
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Handle for controlling a running LinkAgent from outside.
#[derive(Clone)]
pub struct LinkAgentHandle {
    shutdown_tx: mpsc::Sender<()>,
    status: Arc<RwLock<LinkStatus>>,
    engine: Arc<ReconciliationEngine>,
}

impl LinkAgentHandle {
    pub(crate) fn new(
        shutdown_tx: mpsc::Sender<()>,
        status: Arc<RwLock<LinkStatus>>,
        engine: Arc<ReconciliationEngine>,
    ) -> Self {
        LinkAgentHandle {
            shutdown_tx,
            status,
            engine,
        }
    }

    pub async fn status(&self) -> LinkStatus {
        self.status.read().await.clone()
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    /// Signals the agent to stop reacting to channel signals.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating LinkAgent with options.
pub struct LinkAgentBuilder {
    config: LinkConfig,
    managers: PosManagers,
    emitter: Option<Arc<dyn LinkEventEmitter>>,
    connector: Option<Arc<dyn SocketConnector>>,
    clock: Option<Arc<dyn Clock>>,
    api: Option<Arc<dyn PlatformApi>>,
}

impl LinkAgentBuilder {
    pub fn new(config: LinkConfig) -> Self {
        LinkAgentBuilder {
            config,
            managers: PosManagers::new(),
            emitter: None,
            connector: None,
            clock: None,
            api: None,
        }
    }

    pub fn with_managers(mut self, managers: PosManagers) -> Self {
        self.managers = managers;
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn LinkEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn SocketConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Talks to `api` instead of building an HTTP client.
    pub fn with_api(mut self, api: Arc<dyn PlatformApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Builds the LinkAgent.
    pub fn build(self) -> LinkResult<LinkAgent> {
        self.config.validate()?;

        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));
        let mut agent = LinkAgent::with_emitter(self.config, self.managers, emitter);
        if let Some(connector) = self.connector {
            agent.connector = connector;
        }
        if let Some(clock) = self.clock {
            agent.clock = clock;
        }
        agent.api = self.api;
        Ok(agent)
    }
}
