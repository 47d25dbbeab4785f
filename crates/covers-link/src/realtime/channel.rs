//! # Realtime Channel
//!
//! The single socket connection to the platform.
//!
//! ## Connection Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Channel States                                       │
//! │                                                                         │
//! │  ┌────────────┐    connect()    ┌────────────┐                         │
//! │  │Disconnected│ ──────────────► │ Connecting │                         │
//! │  └────────────┘  (debounced)    └─────┬──────┘                         │
//! │        ▲                    success   │   failure                       │
//! │        │                        ┌─────┴─────┐                          │
//! │        │                        ▼           │                           │
//! │        │                  ┌──────────┐      │                           │
//! │        │◄──── socket ─────│   Open   │      │                           │
//! │        │      closed      └────┬─────┘      │                           │
//! │        │                       │ close()    │                           │
//! │        │                       ▼            │                           │
//! │        │                  ┌──────────┐      │                           │
//! │        └──────────────────│ Closing  │◄─────┘ (back to Disconnected)    │
//! │                           └──────────┘                                  │
//! │                                                                         │
//! │  HEARTBEAT TICK (every heartbeat_interval)                             │
//! │  ────────────────────────────────────────                              │
//! │  1. silence > timeout?  ──► ChannelSignal::TimeoutReached (once)        │
//! │  2. Open?               ──► send "primus::ping::<millis>"               │
//! │  3. Disconnected?       ──► connect() (debounced)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The write half lives behind its own lock, so a stalled send never holds
//! up the reader, `state()` or `connect()`. Sends are bounded by the
//! connect timeout.
//!
//! [`SocketConnector`] hides tokio-tungstenite so tests can script the
//! socket and drive [`RealtimeChannel::tick`] with a [`ManualClock`].
//!
//! [`ManualClock`]: super::clock::ManualClock

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn, Instrument, Span};
use url::Url;

use super::clock::Clock;
use super::dispatcher::EventRegistry;
use super::heartbeat::HeartbeatMonitor;
use crate::config::RealtimeSettings;
use crate::error::{LinkError, LinkResult};
use crate::protocol::{decode_frame, ping_frame, Frame};

// =============================================================================
// Channel State & Signals
// =============================================================================

/// Connection state of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Disconnected => write!(f, "disconnected"),
            ChannelState::Connecting => write!(f, "connecting"),
            ChannelState::Open => write!(f, "open"),
            ChannelState::Closing => write!(f, "closing"),
        }
    }
}

/// Notifications for the owner of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSignal {
    /// The socket opened; `reconnect` is false only for the very first open.
    Connected { reconnect: bool },
    /// The open socket was lost (peer close or failed send).
    Disconnected,
    /// No successful communication within the configured timeout.
    TimeoutReached,
}

/// What one heartbeat tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub timed_out: bool,
    pub pinged: bool,
    pub reconnect_attempted: bool,
}

// =============================================================================
// Socket Abstraction
// =============================================================================

/// Inbound socket events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketFrame {
    Text(String),
    Closed,
}

/// Write half of an open socket.
#[async_trait]
pub trait SocketSink: Send {
    async fn send_text(&mut self, text: String) -> LinkResult<()>;
    async fn close(&mut self);
}

/// An open socket: a sink plus a stream of inbound frames.
pub struct SocketLink {
    pub sink: Box<dyn SocketSink>,
    pub incoming: mpsc::Receiver<SocketFrame>,
}

/// Opens sockets.
#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn connect(&self, url: &Url) -> LinkResult<SocketLink>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// tokio-tungstenite connector.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

struct WsSink {
    sink: SplitSink<WsStream, WsMessage>,
    pump: JoinHandle<()>,
}

#[async_trait]
impl SocketSink for WsSink {
    async fn send_text(&mut self, text: String) -> LinkResult<()> {
        self.sink.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.sink.send(WsMessage::Close(None)).await;
        self.pump.abort();
    }
}

#[async_trait]
impl SocketConnector for WsConnector {
    async fn connect(&self, url: &Url) -> LinkResult<SocketLink> {
        let (ws_stream, response) = connect_async(url.as_str()).await?;
        debug!(status = ?response.status(), "WebSocket handshake complete");

        let (sink, mut stream) = ws_stream.split();
        let (tx, rx) = mpsc::channel(64);

        let pump = tokio::spawn(async move {
            while let Some(result) = stream.next().await {
                match result {
                    Ok(WsMessage::Text(text)) => {
                        if tx.send(SocketFrame::Text(text.to_string())).await.is_err() {
                            return;
                        }
                    }
                    Ok(WsMessage::Close(frame)) => {
                        info!(?frame, "Received close frame");
                        break;
                    }
                    Ok(WsMessage::Binary(_)) => {
                        warn!("Received unexpected binary message");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(?e, "WebSocket error");
                        break;
                    }
                }
            }
            let _ = tx.send(SocketFrame::Closed).await;
        });

        Ok(SocketLink {
            sink: Box::new(WsSink { sink, pump }),
            incoming: rx,
        })
    }
}

// =============================================================================
// Channel
// =============================================================================

struct SharedState {
    state: ChannelState,
    monitor: HeartbeatMonitor,
    reader: Option<JoinHandle<()>>,
    /// Bumped on every open so a stale reader cannot close a newer socket.
    generation: u64,
    ever_connected: bool,
    closed: bool,
}

/// Heartbeat task handle. `stopped` is set by `close()` and keeps a late
/// `start_heartbeat` from spawning again.
#[derive(Default)]
struct HeartbeatSlot {
    task: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
    stopped: bool,
}

struct ChannelInner {
    url: Url,
    connector: Arc<dyn SocketConnector>,
    clock: Arc<dyn Clock>,
    registry: Arc<EventRegistry>,
    signals: mpsc::Sender<ChannelSignal>,
    heartbeat_interval: Duration,
    connect_timeout: Duration,
    heartbeat: StdMutex<HeartbeatSlot>,
    shared: Mutex<SharedState>,
    /// Write half tagged with its generation. Lock order: `shared`, then `sink`.
    sink: Mutex<Option<(u64, Box<dyn SocketSink>)>>,
    span: Span,
}

/// Handle to the realtime channel. Cheap to clone.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("url", &self.inner.url.as_str())
            .finish_non_exhaustive()
    }
}

impl RealtimeChannel {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        url: Url,
        settings: &RealtimeSettings,
        connector: Arc<dyn SocketConnector>,
        clock: Arc<dyn Clock>,
        registry: Arc<EventRegistry>,
        signals: mpsc::Sender<ChannelSignal>,
        span: Span,
    ) -> Self {
        let timeout_ms = secs_to_millis(settings.timeout_secs);
        let debounce_ms = secs_to_millis(settings.reconnect_debounce_secs);
        let monitor = HeartbeatMonitor::new(clock.now_millis(), timeout_ms, debounce_ms);

        RealtimeChannel {
            inner: Arc::new(ChannelInner {
                url,
                connector,
                clock,
                registry,
                signals,
                heartbeat_interval: settings.heartbeat_interval(),
                connect_timeout: settings.connect_timeout(),
                heartbeat: StdMutex::new(HeartbeatSlot::default()),
                shared: Mutex::new(SharedState {
                    state: ChannelState::Disconnected,
                    monitor,
                    reader: None,
                    generation: 0,
                    ever_connected: false,
                    closed: false,
                }),
                sink: Mutex::new(None),
                span,
            }),
        }
    }

    pub async fn state(&self) -> ChannelState {
        self.inner.shared.lock().await.state
    }

    /// Opens the socket.
    ///
    /// Returns `Ok(false)` without touching the network when the channel is
    /// already open or connecting, or when an attempt started within the
    /// debounce window.
    pub async fn connect(&self) -> LinkResult<bool> {
        self.connect_inner().instrument(self.inner.span.clone()).await
    }

    async fn connect_inner(&self) -> LinkResult<bool> {
        let inner = &self.inner;
        {
            let mut shared = inner.shared.lock().await;
            if shared.closed {
                return Err(LinkError::ShuttingDown);
            }
            if matches!(shared.state, ChannelState::Open | ChannelState::Connecting) {
                return Ok(false);
            }
            if !shared.monitor.try_begin_attempt(inner.clock.now_millis()) {
                debug!("Connect attempt debounced");
                return Ok(false);
            }
            shared.state = ChannelState::Connecting;
        }

        info!(url = %inner.url, "Connecting to platform socket");
        let attempt = timeout(inner.connect_timeout, inner.connector.connect(&inner.url)).await;

        let mut shared = inner.shared.lock().await;
        let link = match attempt {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                shared.state = ChannelState::Disconnected;
                warn!(error = %e, "Socket connection failed");
                return Err(e);
            }
            Err(_) => {
                shared.state = ChannelState::Disconnected;
                warn!("Socket connection timed out");
                return Err(LinkError::Timeout(inner.connect_timeout.as_secs()));
            }
        };

        let SocketLink { mut sink, incoming } = link;
        if shared.closed {
            shared.state = ChannelState::Disconnected;
            drop(shared);
            let _ = timeout(inner.connect_timeout, sink.close()).await;
            return Err(LinkError::ShuttingDown);
        }

        shared.generation += 1;
        shared.state = ChannelState::Open;
        *inner.sink.lock().await = Some((shared.generation, sink));
        shared.monitor.record_success(inner.clock.now_millis());
        let reconnect = shared.ever_connected;
        shared.ever_connected = true;

        if let Some(old) = shared.reader.take() {
            old.abort();
        }
        shared.reader = Some(self.spawn_reader(incoming, shared.generation));
        drop(shared);

        info!(reconnect, "Platform socket open");
        self.start_heartbeat();
        if inner
            .signals
            .send(ChannelSignal::Connected { reconnect })
            .await
            .is_err()
        {
            debug!("Signal receiver dropped");
        }
        Ok(true)
    }

    /// One heartbeat iteration. The heartbeat task calls this on every tick.
    pub async fn tick(&self) -> TickReport {
        self.tick_inner().instrument(self.inner.span.clone()).await
    }

    async fn tick_inner(&self) -> TickReport {
        let inner = &self.inner;
        let mut report = TickReport::default();

        let state = {
            let mut shared = inner.shared.lock().await;
            report.timed_out = shared.monitor.check_timeout(inner.clock.now_millis());
            shared.state
        };

        if report.timed_out {
            warn!("No successful communication within timeout");
            if inner.signals.send(ChannelSignal::TimeoutReached).await.is_err() {
                debug!("Signal receiver dropped");
            }
        }

        match state {
            ChannelState::Open => {
                report.pinged = self.ping().await;
            }
            ChannelState::Disconnected => {
                report.reconnect_attempted = true;
                if let Err(e) = self.connect_inner().await {
                    debug!(error = %e, "Reconnect attempt failed");
                }
            }
            ChannelState::Connecting | ChannelState::Closing => {}
        }

        report
    }

    async fn ping(&self) -> bool {
        let inner = &self.inner;
        let mut slot = inner.sink.lock().await;
        let Some((generation, sink)) = slot.as_mut() else {
            return false;
        };
        let generation = *generation;

        let frame = ping_frame(inner.clock.now_millis());
        let failure = match timeout(inner.connect_timeout, sink.send_text(frame)).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(_) => Some(LinkError::Timeout(inner.connect_timeout.as_secs())),
        };

        if let Some(e) = failure {
            slot.take();
            drop(slot);
            warn!(error = %e, "Heartbeat send failed, marking channel disconnected");
            self.mark_disconnected(generation).await;
            return false;
        }
        drop(slot);

        inner
            .shared
            .lock()
            .await
            .monitor
            .record_success(inner.clock.now_millis());
        true
    }

    /// Moves an open socket of `generation` to Disconnected and tells the
    /// owner. Stale generations are ignored.
    async fn mark_disconnected(&self, generation: u64) {
        {
            let mut shared = self.inner.shared.lock().await;
            if shared.generation != generation || shared.state != ChannelState::Open {
                return;
            }
            shared.state = ChannelState::Disconnected;
            warn!(generation, "Platform socket lost");

            let mut slot = self.inner.sink.lock().await;
            if matches!(slot.as_ref(), Some((current, _)) if *current == generation) {
                slot.take();
            }
        }

        if self.inner.signals.send(ChannelSignal::Disconnected).await.is_err() {
            debug!("Signal receiver dropped");
        }
    }

    /// Closes the socket and stops the heartbeat and reader tasks.
    pub async fn close(&self) {
        {
            let mut shared = self.inner.shared.lock().await;
            shared.closed = true;
            shared.state = ChannelState::Closing;

            if let Some(reader) = shared.reader.take() {
                reader.abort();
            }
        }
        {
            let mut heartbeat = self.heartbeat_slot();
            heartbeat.stopped = true;
            if let Some((stop, handle)) = heartbeat.task.take() {
                let _ = stop.try_send(());
                handle.abort();
            }
        }

        let sink = self.inner.sink.lock().await.take();
        if let Some((_, mut sink)) = sink {
            if timeout(self.inner.connect_timeout, sink.close()).await.is_err() {
                warn!("Socket close timed out");
            }
        }

        self.inner.shared.lock().await.state = ChannelState::Disconnected;
        info!("Platform socket closed");
    }

    fn heartbeat_slot(&self) -> std::sync::MutexGuard<'_, HeartbeatSlot> {
        self.inner
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the heartbeat task unless it is already running or the
    /// channel was closed. Opening the socket calls this; owners also call
    /// it after a refused first connect so the heartbeat retries.
    ///
    /// Not async: the heartbeat task itself reconnects through here.
    pub fn start_heartbeat(&self) {
        let mut slot = self.heartbeat_slot();
        if slot.stopped || slot.task.is_some() {
            return;
        }

        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
        let channel = self.clone();
        let period = self.inner.heartbeat_interval;

        let handle = tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            channel.tick().await;
                        }
                        _ = stop_rx.recv() => {
                            debug!("Heartbeat stopped");
                            break;
                        }
                    }
                }
            }
            .instrument(self.inner.span.clone()),
        );

        slot.task = Some((stop_tx, handle));
    }

    fn spawn_reader(
        &self,
        mut incoming: mpsc::Receiver<SocketFrame>,
        generation: u64,
    ) -> JoinHandle<()> {
        let channel = self.clone();
        tokio::spawn(
            async move {
                while let Some(frame) = incoming.recv().await {
                    match frame {
                        SocketFrame::Text(text) => channel.on_text(&text).await,
                        SocketFrame::Closed => break,
                    }
                }
                channel.on_socket_closed(generation).await;
            }
            .instrument(self.inner.span.clone()),
        )
    }

    /// Handles one inbound frame. Events are dispatched before the next
    /// frame is read.
    async fn on_text(&self, text: &str) {
        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        {
            let mut shared = self.inner.shared.lock().await;
            shared.monitor.record_success(self.inner.clock.now_millis());
        }

        match frame {
            Frame::Pong => debug!("Heartbeat answered"),
            Frame::Unknown { name } => warn!(event = %name, "Dropping unknown platform event"),
            Frame::Event(event) => {
                if let Err(e) = self.inner.registry.dispatch(&event).await {
                    error!(kind = %event.kind, error = %e, "Event handler failed");
                }
            }
        }
    }

    async fn on_socket_closed(&self, generation: u64) {
        debug!(generation, "Socket reader finished");
        self.mark_disconnected(generation).await;
    }
}

fn secs_to_millis(secs: u64) -> i64 {
    i64::try_from(secs.saturating_mul(1_000)).unwrap_or(i64::MAX)
}

// =============================================================================
// Unit Tests
// =============================================================================
