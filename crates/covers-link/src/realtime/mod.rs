//! # Realtime
//!
//! Socket channel, heartbeat watchdog and event dispatch.
//!
//! ```text
//! platform ══ws══► RealtimeChannel ──decode──► EventRegistry ──► EventHandler
//!                      │    ▲
//!             tick()   │    │ record_success()
//!                      ▼    │
//!                  HeartbeatMonitor (Clock)
//! ```

pub mod channel;
pub mod clock;
pub mod dispatcher;
pub mod heartbeat;

pub use channel::{
    ChannelSignal, ChannelState, RealtimeChannel, SocketConnector, SocketFrame, SocketLink,
    SocketSink, TickReport, WsConnector,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{EventHandler, EventRegistry, EventRegistryBuilder};
pub use heartbeat::HeartbeatMonitor;
