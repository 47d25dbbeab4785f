//! Tracing setup for hosts that do not install their own subscriber.

use tracing::{info_span, Span};
use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG`.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=covers_link=trace` - Trace the link only, including HTTP successes
/// - Default: INFO level
///
/// Returns false when a global subscriber was already set.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,covers_link=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Root span for one link instance; components log inside children of it.
pub fn link_span(location_id: &str, vendor: &str) -> Span {
    info_span!("covers_link", location_id = %location_id, vendor = %vendor)
}

/// Child span for a named component.
pub fn component_span(parent: &Span, component: &'static str) -> Span {
    info_span!(parent: parent, "component", name = component)
}
