//! # Link Configuration
//!
//! Configuration management for the platform link.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     COVERS_BASE_URL=https://api.platform.example/v1                    │
//! │     COVERS_MODE=bistro                                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/covers/link.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.covers.covers/link.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     restaurant mode, delivery + pickup, 10 s heartbeat                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # link.toml
//! [platform]
//! base_url = "https://api.platform.example/v1"
//! socket_url = "wss://socket.platform.example/primus"
//! location_id = "loc-123"
//! location_token = "tok-abc"
//! vendor = "acme-pos"
//! secret = "shared-secret"
//!
//! [realtime]
//! heartbeat_interval_secs = 10
//! timeout_secs = 60
//!
//! [pos]
//! mode = "restaurant"  # restaurant | bistro
//! supported_order_types = ["delivery", "pickup"]
//!
//! [http]
//! success_log_level = "debug"  # trace | debug | info
//! ```

use std::path::PathBuf;
use std::time::Duration;

use covers_core::{OperatingMode, OrderType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LinkError, LinkResult};

// =============================================================================
// Platform Settings
// =============================================================================

/// Where the platform lives and how this location authenticates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// REST base URL, endpoint paths are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Socket URL, the location token is added as a `token` query pair.
    #[serde(default = "default_socket_url")]
    pub socket_url: String,

    #[serde(default)]
    pub location_id: String,

    /// Token the platform issued for the socket connection.
    #[serde(default)]
    pub location_token: String,

    /// Sent as the `vendor` header on every request.
    #[serde(default)]
    pub vendor: String,

    /// Shared secret used to sign the authorization token.
    #[serde(default)]
    pub secret: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_socket_url() -> String {
    "ws://localhost:8080/primus".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_token_lifetime() -> u64 {
    300
}

impl Default for PlatformSettings {
    fn default() -> Self {
        PlatformSettings {
            base_url: default_base_url(),
            socket_url: default_socket_url(),
            location_id: String::new(),
            location_token: String::new(),
            vendor: String::new(),
            secret: String::new(),
            request_timeout_secs: default_request_timeout(),
            token_lifetime_secs: default_token_lifetime(),
        }
    }
}

// =============================================================================
// Realtime Settings
// =============================================================================

/// Heartbeat and reconnect timing for the socket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// Seconds between heartbeat ticks.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Minimum seconds between two connection attempts.
    #[serde(default = "default_reconnect_debounce")]
    pub reconnect_debounce_secs: u64,

    /// Silence longer than this marks the channel degraded.
    #[serde(default = "default_socket_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    10
}

fn default_reconnect_debounce() -> u64 {
    10
}

fn default_socket_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        RealtimeSettings {
            heartbeat_interval_secs: default_heartbeat_interval(),
            reconnect_debounce_secs: default_reconnect_debounce(),
            timeout_secs: default_socket_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl RealtimeSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// =============================================================================
// POS Settings
// =============================================================================

/// How this POS runs its floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosSettings {
    #[serde(default)]
    pub mode: OperatingMode,

    /// Order types the POS can fulfil, everything else is rejected.
    #[serde(default = "default_supported_types")]
    pub supported_order_types: Vec<OrderType>,
}

fn default_supported_types() -> Vec<OrderType> {
    vec![OrderType::Delivery, OrderType::Pickup]
}

impl Default for PosSettings {
    fn default() -> Self {
        PosSettings {
            mode: OperatingMode::default(),
            supported_order_types: default_supported_types(),
        }
    }
}

// =============================================================================
// HTTP Settings
// =============================================================================

/// Level used for request/response logging on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessLogLevel {
    Trace,
    #[default]
    Debug,
    Info,
}

impl std::str::FromStr for SuccessLogLevel {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(SuccessLogLevel::Trace),
            "debug" => Ok(SuccessLogLevel::Debug),
            "info" => Ok(SuccessLogLevel::Info),
            other => Err(LinkError::InvalidConfig(format!(
                "Unknown log level: '{}'. Valid options: trace, debug, info",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default)]
    pub success_log_level: SuccessLogLevel,
}

// =============================================================================
// Main Link Configuration
// =============================================================================

/// Complete link configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default)]
    pub platform: PlatformSettings,

    #[serde(default)]
    pub realtime: RealtimeSettings,

    #[serde(default)]
    pub pos: PosSettings,

    #[serde(default)]
    pub http: HttpSettings,
}

impl LinkConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (link.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LinkResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading link config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load link config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Parses a TOML document without touching the environment.
    pub fn from_toml(contents: &str) -> LinkResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LinkResult<()> {
        let base = url::Url::parse(&self.platform.base_url)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(LinkError::InvalidUrl(format!(
                "Base URL must start with http:// or https://, got: {}",
                self.platform.base_url
            )));
        }

        let socket = url::Url::parse(&self.platform.socket_url)?;
        if !matches!(socket.scheme(), "ws" | "wss") {
            return Err(LinkError::InvalidUrl(format!(
                "Socket URL must start with ws:// or wss://, got: {}",
                self.platform.socket_url
            )));
        }

        for (field, value) in [
            ("platform.location_id", &self.platform.location_id),
            ("platform.vendor", &self.platform.vendor),
            ("platform.secret", &self.platform.secret),
        ] {
            if value.trim().is_empty() {
                return Err(LinkError::InvalidConfig(format!("{field} is required")));
            }
        }

        if self.realtime.heartbeat_interval_secs == 0 {
            return Err(LinkError::InvalidConfig(
                "heartbeat_interval_secs must be greater than 0".into(),
            ));
        }

        if self.realtime.timeout_secs < self.realtime.heartbeat_interval_secs {
            return Err(LinkError::InvalidConfig(
                "timeout_secs must be at least one heartbeat interval".into(),
            ));
        }

        if self.pos.supported_order_types.is_empty() {
            return Err(LinkError::InvalidConfig(
                "supported_order_types cannot be empty".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("COVERS_BASE_URL") {
            debug!(url = %url, "Overriding base URL from environment");
            self.platform.base_url = url;
        }

        if let Ok(url) = std::env::var("COVERS_SOCKET_URL") {
            debug!(url = %url, "Overriding socket URL from environment");
            self.platform.socket_url = url;
        }

        if let Ok(id) = std::env::var("COVERS_LOCATION_ID") {
            self.platform.location_id = id;
        }

        if let Ok(token) = std::env::var("COVERS_LOCATION_TOKEN") {
            self.platform.location_token = token;
        }

        if let Ok(vendor) = std::env::var("COVERS_VENDOR") {
            self.platform.vendor = vendor;
        }

        if let Ok(secret) = std::env::var("COVERS_SECRET") {
            self.platform.secret = secret;
        }

        if let Ok(mode) = std::env::var("COVERS_MODE") {
            match mode.to_lowercase().as_str() {
                "restaurant" => self.pos.mode = OperatingMode::Restaurant,
                "bistro" => self.pos.mode = OperatingMode::Bistro,
                _ => warn!(mode = %mode, "Unknown operating mode in environment"),
            }
        }

        if let Ok(secs) = std::env::var("COVERS_SOCKET_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => {
                    debug!(timeout_secs = s, "Overriding socket timeout from environment");
                    self.realtime.timeout_secs = s;
                }
                Err(_) => warn!(value = %secs, "Ignoring non-numeric socket timeout"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "covers", "covers")
            .map(|dirs| dirs.config_dir().join("link.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn mode(&self) -> OperatingMode {
        self.pos.mode
    }

    pub fn supports(&self, order_type: OrderType) -> bool {
        self.pos.supported_order_types.contains(&order_type)
    }

    /// Socket URL with the location token attached.
    pub fn socket_url_with_token(&self) -> LinkResult<url::Url> {
        let mut url = url::Url::parse(&self.platform.socket_url)?;
        url.query_pairs_mut()
            .append_pair("token", &self.platform.location_token);
        Ok(url)
    }
}
