//! # Platform Authorization Token
//!
//! Signs the token carried in the `authorization` header of every REST call.
//!
//! ## Token Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Authorization Token                                │
//! │                                                                         │
//! │  location_id + vendor ──┐                                               │
//! │                         ├──► HS256 JWT { sub, vendor, iat, exp, jti }   │
//! │  shared secret ─────────┘          │                                    │
//! │                                    ▼                                    │
//! │                            cached in TokenSigner                        │
//! │                                    │                                    │
//! │            within REFRESH_MARGIN_SECS of exp? ──yes──► sign a new one   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Mutex;

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::PlatformSettings;
use crate::error::{LinkError, LinkResult};

/// A token is re-signed this many seconds before it expires.
const REFRESH_MARGIN_SECS: i64 = 30;

/// Claims the platform expects in the authorization token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Location the POS is installed at.
    pub sub: String,

    pub vendor: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    exp: i64,
}

/// Signs and caches authorization tokens.
pub struct TokenSigner {
    location_id: String,
    vendor: String,
    key: EncodingKey,
    lifetime_secs: i64,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("location_id", &self.location_id)
            .field("vendor", &self.vendor)
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(location_id: &str, vendor: &str, secret: &str, lifetime_secs: u64) -> Self {
        TokenSigner {
            location_id: location_id.to_string(),
            vendor: vendor.to_string(),
            key: EncodingKey::from_secret(secret.as_bytes()),
            lifetime_secs: i64::try_from(lifetime_secs).unwrap_or(i64::MAX / 2),
            cached: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &PlatformSettings) -> Self {
        Self::new(
            &settings.location_id,
            &settings.vendor,
            &settings.secret,
            settings.token_lifetime_secs,
        )
    }

    /// Returns a valid token, signing a fresh one when needed.
    pub fn token(&self) -> LinkResult<String> {
        let now = Utc::now().timestamp();
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| LinkError::ChannelError("token cache poisoned".into()))?;

        if let Some(current) = cached.as_ref() {
            if current.exp - REFRESH_MARGIN_SECS > now {
                return Ok(current.token.clone());
            }
        }

        let (token, exp) = self.sign()?;
        debug!(location_id = %self.location_id, exp, "Signed new platform token");
        *cached = Some(CachedToken {
            token: token.clone(),
            exp,
        });
        Ok(token)
    }

    fn sign(&self) -> LinkResult<(String, i64)> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: self.location_id.clone(),
            vendor: self.vendor.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.key)?;
        Ok((token, claims.exp))
    }
}
