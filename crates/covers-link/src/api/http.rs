//! # HTTP Transport
//!
//! One request, one classified outcome.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         send(endpoint, method, payload)                 │
//! │                                                                         │
//! │   headers: authorization (signed token), vendor, content-type          │
//! │                                                                         │
//! │   2xx ─────────────► Ok(Some(body)) / Ok(None) when empty              │
//! │   409 ─────────────► ApiError { kind: Conflict }                        │
//! │   other non-2xx ───► ApiError { kind: from status }                     │
//! │   no response ─────► ApiError { status: None, kind: Network }           │
//! │                                                                         │
//! │   logging: success at http.success_log_level, 4xx warn, 5xx error       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn, Instrument, Span};
use url::Url;

use crate::api::endpoint::Endpoint;
use crate::auth::TokenSigner;
use crate::config::{LinkConfig, SuccessLogLevel};
use crate::error::{ApiError, ApiErrorKind, LinkError, LinkResult};

/// Header carrying the POS vendor name.
pub const VENDOR_HEADER: &str = "vendor";

/// Sends requests to the platform and classifies the results.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    signer: Arc<TokenSigner>,
    vendor: String,
    success_level: SuccessLogLevel,
    span: Span,
}

impl HttpTransport {
    pub fn new(config: &LinkConfig, signer: Arc<TokenSigner>, span: Span) -> LinkResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.platform.request_timeout_secs))
            .build()
            .map_err(|e| LinkError::InvalidConfig(format!("cannot build HTTP client: {e}")))?;

        Ok(HttpTransport {
            client,
            base_url: Url::parse(&config.platform.base_url)?,
            signer,
            vendor: config.platform.vendor.clone(),
            success_level: config.http.success_log_level,
            span,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends one request.
    ///
    /// Returns the response body for any 2xx, `None` when the body is empty.
    pub async fn send(
        &self,
        endpoint: &Endpoint,
        method: Method,
        payload: Option<&Value>,
    ) -> Result<Option<String>, ApiError> {
        self.send_inner(endpoint, method, payload)
            .instrument(self.span.clone())
            .await
    }

    async fn send_inner(
        &self,
        endpoint: &Endpoint,
        method: Method,
        payload: Option<&Value>,
    ) -> Result<Option<String>, ApiError> {
        let url = endpoint.url(&self.base_url).map_err(|e| ApiError {
            status: None,
            kind: ApiErrorKind::Other,
            message: e.to_string(),
        })?;

        let token = self.signer.token().map_err(|e| ApiError {
            status: None,
            kind: ApiErrorKind::Unauthorized,
            message: e.to_string(),
        })?;

        self.log_request(&method, endpoint, payload);

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(header::AUTHORIZATION, token)
            .header(VENDOR_HEADER, &self.vendor)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(%method, %endpoint, error = %e, "Platform request failed without response");
                return Err(ApiError::network(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                error!(%method, %endpoint, status, error = %e, "Failed to read platform response");
                return Err(ApiError::network(e.to_string()));
            }
        };

        let outcome = classify(status, body);
        self.log_response(&method, endpoint, status, &outcome);
        outcome
    }

    fn log_request(&self, method: &Method, endpoint: &Endpoint, payload: Option<&Value>) {
        let body = payload.map(Value::to_string).unwrap_or_default();
        match self.success_level {
            SuccessLogLevel::Trace => trace!(%method, %endpoint, %body, "Platform request"),
            SuccessLogLevel::Debug => debug!(%method, %endpoint, %body, "Platform request"),
            SuccessLogLevel::Info => info!(%method, %endpoint, %body, "Platform request"),
        }
    }

    fn log_response(
        &self,
        method: &Method,
        endpoint: &Endpoint,
        status: u16,
        outcome: &Result<Option<String>, ApiError>,
    ) {
        match outcome {
            Ok(body) => {
                let len = body.as_ref().map_or(0, String::len);
                match self.success_level {
                    SuccessLogLevel::Trace => {
                        trace!(%method, %endpoint, status, len, "Platform response")
                    }
                    SuccessLogLevel::Debug => {
                        debug!(%method, %endpoint, status, len, "Platform response")
                    }
                    SuccessLogLevel::Info => {
                        info!(%method, %endpoint, status, len, "Platform response")
                    }
                }
            }
            Err(e) if status >= 500 => {
                error!(%method, %endpoint, status, message = %e.message, "Platform server error")
            }
            Err(e) => {
                warn!(%method, %endpoint, status, kind = %e.kind, message = %e.message, "Platform rejected request")
            }
        }
    }
}

/// Maps an HTTP status and body to the transport outcome.
pub fn classify(status: u16, body: String) -> Result<Option<String>, ApiError> {
    if (200..300).contains(&status) {
        if body.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(body))
        }
    } else {
        Err(ApiError::from_status(status, body))
    }
}
