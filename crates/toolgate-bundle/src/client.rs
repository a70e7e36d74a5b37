// crates/toolgate-bundle/src/client.rs
// ============================================================================
// Module: Control-Plane Client
// Description: HTTP client for bundle reads and change-stream subscription.
// Purpose: Fetch policy snapshots and follow the control-plane SSE stream.
// Dependencies: reqwest, toolgate-core
// ============================================================================

//! ## Overview
//! The client authenticates with the gateway-role bearer token. Bundle
//! fetches carry a per-call timeout; the change-stream subscription is a
//! long-lived request read chunk by chunk, so only the connect phase is
//! bounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use thiserror::Error;
use toolgate_core::BundleData;

use crate::sse::SseParser;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Connect-phase timeout for all control-plane requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by control-plane calls.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Client construction failed.
    #[error("control plane client build failed: {0}")]
    Build(String),
    /// Request transport failed.
    #[error("control plane request failed: {0}")]
    Transport(String),
    /// Control plane answered with an unexpected status.
    #[error("control plane returned status {0}")]
    Status(u16),
    /// Response payload failed to decode.
    #[error("control plane response decode failed: {0}")]
    Decode(String),
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// HTTP client for the control plane's gateway-role surface.
///
/// # Invariants
/// - The bearer token is held in memory only; it never appears in errors.
pub struct ControlPlaneClient {
    /// Base URL without a trailing slash.
    base_url: String,
    /// Gateway-role bearer token.
    token: String,
    /// Shared HTTP client.
    client: Client,
    /// Per-call timeout for bundle fetches.
    fetch_timeout: Duration,
}

impl ControlPlaneClient {
    /// Creates a client for the control plane.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Build`] when the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        fetch_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|err| ClientError::Build(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
            fetch_timeout,
        })
    }

    /// Fetches the full policy snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the request or decoding fails.
    pub async fn get_bundle_data(&self) -> Result<BundleData, ClientError> {
        let response = self
            .client
            .get(format!("{}/bundle", self.base_url))
            .bearer_auth(&self.token)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        expect_status(&response, StatusCode::OK)?;
        response.json().await.map_err(|err| ClientError::Decode(err.to_string()))
    }

    /// Opens the change-stream subscription.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the subscription cannot be established.
    pub async fn subscribe_events(&self) -> Result<EventStream, ClientError> {
        let response = self
            .client
            .get(format!("{}/events", self.base_url))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        expect_status(&response, StatusCode::OK)?;
        Ok(EventStream {
            response,
            parser: SseParser::new(),
        })
    }
}

/// Checks a response status against the expected value.
fn expect_status(response: &Response, expected: StatusCode) -> Result<(), ClientError> {
    if response.status() == expected {
        Ok(())
    } else {
        Err(ClientError::Status(response.status().as_u16()))
    }
}

// ============================================================================
// SECTION: Event Stream
// ============================================================================

/// Open change-stream subscription.
///
/// # Invariants
/// - Events are yielded in arrival order; keepalive comments are skipped.
pub struct EventStream {
    /// Underlying streaming response.
    response: Response,
    /// Incremental SSE parser.
    parser: SseParser,
}

impl EventStream {
    /// Returns the next change event, or `None` when the stream ends.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the connection fails.
    pub async fn next_event(&mut self) -> Result<Option<crate::sse::SseEvent>, ClientError> {
        loop {
            if let Some(event) = self.parser.next_event() {
                return Ok(Some(event));
            }
            let chunk = self
                .response
                .chunk()
                .await
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            match chunk {
                Some(bytes) => self.parser.push(&bytes),
                None => return Ok(self.parser.flush()),
            }
        }
    }
}
