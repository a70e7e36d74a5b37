// crates/toolgate-aggregator/src/transport.rs
// ============================================================================
// Module: Backend Transport
// Description: HTTP transport seam for backend MCP servers.
// Purpose: Let the aggregator reach backends and tests inject fakes.
// Dependencies: async-trait, bytes, reqwest, toolgate-core
// ============================================================================

//! ## Overview
//! Backends speak MCP Streamable HTTP: JSON-RPC posts that may answer with
//! raw JSON or SSE-wrapped JSON, a long-lived SSE channel on GET, and
//! session teardown on DELETE. The trait seam keeps the aggregator logic
//! testable without sockets; the HTTP implementation uses one pooled
//! `reqwest` client with per-call timeouts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;
use toolgate_core::SessionId;

use crate::rpc::decode_backend_payload;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Session header used by MCP Streamable HTTP.
pub const MCP_SESSION_HEADER: &str = "Mcp-Session-Id";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by backend calls.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport construction failed.
    #[error("backend client build failed: {0}")]
    Build(String),
    /// Request transport failed or timed out.
    #[error("backend request failed: {0}")]
    Transport(String),
    /// Backend answered with an error status.
    #[error("backend returned status {0}")]
    Status(u16),
    /// Backend body could not be decoded as JSON or SSE-wrapped JSON.
    #[error("backend response decode failed")]
    Decode,
}

// ============================================================================
// SECTION: Reply Model
// ============================================================================

/// Decoded backend reply to a JSON-RPC post.
///
/// # Invariants
/// - `payload` is the decoded JSON-RPC message, SSE unwrapping included.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    /// Session id issued by the backend, when present.
    pub session_id: Option<SessionId>,
    /// Decoded JSON-RPC message.
    pub payload: Value,
}

// ============================================================================
// SECTION: Byte Source
// ============================================================================

/// Pull-based byte source over an open backend SSE stream.
#[async_trait]
pub trait ByteSource: Send {
    /// Returns the next chunk, or `None` at end of stream.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Transport`] when the connection fails.
    async fn next(&mut self) -> Result<Option<Bytes>, BackendError>;
}

// ============================================================================
// SECTION: Transport Trait
// ============================================================================

/// Transport seam for backend MCP servers.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Posts a JSON-RPC message and decodes the reply.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the call or decoding fails.
    async fn post(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
        body: &Value,
        timeout: Duration,
    ) -> Result<BackendReply, BackendError>;

    /// Posts a JSON-RPC notification, ignoring the response body.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the call fails.
    async fn notify(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
        body: &Value,
        timeout: Duration,
    ) -> Result<(), BackendError>;

    /// Opens the backend's SSE channel.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the stream cannot be established.
    async fn open_stream(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
    ) -> Result<Box<dyn ByteSource>, BackendError>;

    /// Tears down the backend session.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the call fails.
    async fn delete_session(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
        timeout: Duration,
    ) -> Result<(), BackendError>;
}

// ============================================================================
// SECTION: HTTP Implementation
// ============================================================================

/// HTTP backend transport over a pooled client.
pub struct HttpBackendTransport {
    /// Shared HTTP client.
    client: reqwest::Client,
}

impl HttpBackendTransport {
    /// Creates the HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Build`] when the client cannot be built.
    pub fn new() -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| BackendError::Build(err.to_string()))?;
        Ok(Self {
            client,
        })
    }

    /// Builds a request with the MCP headers applied.
    fn request(
        &self,
        method: reqwest::Method,
        url: &str,
        session_id: Option<&SessionId>,
    ) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream");
        if let Some(session_id) = session_id {
            builder = builder.header(MCP_SESSION_HEADER, session_id.as_str());
        }
        builder
    }
}

#[async_trait]
impl BackendTransport for HttpBackendTransport {
    async fn post(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
        body: &Value,
        timeout: Duration,
    ) -> Result<BackendReply, BackendError> {
        let response = self
            .request(reqwest::Method::POST, url, session_id)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        let reply_session = response
            .headers()
            .get(MCP_SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(SessionId::new);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let payload = decode_backend_payload(content_type.as_deref(), &bytes)
            .ok_or(BackendError::Decode)?;
        Ok(BackendReply {
            session_id: reply_session,
            payload,
        })
    }

    async fn notify(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
        body: &Value,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        let response = self
            .request(reqwest::Method::POST, url, session_id)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn open_stream(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
    ) -> Result<Box<dyn ByteSource>, BackendError> {
        let response = self
            .request(reqwest::Method::GET, url, session_id)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(Box::new(HttpByteSource {
            response,
        }))
    }

    async fn delete_session(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
        timeout: Duration,
    ) -> Result<(), BackendError> {
        let response = self
            .request(reqwest::Method::DELETE, url, session_id)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Byte source over an open `reqwest` response.
struct HttpByteSource {
    /// Underlying streaming response.
    response: reqwest::Response,
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn next(&mut self) -> Result<Option<Bytes>, BackendError> {
        self.response.chunk().await.map_err(|err| BackendError::Transport(err.to_string()))
    }
}
