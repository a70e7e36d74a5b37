// crates/toolgate-aggregator/src/aggregator.rs
// ============================================================================
// Module: MCP Aggregator
// Description: Session-aware router fanning MCP calls across backends.
// Purpose: Merge capabilities, namespace tools, and route calls by service.
// Dependencies: tokio, toolgate-core, crate::{merge, rpc, session, transport}
// ============================================================================

//! ## Overview
//! The aggregator sits downstream of the decision engine. `initialize` fans
//! out to every configured backend in parallel and unions capabilities;
//! `tools/list` fans out (restricted to granted services when the header is
//! present) and prefixes tool names with `service.`; `tools/call` routes to
//! one backend with the un-prefixed name and the backend's own session id.
//! A single backend failure degrades that service only; the client session
//! survives as long as any backend remains.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tokio::task::JoinSet;
use toolgate_core::QualifiedToolName;
use toolgate_core::ServiceName;
use toolgate_core::SessionId;

use crate::merge::merge_initialize_result;
use crate::merge::prefix_tools;
use crate::rpc::INTERNAL_ERROR;
use crate::rpc::INVALID_PARAMS;
use crate::rpc::error_response;
use crate::rpc::request_id;
use crate::rpc::result_response;
use crate::session::BackendSession;
use crate::session::Session;
use crate::session::SessionStore;
use crate::transport::BackendTransport;
use crate::transport::ByteSource;

// ============================================================================
// SECTION: Endpoint Model
// ============================================================================

/// One configured backend endpoint.
///
/// # Invariants
/// - `name` is dot-free; it becomes the tool-name prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEndpoint {
    /// Service name.
    pub name: ServiceName,
    /// Base URL of the backend MCP endpoint.
    pub url: String,
}

// ============================================================================
// SECTION: Response Model
// ============================================================================

/// Aggregator answer for one MCP request.
///
/// # Invariants
/// - `body` is absent exactly for 204 responses.
#[derive(Debug, Clone, PartialEq)]
pub struct McpResponse {
    /// HTTP status to surface.
    pub status: u16,
    /// Client session id to echo in `Mcp-Session-Id`.
    pub session_id: Option<SessionId>,
    /// JSON-RPC response body.
    pub body: Option<Value>,
}

impl McpResponse {
    /// Builds a 200 response with a body.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            session_id: None,
            body: Some(body),
        }
    }

    /// Builds a bodyless 204 response.
    #[must_use]
    pub const fn no_content() -> Self {
        Self {
            status: 204,
            session_id: None,
            body: None,
        }
    }

    /// Builds an error response with a JSON-RPC error body.
    #[must_use]
    pub fn error(status: u16, id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            status,
            session_id: None,
            body: Some(error_response(id, code, message)),
        }
    }
}

// ============================================================================
// SECTION: Aggregator
// ============================================================================

/// Session-aware MCP router.
///
/// # Invariants
/// - Configured backends are fixed for the process lifetime.
/// - Session state is only read between awaits, never held locked.
pub struct Aggregator {
    /// Configured backends in declaration order.
    backends: Vec<BackendEndpoint>,
    /// Live client sessions.
    sessions: SessionStore,
    /// Backend transport.
    transport: Arc<dyn BackendTransport>,
    /// Backend initialize timeout.
    initialize_timeout: Duration,
    /// Backend tool-call timeout.
    tool_call_timeout: Duration,
}

impl Aggregator {
    /// Creates an aggregator over the configured backends.
    #[must_use]
    pub fn new(
        backends: Vec<BackendEndpoint>,
        transport: Arc<dyn BackendTransport>,
        initialize_timeout: Duration,
        tool_call_timeout: Duration,
    ) -> Self {
        Self {
            backends,
            sessions: SessionStore::new(),
            transport,
            initialize_timeout,
            tool_call_timeout,
        }
    }

    /// Returns the configured backend names.
    #[must_use]
    pub fn backend_names(&self) -> Vec<String> {
        self.backends.iter().map(|backend| backend.name.to_string()).collect()
    }

    /// Returns the number of live client sessions.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Handles one JSON-RPC post.
    pub async fn handle_post(
        &self,
        session_id: Option<&SessionId>,
        granted: Option<&BTreeSet<ServiceName>>,
        payload: Value,
    ) -> McpResponse {
        let method = payload.get("method").and_then(Value::as_str).unwrap_or_default();
        match method {
            "initialize" => self.initialize(payload).await,
            "notifications/initialized" => self.notifications_initialized(session_id, payload),
            "tools/list" => self.tools_list(session_id, granted, payload).await,
            "tools/call" => self.tools_call(session_id, payload).await,
            "ping" => McpResponse::ok(result_response(request_id(&payload), json!({}))),
            other if other.starts_with("notifications/") => McpResponse::no_content(),
            other => McpResponse::error(
                200,
                request_id(&payload),
                -32601,
                format!("method not supported: {other}"),
            ),
        }
    }

    /// Tears down a client session, propagating to every backend.
    pub async fn handle_delete(&self, session_id: &SessionId) -> u16 {
        let Some(session) = self.sessions.remove(session_id) else {
            return 404;
        };
        let mut set: JoinSet<()> = JoinSet::new();
        for (_, backend) in session.backends {
            let transport = Arc::clone(&self.transport);
            let timeout = self.initialize_timeout;
            set.spawn(async move {
                let _ = transport
                    .delete_session(&backend.url, backend.session_id.as_ref(), timeout)
                    .await;
            });
        }
        while set.join_next().await.is_some() {}
        204
    }

    /// Opens one upstream SSE per backend for the stream relay.
    ///
    /// Backends that fail to open are skipped; the stream degrades to the
    /// remaining backends.
    pub async fn open_streams(
        &self,
        session_id: Option<&SessionId>,
    ) -> Vec<(ServiceName, Box<dyn ByteSource>)> {
        let targets = self.resolve_backends(session_id);
        let mut streams = Vec::new();
        for (name, backend) in targets {
            match self.transport.open_stream(&backend.url, backend.session_id.as_ref()).await {
                Ok(stream) => streams.push((name, stream)),
                Err(_err) => {}
            }
        }
        streams
    }

    /// Fans `initialize` out to every configured backend.
    async fn initialize(&self, payload: Value) -> McpResponse {
        let id = request_id(&payload);
        let mut set: JoinSet<(usize, Result<crate::transport::BackendReply, crate::transport::BackendError>)> =
            JoinSet::new();
        for (index, backend) in self.backends.iter().enumerate() {
            let transport = Arc::clone(&self.transport);
            let url = backend.url.clone();
            let body = payload.clone();
            let timeout = self.initialize_timeout;
            set.spawn(async move { (index, transport.post(&url, None, &body, timeout).await) });
        }

        let mut replies: BTreeMap<usize, crate::transport::BackendReply> = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            if let Ok((index, Ok(reply))) = joined {
                replies.insert(index, reply);
            }
        }
        if replies.is_empty() {
            return McpResponse::error(502, id, INTERNAL_ERROR, "no backend initialized");
        }

        let mut session = Session::default();
        let mut merged = Map::new();
        for (index, reply) in &replies {
            let Some(backend) = self.backends.get(*index) else {
                continue;
            };
            session.backends.insert(backend.name.clone(), BackendSession {
                url: backend.url.clone(),
                session_id: reply.session_id.clone(),
            });
            if let Some(result) = reply.payload.get("result") {
                merge_initialize_result(&mut merged, result);
            }
        }

        let client_session = SessionStore::allocate_id();
        self.sessions.insert(client_session.clone(), session);
        let mut response = McpResponse::ok(result_response(id, Value::Object(merged)));
        response.session_id = Some(client_session);
        response
    }

    /// Fire-and-forget fan-out of `notifications/initialized`.
    fn notifications_initialized(
        &self,
        session_id: Option<&SessionId>,
        payload: Value,
    ) -> McpResponse {
        for (_, backend) in self.resolve_backends(session_id) {
            let transport = Arc::clone(&self.transport);
            let body = payload.clone();
            let timeout = self.tool_call_timeout;
            tokio::spawn(async move {
                let _ =
                    transport.notify(&backend.url, backend.session_id.as_ref(), &body, timeout).await;
            });
        }
        McpResponse::no_content()
    }

    /// Fans `tools/list` out and merges namespaced tools.
    async fn tools_list(
        &self,
        session_id: Option<&SessionId>,
        granted: Option<&BTreeSet<ServiceName>>,
        payload: Value,
    ) -> McpResponse {
        let id = request_id(&payload);
        let targets: Vec<(ServiceName, BackendSession)> = self
            .resolve_backends(session_id)
            .into_iter()
            .filter(|(name, _)| granted.is_none_or(|granted| granted.contains(name)))
            .collect();

        let mut set: JoinSet<(ServiceName, Result<crate::transport::BackendReply, crate::transport::BackendError>)> =
            JoinSet::new();
        for (name, backend) in targets {
            let transport = Arc::clone(&self.transport);
            let body = payload.clone();
            let timeout = self.tool_call_timeout;
            set.spawn(async move {
                let reply =
                    transport.post(&backend.url, backend.session_id.as_ref(), &body, timeout).await;
                (name, reply)
            });
        }

        let mut by_service: BTreeMap<ServiceName, Vec<Value>> = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            if let Ok((name, Ok(reply))) = joined {
                if let Some(result) = reply.payload.get("result") {
                    by_service.insert(name.clone(), prefix_tools(&name, result));
                }
            }
        }
        let tools: Vec<Value> = by_service.into_values().flatten().collect();
        McpResponse::ok(result_response(id, json!({"tools": tools})))
    }

    /// Routes `tools/call` to the backend owning the service.
    async fn tools_call(&self, session_id: Option<&SessionId>, payload: Value) -> McpResponse {
        let id = request_id(&payload);
        let name = payload
            .get("params")
            .and_then(|params| params.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let Some(qualified) = QualifiedToolName::parse(name) else {
            return McpResponse::error(
                400,
                id,
                INVALID_PARAMS,
                format!("tool name must be namespaced: {name}"),
            );
        };
        let backend = self
            .resolve_backends(session_id)
            .into_iter()
            .find(|(service, _)| service == &qualified.service)
            .map(|(_, backend)| backend);
        let Some(backend) = backend else {
            return McpResponse::error(
                400,
                id,
                INVALID_PARAMS,
                format!("unknown service: {}", qualified.service),
            );
        };

        let mut forwarded = payload.clone();
        if let Some(params) = forwarded.get_mut("params").and_then(Value::as_object_mut) {
            params.insert("name".to_string(), Value::String(qualified.tool.to_string()));
        }
        match self
            .transport
            .post(&backend.url, backend.session_id.as_ref(), &forwarded, self.tool_call_timeout)
            .await
        {
            Ok(reply) => McpResponse::ok(reply.payload),
            Err(err) => McpResponse::error(502, id, INTERNAL_ERROR, err.to_string()),
        }
    }

    /// Resolves the backends for a request: the session's when one exists,
    /// the configured set otherwise.
    fn resolve_backends(&self, session_id: Option<&SessionId>) -> Vec<(ServiceName, BackendSession)> {
        if let Some(session_id) = session_id
            && let Some(session) = self.sessions.get(session_id)
        {
            return session.backends.into_iter().collect();
        }
        self.backends
            .iter()
            .map(|backend| {
                (backend.name.clone(), BackendSession {
                    url: backend.url.clone(),
                    session_id: None,
                })
            })
            .collect()
    }
}
