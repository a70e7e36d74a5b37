// crates/toolgate-gateway/src/server.rs
// ============================================================================
// Module: Edge Gateway Server
// Description: Authenticated MCP edge combining engine and aggregator.
// Purpose: Serve /mcp, health, and OAuth discovery with fail-closed authz.
// Dependencies: axum, tokio, toolgate-aggregator, toolgate-engine
// ============================================================================

//! ## Overview
//! The edge pipeline for every `/mcp` request: verify the bearer JWT
//! signature against the issuer JWKS, optionally rate-limit by subject, run
//! the decision engine, and only then hand the call to the aggregator.
//! Denials surface the engine's status, reason, and retry headers verbatim.
//! Missing or invalid credentials answer 401 with a `WWW-Authenticate`
//! challenge pointing at the protected-resource metadata.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::CACHE_CONTROL;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::HOST;
use axum::http::header::WWW_AUTHENTICATE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tokio_stream::wrappers::ReceiverStream;
use toolgate_aggregator::Aggregator;
use toolgate_aggregator::MCP_SESSION_HEADER;
use toolgate_config::GatewayConfig;
use toolgate_core::ServiceName;
use toolgate_core::SessionId;
use toolgate_core::claims::parse_bearer_token;
use toolgate_engine::CheckRequest;
use toolgate_engine::Decision;
use toolgate_engine::DecisionEngine;
use toolgate_engine::HEADER_GRANTED_SERVICES;

use crate::audit::AuthzAuditEvent;
use crate::audit::AuthzAuditSink;
use crate::audit::NoopAuthzAuditSink;
use crate::jwks::TokenVerifier;
use crate::limits::SubjectThrottle;
use crate::limits::ThrottleVerdict;
use crate::telemetry::DecisionMetricEvent;
use crate::telemetry::EdgeRequestKind;
use crate::telemetry::GatewayMetrics;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal gateway server errors.
#[derive(Debug, Error)]
pub enum GatewayServerError {
    /// Listener could not be bound.
    #[error("gateway bind failed: {0}")]
    Bind(String),
    /// Server terminated with an error.
    #[error("gateway server failed: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared edge gateway state.
#[derive(Clone)]
pub struct GatewayState {
    /// Decision engine over the bundle cache.
    engine: Arc<DecisionEngine>,
    /// MCP aggregator.
    aggregator: Arc<Aggregator>,
    /// Edge token verifier.
    verifier: Arc<dyn TokenVerifier>,
    /// Optional per-subject admission throttle.
    throttle: Option<Arc<SubjectThrottle>>,
    /// HTTP client for discovery passthrough.
    http: reqwest::Client,
    /// OIDC issuer base URL.
    issuer_url: String,
    /// SSE keepalive interval.
    sse_keepalive: Duration,
    /// Metrics sink for decision telemetry.
    metrics: Arc<dyn GatewayMetrics>,
    /// Audit sink for decision events.
    audit: Arc<dyn AuthzAuditSink>,
}

impl GatewayState {
    /// Builds gateway state from its collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayServerError::Serve`] when the passthrough HTTP
    /// client cannot be built.
    pub fn new(
        engine: Arc<DecisionEngine>,
        aggregator: Arc<Aggregator>,
        verifier: Arc<dyn TokenVerifier>,
        throttle: Option<Arc<SubjectThrottle>>,
        issuer_url: impl Into<String>,
        sse_keepalive: Duration,
    ) -> Result<Self, GatewayServerError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| GatewayServerError::Serve(err.to_string()))?;
        Ok(Self {
            engine,
            aggregator,
            verifier,
            throttle,
            http,
            issuer_url: issuer_url.into().trim_end_matches('/').to_string(),
            sse_keepalive,
            metrics: Arc::new(NoopMetrics),
            audit: Arc::new(NoopAuthzAuditSink),
        })
    }

    /// Replaces the observability sinks.
    #[must_use]
    pub fn with_observability(
        mut self,
        metrics: Arc<dyn GatewayMetrics>,
        audit: Arc<dyn AuthzAuditSink>,
    ) -> Self {
        self.metrics = metrics;
        self.audit = audit;
        self
    }

    /// Records one decision to the metrics and audit sinks.
    fn record_decision(
        &self,
        kind: EdgeRequestKind,
        decision: &Decision,
        started: std::time::Instant,
    ) {
        let revision = decision
            .request_header(toolgate_engine::HEADER_BUNDLE_REVISION)
            .and_then(|value| value.parse().ok())
            .map(toolgate_core::Revision::new);
        let event = DecisionMetricEvent {
            kind,
            allowed: decision.allow,
            status: decision.status,
            reason: decision.reason.clone(),
            revision,
        };
        self.metrics.record_decision(&event);
        self.metrics.record_latency(&event, started.elapsed());
        let subject = decision
            .request_header(toolgate_engine::HEADER_USER_ID)
            .map(ToString::to_string);
        self.audit.record(&AuthzAuditEvent::decision(
            kind.as_str(),
            subject,
            decision.allow,
            decision.status,
            decision.reason.clone(),
            revision,
        ));
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the edge router.
#[must_use]
pub fn router(state: GatewayState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(
            "/mcp",
            post(handle_mcp_post).get(handle_mcp_get).delete(handle_mcp_delete),
        )
        .route("/health", get(handle_health))
        .route(
            "/.well-known/oauth-protected-resource",
            get(handle_protected_resource),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(handle_authorization_server),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Serves the edge gateway until the listener fails.
///
/// # Errors
///
/// Returns [`GatewayServerError`] when binding or serving fails.
pub async fn serve(config: &GatewayConfig, state: GatewayState) -> Result<(), GatewayServerError> {
    let app = router(state, config.max_body_bytes);
    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .map_err(|err| GatewayServerError::Bind(err.to_string()))?;
    axum::serve(listener, app)
        .await
        .map_err(|err| GatewayServerError::Serve(err.to_string()))
}

// ============================================================================
// SECTION: MCP Handlers
// ============================================================================

/// Handles JSON-RPC posts to `/mcp`.
async fn handle_mcp_post(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let started = std::time::Instant::now();
    if let Err(response) = authenticate(&state, &headers).await {
        return response;
    }
    if let Some(response) = rate_limit(&state, &headers) {
        return response;
    }

    let check = check_request("POST", &headers, body.to_vec());
    let kind = match toolgate_engine::classify(&check) {
        toolgate_engine::RequestClass::StreamSetup => EdgeRequestKind::StreamSetup,
        toolgate_engine::RequestClass::MetaCall {
            ..
        } => EdgeRequestKind::MetaCall,
        toolgate_engine::RequestClass::ToolCall {
            ..
        } => EdgeRequestKind::ToolCall,
    };
    let decision = state.engine.check(&check).await;
    state.record_decision(kind, &decision, started);
    if !decision.allow {
        return decision_response(&decision, &headers);
    }

    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        let body = json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32700, "message": "parse error"},
        });
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };

    let session_id = session_from_headers(&headers);
    let granted = granted_from_decision(&decision);
    let result = state
        .aggregator
        .handle_post(session_id.as_ref(), granted.as_ref(), payload)
        .await;

    let mut response_headers = decision_headers(&decision);
    let echo_session = result.session_id.clone().or(session_id);
    if let Some(session) = echo_session
        && let Ok(value) = HeaderValue::from_str(session.as_str())
    {
        response_headers.insert(HeaderName::from_static("mcp-session-id"), value);
    }
    let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::BAD_GATEWAY);
    match result.body {
        Some(body) => (status, response_headers, Json(body)).into_response(),
        None => (status, response_headers).into_response(),
    }
}

/// Handles SSE stream establishment on `GET /mcp`.
async fn handle_mcp_get(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Response {
    let started = std::time::Instant::now();
    if let Err(response) = authenticate(&state, &headers).await {
        return response;
    }
    let check = check_request("GET", &headers, Vec::new());
    let decision = state.engine.check(&check).await;
    state.record_decision(EdgeRequestKind::StreamSetup, &decision, started);
    if !decision.allow {
        return decision_response(&decision, &headers);
    }

    let session_id = session_from_headers(&headers);
    let streams = state.aggregator.open_streams(session_id.as_ref()).await;

    let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, Infallible>>(32);
    for (_service, mut source) in streams {
        let tx = tx.clone();
        // Relay task: upstream chunks copy into the client stream and stop
        // promptly when the client disconnects.
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    chunk = source.next() => match chunk {
                        Ok(Some(bytes)) => {
                            if tx.send(Ok(bytes)).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) | Err(_) => break,
                    },
                }
            }
        });
    }
    let keepalive = state.sse_keepalive;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(keepalive);
        ticker.tick().await;
        loop {
            tokio::select! {
                () = tx.closed() => break,
                _ = ticker.tick() => {
                    if tx.send(Ok(Bytes::from_static(b": keep-alive\n\n"))).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let mut response_headers = decision_headers(&decision);
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    (
        StatusCode::OK,
        response_headers,
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

/// Handles session teardown on `DELETE /mcp`.
async fn handle_mcp_delete(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Response {
    let started = std::time::Instant::now();
    if let Err(response) = authenticate(&state, &headers).await {
        return response;
    }
    let check = check_request("DELETE", &headers, Vec::new());
    let decision = state.engine.check(&check).await;
    state.record_decision(EdgeRequestKind::Teardown, &decision, started);
    if !decision.allow {
        return decision_response(&decision, &headers);
    }
    let Some(session_id) = session_from_headers(&headers) else {
        let body = json!({"error": "missing Mcp-Session-Id"});
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    };
    let status = state.aggregator.handle_delete(&session_id).await;
    StatusCode::from_u16(status).unwrap_or(StatusCode::NO_CONTENT).into_response()
}

// ============================================================================
// SECTION: Health and Discovery
// ============================================================================

/// Health response body.
#[derive(Debug, Serialize)]
struct HealthResponse {
    /// Liveness status label.
    status: &'static str,
    /// Service name.
    service: &'static str,
    /// Configured backend service names.
    backends: Vec<String>,
    /// Live client session count.
    #[serde(rename = "activeSessions")]
    active_sessions: usize,
}

/// Liveness endpoint.
async fn handle_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "toolgate-gateway",
        backends: state.aggregator.backend_names(),
        active_sessions: state.aggregator.active_sessions(),
    })
}

/// Serves the OAuth protected-resource metadata for this gateway.
async fn handle_protected_resource(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Json<Value> {
    let host = host_label(&headers);
    Json(json!({
        "resource": format!("http://{host}/mcp"),
        "authorization_servers": [state.issuer_url],
        "bearer_methods_supported": ["header"],
    }))
}

/// Proxies the issuer's OAuth authorization-server metadata.
async fn handle_authorization_server(State(state): State<GatewayState>) -> Response {
    let url = format!("{}/.well-known/oauth-authorization-server", state.issuer_url);
    let upstream = state.http.get(url).timeout(Duration::from_secs(10)).send().await;
    match upstream {
        Ok(response) => {
            let status =
                StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            match response.bytes().await {
                Ok(bytes) => (
                    status,
                    [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                    bytes,
                )
                    .into_response(),
                Err(_) => StatusCode::BAD_GATEWAY.into_response(),
            }
        }
        Err(_) => StatusCode::BAD_GATEWAY.into_response(),
    }
}

// ============================================================================
// SECTION: Pipeline Helpers
// ============================================================================

/// Verifies the bearer token at the edge; failure yields the 401 response.
async fn authenticate(state: &GatewayState, headers: &HeaderMap) -> Result<(), Response> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| unauthorized(headers))?;
    let token = parse_bearer_token(header).map_err(|_err| unauthorized(headers))?;
    state.verifier.verify(token).await.map_err(|_err| unauthorized(headers))
}

/// Applies the optional per-subject admission throttle.
fn rate_limit(state: &GatewayState, headers: &HeaderMap) -> Option<Response> {
    let throttle = state.throttle.as_ref()?;
    let subject = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| toolgate_core::CallerIdentity::from_authorization_header(header).ok())
        .map(|identity| identity.subject)?;
    match throttle.admit(&subject) {
        ThrottleVerdict::Proceed => None,
        ThrottleVerdict::Throttled {
            retry_after_secs,
        } => {
            let mut response_headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response_headers.insert(HeaderName::from_static("retry-after"), value);
            }
            Some((StatusCode::TOO_MANY_REQUESTS, response_headers).into_response())
        }
        ThrottleVerdict::Shedding => Some(StatusCode::SERVICE_UNAVAILABLE.into_response()),
    }
}

/// Builds the engine check request from the HTTP request parts.
fn check_request(method: &str, headers: &HeaderMap, body: Vec<u8>) -> CheckRequest {
    let pairs = headers.iter().filter_map(|(name, value)| {
        value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
    });
    CheckRequest::new(method, "/mcp", pairs, body)
}

/// Builds the deny response for an engine decision.
fn decision_response(decision: &Decision, headers: &HeaderMap) -> Response {
    let status = StatusCode::from_u16(decision.status).unwrap_or(StatusCode::FORBIDDEN);
    let mut response_headers = decision_headers(decision);
    if status == StatusCode::UNAUTHORIZED {
        response_headers.insert(WWW_AUTHENTICATE, challenge_value(headers));
    }
    let body = json!({"error": decision.reason});
    (status, response_headers, Json(body)).into_response()
}

/// Converts a decision's response headers into a header map.
fn decision_headers(decision: &Decision) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in &decision.response_headers {
        if let Ok(value) = HeaderValue::from_str(value) {
            map.insert(HeaderName::from_static(name), value);
        }
    }
    map
}

/// Builds the 401 challenge response.
fn unauthorized(headers: &HeaderMap) -> Response {
    let mut response_headers = HeaderMap::new();
    response_headers.insert(WWW_AUTHENTICATE, challenge_value(headers));
    response_headers.insert(
        HeaderName::from_static("x-authz-reason"),
        HeaderValue::from_static("missing or invalid token"),
    );
    let body = json!({"error": "missing or invalid token"});
    (StatusCode::UNAUTHORIZED, response_headers, Json(body)).into_response()
}

/// Builds the `WWW-Authenticate` challenge pointing at resource metadata.
fn challenge_value(headers: &HeaderMap) -> HeaderValue {
    let host = host_label(headers);
    let challenge = format!(
        "Bearer resource_metadata=\"http://{host}/.well-known/oauth-protected-resource\""
    );
    HeaderValue::from_str(&challenge)
        .unwrap_or_else(|_| HeaderValue::from_static("Bearer"))
}

/// Returns the request host label for metadata URLs.
fn host_label(headers: &HeaderMap) -> String {
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("toolgate")
        .to_string()
}

/// Extracts the client session id header.
fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(MCP_SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(SessionId::new)
}

/// Parses the granted-services set injected by the decision engine.
///
/// Absent means "no restriction" (non-list calls); present-but-empty means
/// the caller is granted nothing.
fn granted_from_decision(decision: &Decision) -> Option<BTreeSet<ServiceName>> {
    decision.request_header(HEADER_GRANTED_SERVICES).map(|joined| {
        joined
            .split(',')
            .filter(|entry| !entry.is_empty())
            .map(ServiceName::new)
            .collect()
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
