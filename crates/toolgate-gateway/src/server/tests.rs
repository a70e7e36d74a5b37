// crates/toolgate-gateway/src/server/tests.rs
// ============================================================================
// Module: Edge Gateway Tests
// Description: Handler-level tests for the authenticated MCP edge.
// Purpose: Validate the verify → decide → aggregate pipeline with fakes.
// Dependencies: toolgate-gateway
// ============================================================================

//! ## Overview
//! Exercises the edge pipeline with an allow-all verifier, a scripted
//! backend transport, and a scripted governance client: challenge headers,
//! open and gated tool calls, granted-service filtering, and health.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only framing assertions."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::body::Bytes;
use axum::body::to_bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::header::WWW_AUTHENTICATE;
use axum::response::Response;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use serde_json::json;
use toolgate_aggregator::Aggregator;
use toolgate_aggregator::BackendEndpoint;
use toolgate_aggregator::BackendError;
use toolgate_aggregator::BackendReply;
use toolgate_aggregator::BackendTransport;
use toolgate_aggregator::ByteSource;
use toolgate_bundle::BundleCache;
use toolgate_core::AccessGrant;
use toolgate_core::AccessRule;
use toolgate_core::BundleData;
use toolgate_core::Catalog;
use toolgate_core::EvaluateRequest;
use toolgate_core::EvaluateResponse;
use toolgate_core::GovernanceDecision;
use toolgate_core::GovernanceId;
use toolgate_core::PolicyBundle;
use toolgate_core::RequestId;
use toolgate_core::Revision;
use toolgate_core::RuleId;
use toolgate_core::RuleMatcher;
use toolgate_core::ServiceName;
use toolgate_core::SessionId;
use toolgate_core::ToolName;
use toolgate_core::ToolTag;
use toolgate_engine::DecisionEngine;
use toolgate_engine::GovernanceClient;
use toolgate_engine::GovernanceClientError;

use super::GatewayState;
use super::handle_health;
use super::handle_mcp_delete;
use super::handle_mcp_post;
use super::handle_protected_resource;
use crate::jwks::TokenVerifier;
use crate::jwks::VerifyError;
use crate::limits::SubjectThrottle;

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Verifier that accepts every token (signatures are covered by unit tests).
struct AllowAllVerifier;

#[async_trait]
impl TokenVerifier for AllowAllVerifier {
    async fn verify(&self, _token: &str) -> Result<(), VerifyError> {
        Ok(())
    }
}

/// Scripted governance client.
struct ScriptedGovernance {
    /// Scripted responses consumed in order.
    responses: Mutex<VecDeque<EvaluateResponse>>,
}

impl ScriptedGovernance {
    fn with(responses: Vec<EvaluateResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
        })
    }
}

#[async_trait]
impl GovernanceClient for ScriptedGovernance {
    async fn evaluate(
        &self,
        _evaluator_url: &str,
        _bundle_token: &str,
        _service: &ServiceName,
        _request: &EvaluateRequest,
    ) -> Result<EvaluateResponse, GovernanceClientError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GovernanceClientError::Unreachable("no script".to_string()))
    }
}

/// Scripted backend transport (posts only).
#[derive(Default)]
struct ScriptedTransport {
    /// Scripted post replies per URL, consumed in order.
    replies: Mutex<HashMap<String, VecDeque<Result<BackendReply, BackendError>>>>,
    /// Recorded post URLs.
    posts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn script(&self, url: &str, reply: Result<BackendReply, BackendError>) {
        self.replies.lock().unwrap().entry(url.to_string()).or_default().push_back(reply);
    }

    fn post_count(&self, url: &str) -> usize {
        self.posts.lock().unwrap().iter().filter(|seen| seen.as_str() == url).count()
    }
}

#[async_trait]
impl BackendTransport for ScriptedTransport {
    async fn post(
        &self,
        url: &str,
        _session_id: Option<&SessionId>,
        _body: &Value,
        _timeout: Duration,
    ) -> Result<BackendReply, BackendError> {
        self.posts.lock().unwrap().push(url.to_string());
        self.replies
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(BackendError::Transport("unscripted".to_string())))
    }

    async fn notify(
        &self,
        url: &str,
        _session_id: Option<&SessionId>,
        _body: &Value,
        _timeout: Duration,
    ) -> Result<(), BackendError> {
        self.posts.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn open_stream(
        &self,
        _url: &str,
        _session_id: Option<&SessionId>,
    ) -> Result<Box<dyn ByteSource>, BackendError> {
        Err(BackendError::Transport("streams unscripted".to_string()))
    }

    async fn delete_session(
        &self,
        _url: &str,
        _session_id: Option<&SessionId>,
        _timeout: Duration,
    ) -> Result<(), BackendError> {
        Ok(())
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const CALENDAR_URL: &str = "http://calendar:3000/mcp";
const SEARCH_URL: &str = "http://search:3001/mcp";

fn token_for(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.sig")
}

fn jarvis_headers() -> HeaderMap {
    let token = token_for(&json!({
        "email": "jarvis@acme.com",
        "organization": "acme",
        "department": "sales",
        "sub": "user-1"
    }));
    let mut headers = HeaderMap::new();
    headers
        .insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
    headers
}

fn bundle() -> PolicyBundle {
    let mut catalog = Catalog::new();
    for (service, tools) in [
        ("mock-calendar", vec![("list_events", ToolTag::Open), ("create_event", ToolTag::Gated)]),
        ("duckduckgo", vec![("search", ToolTag::Open)]),
    ] {
        catalog.register_service(ServiceName::new(service));
        catalog.set_enabled(&ServiceName::new(service), true).unwrap();
        for (tool, tag) in tools {
            catalog.register_tool(&ServiceName::new(service), ToolName::new(tool), tag).unwrap();
        }
    }
    let mut claims = BTreeMap::new();
    claims.insert("organization".to_string(), "acme".to_string());
    claims.insert("department".to_string(), "sales".to_string());
    let rule = AccessRule {
        id: RuleId::new("sales-calendar"),
        matcher: RuleMatcher::Claims {
            claims,
        },
        allow: AccessGrant {
            services: vec!["mock-calendar".to_string()],
            tools: vec!["*".to_string()],
        },
    };
    let mut instances = BTreeMap::new();
    instances.insert(ServiceName::new("mock-calendar"), GovernanceId::new("gov-42"));
    PolicyBundle::from_data(
        BundleData {
            revision: Revision::new(42),
            catalog,
            access_rules: vec![rule],
            revoked_subjects: BTreeSet::new(),
            governance_instances: instances,
        },
        "http://npl:12000",
        "opaque",
    )
}

fn state_with(
    transport: Arc<ScriptedTransport>,
    governance: Arc<ScriptedGovernance>,
    throttle: Option<Arc<SubjectThrottle>>,
) -> GatewayState {
    let cache = Arc::new(BundleCache::new());
    cache.publish(bundle());
    let engine = Arc::new(DecisionEngine::new(cache, governance));
    let aggregator = Arc::new(Aggregator::new(
        vec![
            BackendEndpoint {
                name: ServiceName::new("mock-calendar"),
                url: CALENDAR_URL.to_string(),
            },
            BackendEndpoint {
                name: ServiceName::new("duckduckgo"),
                url: SEARCH_URL.to_string(),
            },
        ],
        transport,
        Duration::from_secs(10),
        Duration::from_secs(30),
    ));
    GatewayState::new(
        engine,
        aggregator,
        Arc::new(AllowAllVerifier),
        throttle,
        "http://issuer:8443",
        Duration::from_secs(30),
    )
    .unwrap()
}

fn rpc_body(method: &str, params: Value) -> Bytes {
    Bytes::from(
        json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}).to_string(),
    )
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Missing credentials answer 401 with the resource-metadata challenge.
#[tokio::test]
async fn missing_token_gets_challenge() {
    let state = state_with(
        Arc::new(ScriptedTransport::default()),
        ScriptedGovernance::with(Vec::new()),
        None,
    );
    let response = handle_mcp_post(
        State(state),
        HeaderMap::new(),
        rpc_body("tools/list", json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenge = response.headers().get(WWW_AUTHENTICATE).unwrap().to_str().unwrap();
    assert!(challenge.starts_with("Bearer resource_metadata="));
    assert!(challenge.contains("/.well-known/oauth-protected-resource"));
}

/// An open tool call flows through to the owning backend.
#[tokio::test]
async fn open_tool_call_reaches_backend() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.script(CALENDAR_URL, Ok(BackendReply {
        session_id: None,
        payload: json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"content": [{"type": "text", "text": "2 events"}]}
        }),
    }));
    let state = state_with(Arc::clone(&transport), ScriptedGovernance::with(Vec::new()), None);

    let response = handle_mcp_post(
        State(state),
        jarvis_headers(),
        rpc_body(
            "tools/call",
            json!({"name": "mock-calendar.list_events", "arguments": {"date": "2026-02-14"}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-authz-reason").unwrap().to_str().unwrap(),
        "ok"
    );
    let body = body_json(response).await;
    assert!(!body["result"]["content"].as_array().unwrap().is_empty());
}

/// A gated tool pending decision surfaces 403 with retry headers.
#[tokio::test]
async fn gated_pending_surfaces_retry_headers() {
    let governance = ScriptedGovernance::with(vec![EvaluateResponse {
        decision: GovernanceDecision::Pending,
        request_id: Some(RequestId::new("REQ-1")),
        message: None,
    }]);
    let state = state_with(Arc::new(ScriptedTransport::default()), governance, None);

    let response = handle_mcp_post(
        State(state),
        jarvis_headers(),
        rpc_body(
            "tools/call",
            json!({"name": "mock-calendar.create_event", "arguments": {"title": "T"}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers().get("x-request-id").unwrap(), "REQ-1");
    assert_eq!(response.headers().get("retry-after").unwrap(), "30");
    let body = body_json(response).await;
    assert_eq!(body["error"], json!("Gated tool pending: REQ-1"));
}

/// Denied callers never reach the aggregator or backends.
#[tokio::test]
async fn denied_calls_never_reach_backends() {
    let transport = Arc::new(ScriptedTransport::default());
    let state = state_with(Arc::clone(&transport), ScriptedGovernance::with(Vec::new()), None);

    let response = handle_mcp_post(
        State(state),
        jarvis_headers(),
        rpc_body("tools/call", json!({"name": "duckduckgo.search", "arguments": {}})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(transport.post_count(SEARCH_URL), 0);
}

/// `tools/list` is restricted to the engine's granted services.
#[tokio::test]
async fn tools_list_is_filtered_by_grants() {
    let transport = Arc::new(ScriptedTransport::default());
    transport.script(CALENDAR_URL, Ok(BackendReply {
        session_id: None,
        payload: json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"tools": [{"name": "list_events"}]}
        }),
    }));
    let state = state_with(Arc::clone(&transport), ScriptedGovernance::with(Vec::new()), None);

    let response =
        handle_mcp_post(State(state), jarvis_headers(), rpc_body("tools/list", json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], json!("mock-calendar.list_events"));
    // The ungranted backend was never fanned out to.
    assert_eq!(transport.post_count(SEARCH_URL), 0);
}

/// Unparseable JSON answers a JSON-RPC parse error.
#[tokio::test]
async fn parse_error_answers_rpc_error() {
    let state = state_with(
        Arc::new(ScriptedTransport::default()),
        ScriptedGovernance::with(Vec::new()),
        None,
    );
    let response =
        handle_mcp_post(State(state), jarvis_headers(), Bytes::from_static(b"not json")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], json!(-32700));
}

/// Teardown without a session header is rejected.
#[tokio::test]
async fn delete_requires_session_header() {
    let state = state_with(
        Arc::new(ScriptedTransport::default()),
        ScriptedGovernance::with(Vec::new()),
        None,
    );
    let response = handle_mcp_delete(State(state), jarvis_headers()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// The health endpoint reports backends and session count.
#[tokio::test]
async fn health_reports_backends() {
    let state = state_with(
        Arc::new(ScriptedTransport::default()),
        ScriptedGovernance::with(Vec::new()),
        None,
    );
    let Json(health) = handle_health(State(state)).await;
    let value = serde_json::to_value(&health).unwrap();
    assert_eq!(value["status"], json!("healthy"));
    assert_eq!(value["service"], json!("toolgate-gateway"));
    assert_eq!(value["backends"], json!(["mock-calendar", "duckduckgo"]));
    assert_eq!(value["activeSessions"], json!(0));
}

/// Protected-resource metadata advertises the issuer.
#[tokio::test]
async fn protected_resource_advertises_issuer() {
    let state = state_with(
        Arc::new(ScriptedTransport::default()),
        ScriptedGovernance::with(Vec::new()),
        None,
    );
    let Json(metadata) = handle_protected_resource(State(state), HeaderMap::new()).await;
    assert_eq!(metadata["authorization_servers"], json!(["http://issuer:8443"]));
}

/// The optional throttle answers repeat callers with 429.
#[tokio::test]
async fn rate_limit_sheds_repeat_callers() {
    let throttle = Arc::new(SubjectThrottle::new(toolgate_config::RateLimitConfig {
        max_requests: 1,
        window_ms: 60_000,
        max_entries: 16,
    }));
    let transport = Arc::new(ScriptedTransport::default());
    transport.script(CALENDAR_URL, Ok(BackendReply {
        session_id: None,
        payload: json!({"jsonrpc": "2.0", "id": 1, "result": {"content": []}}),
    }));
    let state = state_with(transport, ScriptedGovernance::with(Vec::new()), Some(throttle));

    let first = handle_mcp_post(
        State(state.clone()),
        jarvis_headers(),
        rpc_body(
            "tools/call",
            json!({"name": "mock-calendar.list_events", "arguments": {}}),
        ),
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = handle_mcp_post(
        State(state),
        jarvis_headers(),
        rpc_body(
            "tools/call",
            json!({"name": "mock-calendar.list_events", "arguments": {}}),
        ),
    )
    .await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().get("retry-after").is_some());
}
