// crates/toolgate-aggregator/tests/aggregator.rs
// ============================================================================
// Module: Aggregator Tests
// Description: Fan-out, routing, and degradation tests with a fake transport.
// ============================================================================
//! ## Overview
//! Validates initialize fan-out and capability unions, granted-service
//! filtering on `tools/list`, per-service `tools/call` routing, and
//! single-backend degradation.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use serde_json::json;
use toolgate_aggregator::Aggregator;
use toolgate_aggregator::BackendEndpoint;
use toolgate_aggregator::BackendError;
use toolgate_aggregator::BackendReply;
use toolgate_aggregator::BackendTransport;
use toolgate_aggregator::ByteSource;
use toolgate_core::ServiceName;
use toolgate_core::SessionId;

// ============================================================================
// SECTION: Fake Transport
// ============================================================================

/// Recorded outbound post.
#[derive(Debug, Clone)]
struct RecordedPost {
    url: String,
    session_id: Option<SessionId>,
    body: Value,
}

/// Scripted backend transport recording every call.
#[derive(Default)]
struct FakeTransport {
    /// Scripted post replies per URL, consumed in order.
    replies: Mutex<HashMap<String, VecDeque<Result<BackendReply, BackendError>>>>,
    /// Recorded posts and notifications.
    posts: Mutex<Vec<RecordedPost>>,
    /// Recorded session deletions.
    deletes: Mutex<Vec<(String, Option<SessionId>)>>,
}

impl FakeTransport {
    fn script(&self, url: &str, reply: Result<BackendReply, BackendError>) {
        self.replies.lock().unwrap().entry(url.to_string()).or_default().push_back(reply);
    }

    fn posts_to(&self, url: &str) -> Vec<RecordedPost> {
        self.posts.lock().unwrap().iter().filter(|post| post.url == url).cloned().collect()
    }

    fn deletes(&self) -> Vec<(String, Option<SessionId>)> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendTransport for FakeTransport {
    async fn post(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
        body: &Value,
        _timeout: Duration,
    ) -> Result<BackendReply, BackendError> {
        self.posts.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            session_id: session_id.cloned(),
            body: body.clone(),
        });
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
        session_id: Option<&SessionId>,
        body: &Value,
        _timeout: Duration,
    ) -> Result<(), BackendError> {
        self.posts.lock().unwrap().push(RecordedPost {
            url: url.to_string(),
            session_id: session_id.cloned(),
            body: body.clone(),
        });
        Ok(())
    }

    async fn open_stream(
        &self,
        _url: &str,
        _session_id: Option<&SessionId>,
    ) -> Result<Box<dyn ByteSource>, BackendError> {
        Ok(Box::new(EmptySource))
    }

    async fn delete_session(
        &self,
        url: &str,
        session_id: Option<&SessionId>,
        _timeout: Duration,
    ) -> Result<(), BackendError> {
        self.deletes.lock().unwrap().push((url.to_string(), session_id.cloned()));
        Ok(())
    }
}

/// Byte source that ends immediately.
struct EmptySource;

#[async_trait]
impl ByteSource for EmptySource {
    async fn next(&mut self) -> Result<Option<Bytes>, BackendError> {
        Ok(None)
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const CALENDAR_URL: &str = "http://calendar:3000/mcp";
const SEARCH_URL: &str = "http://search:3001/mcp";

fn endpoints() -> Vec<BackendEndpoint> {
    vec![
        BackendEndpoint {
            name: ServiceName::new("mock-calendar"),
            url: CALENDAR_URL.to_string(),
        },
        BackendEndpoint {
            name: ServiceName::new("duckduckgo"),
            url: SEARCH_URL.to_string(),
        },
    ]
}

fn aggregator(transport: Arc<FakeTransport>) -> Aggregator {
    Aggregator::new(
        endpoints(),
        transport,
        Duration::from_secs(10),
        Duration::from_secs(30),
    )
}

fn initialize_reply(session: &str, capabilities: Value) -> Result<BackendReply, BackendError> {
    Ok(BackendReply {
        session_id: Some(SessionId::new(session)),
        payload: json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"protocolVersion": "2025-03-26", "capabilities": capabilities}
        }),
    })
}

fn initialize_request() -> Value {
    json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}})
}

async fn initialized_session(
    transport: &Arc<FakeTransport>,
    aggregator: &Aggregator,
) -> SessionId {
    transport.script(CALENDAR_URL, initialize_reply("cal-1", json!({"tools": {}})));
    transport.script(SEARCH_URL, initialize_reply("ddg-1", json!({"resources": {}})));
    let response = aggregator.handle_post(None, None, initialize_request()).await;
    response.session_id.unwrap()
}

// ============================================================================
// SECTION: Initialize
// ============================================================================

/// Initialize fans out to every backend and unions capabilities.
#[tokio::test]
async fn initialize_merges_capabilities() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(Arc::clone(&transport));
    transport.script(CALENDAR_URL, initialize_reply("cal-1", json!({"tools": {}})));
    transport.script(SEARCH_URL, initialize_reply("ddg-1", json!({"resources": {}})));

    let response = aggregator.handle_post(None, None, initialize_request()).await;
    assert_eq!(response.status, 200);
    assert!(response.session_id.is_some());
    let body = response.body.unwrap();
    assert_eq!(body["result"]["capabilities"]["tools"], json!({}));
    assert_eq!(body["result"]["capabilities"]["resources"], json!({}));
    assert_eq!(aggregator.active_sessions(), 1);
    assert_eq!(transport.posts_to(CALENDAR_URL).len(), 1);
    assert_eq!(transport.posts_to(SEARCH_URL).len(), 1);
}

/// A failed backend degrades initialize to the remaining backends.
#[tokio::test]
async fn initialize_survives_one_backend_failure() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(Arc::clone(&transport));
    transport.script(CALENDAR_URL, initialize_reply("cal-1", json!({"tools": {}})));
    transport.script(SEARCH_URL, Err(BackendError::Status(500)));

    let response = aggregator.handle_post(None, None, initialize_request()).await;
    assert_eq!(response.status, 200);
    let session_id = response.session_id.unwrap();

    // Only the surviving backend is bound into the session.
    transport.script(CALENDAR_URL, Ok(BackendReply {
        session_id: None,
        payload: json!({"jsonrpc": "2.0", "id": 2, "result": {"tools": []}}),
    }));
    let list = aggregator
        .handle_post(
            Some(&session_id),
            None,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        )
        .await;
    assert_eq!(list.status, 200);
    let list_posts = transport.posts_to(SEARCH_URL);
    assert_eq!(list_posts.len(), 1, "search backend got only the initialize attempt");
}

/// Zero successful backends fail initialize.
#[tokio::test]
async fn initialize_with_no_backends_fails() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(Arc::clone(&transport));
    transport.script(CALENDAR_URL, Err(BackendError::Transport("down".to_string())));
    transport.script(SEARCH_URL, Err(BackendError::Transport("down".to_string())));

    let response = aggregator.handle_post(None, None, initialize_request()).await;
    assert_eq!(response.status, 502);
    assert_eq!(response.body.unwrap()["error"]["code"], json!(-32603));
    assert_eq!(aggregator.active_sessions(), 0);
}

// ============================================================================
// SECTION: Tools List
// ============================================================================

/// Granted services restrict the fan-out and names are prefixed.
#[tokio::test]
async fn tools_list_filters_and_prefixes() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(Arc::clone(&transport));
    let session_id = initialized_session(&transport, &aggregator).await;

    transport.script(CALENDAR_URL, Ok(BackendReply {
        session_id: None,
        payload: json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {"tools": [{"name": "list_events"}, {"name": "create_event"}]}
        }),
    }));

    let mut granted = BTreeSet::new();
    granted.insert(ServiceName::new("mock-calendar"));
    let response = aggregator
        .handle_post(
            Some(&session_id),
            Some(&granted),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        )
        .await;

    let body = response.body.unwrap();
    let tools = body["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> =
        tools.iter().map(|tool| tool["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["mock-calendar.list_events", "mock-calendar.create_event"]);
    assert!(names.iter().all(|name| name.starts_with("mock-calendar.")));

    // The filtered-out backend saw only the initialize post.
    assert_eq!(transport.posts_to(SEARCH_URL).len(), 1);
}

/// An empty granted set lists nothing.
#[tokio::test]
async fn tools_list_with_empty_grant_is_empty() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(Arc::clone(&transport));
    let session_id = initialized_session(&transport, &aggregator).await;

    let granted = BTreeSet::new();
    let response = aggregator
        .handle_post(
            Some(&session_id),
            Some(&granted),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        )
        .await;
    let body = response.body.unwrap();
    assert_eq!(body["result"]["tools"], json!([]));
}

// ============================================================================
// SECTION: Tools Call
// ============================================================================

/// Calls route to the owning backend with the un-prefixed name.
#[tokio::test]
async fn tools_call_routes_to_owning_backend() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(Arc::clone(&transport));
    let session_id = initialized_session(&transport, &aggregator).await;

    transport.script(CALENDAR_URL, Ok(BackendReply {
        session_id: None,
        payload: json!({"jsonrpc": "2.0", "id": 3, "result": {"content": []}}),
    }));

    let response = aggregator
        .handle_post(
            Some(&session_id),
            None,
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {"name": "mock-calendar.list_events", "arguments": {"date": "2026-02-14"}}
            }),
        )
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body.unwrap()["result"]["content"], json!([]));

    let posts = transport.posts_to(CALENDAR_URL);
    let call = posts.last().unwrap();
    assert_eq!(call.body["params"]["name"], json!("list_events"));
    assert_eq!(call.session_id, Some(SessionId::new("cal-1")));
    // The other backend received nothing beyond initialize.
    assert_eq!(transport.posts_to(SEARCH_URL).len(), 1);
}

/// Unknown services answer with JSON-RPC -32602.
#[tokio::test]
async fn tools_call_unknown_service_is_invalid_params() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(Arc::clone(&transport));
    let session_id = initialized_session(&transport, &aggregator).await;

    let response = aggregator
        .handle_post(
            Some(&session_id),
            None,
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": {"name": "nowhere.tool", "arguments": {}}
            }),
        )
        .await;
    assert_eq!(response.status, 400);
    assert_eq!(response.body.unwrap()["error"]["code"], json!(-32602));
}

/// Backend failures answer with JSON-RPC -32603 and 502.
#[tokio::test]
async fn tools_call_backend_failure_is_internal_error() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(Arc::clone(&transport));
    let session_id = initialized_session(&transport, &aggregator).await;

    transport.script(CALENDAR_URL, Err(BackendError::Status(500)));
    let response = aggregator
        .handle_post(
            Some(&session_id),
            None,
            json!({
                "jsonrpc": "2.0",
                "id": 5,
                "method": "tools/call",
                "params": {"name": "mock-calendar.list_events", "arguments": {}}
            }),
        )
        .await;
    assert_eq!(response.status, 502);
    assert_eq!(response.body.unwrap()["error"]["code"], json!(-32603));
}

// ============================================================================
// SECTION: Session Teardown
// ============================================================================

/// Deletes propagate to every backend session and drop the local session.
#[tokio::test]
async fn delete_propagates_and_drops_session() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(Arc::clone(&transport));
    let session_id = initialized_session(&transport, &aggregator).await;
    assert_eq!(aggregator.active_sessions(), 1);

    let status = aggregator.handle_delete(&session_id).await;
    assert_eq!(status, 204);
    assert_eq!(aggregator.active_sessions(), 0);

    let deletes = transport.deletes();
    assert_eq!(deletes.len(), 2);
    assert!(deletes.iter().any(|(url, session)| {
        url == CALENDAR_URL && session == &Some(SessionId::new("cal-1"))
    }));

    let status = aggregator.handle_delete(&session_id).await;
    assert_eq!(status, 404);
}

/// Ping answers locally with an empty result.
#[tokio::test]
async fn ping_answers_locally() {
    let transport = Arc::new(FakeTransport::default());
    let aggregator = aggregator(transport);
    let response = aggregator
        .handle_post(None, None, json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body.unwrap()["result"], json!({}));
}
