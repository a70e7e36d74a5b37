// crates/toolgate-engine/src/request.rs
// ============================================================================
// Module: Check Request Classification
// Description: Transport-neutral request model and JSON-RPC classification.
// Purpose: Split incoming requests into stream-setup, meta-call, and tool-call.
// Dependencies: serde_json, toolgate-core
// ============================================================================

//! ## Overview
//! The decision engine receives an external-auth style check request:
//! method, path, headers, and body. Classification is deliberately
//! defensive: a `GET /mcp`, an empty body, or an unparseable body is a
//! stream-setup; any JSON-RPC method other than `tools/call` is a
//! meta-call; only a well-formed `tools/call` becomes a tool-call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use toolgate_core::SessionId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "authorization";
/// Header carrying the aggregator session id.
pub const SESSION_HEADER: &str = "mcp-session-id";

// ============================================================================
// SECTION: Check Request
// ============================================================================

/// Transport-neutral request submitted for an authorization decision.
///
/// # Invariants
/// - Header names are stored lowercase.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Request headers with lowercase names.
    pub headers: BTreeMap<String, String>,
    /// Raw request body.
    pub body: Vec<u8>,
}

impl CheckRequest {
    /// Creates a check request, lowercasing header names.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: impl IntoIterator<Item = (String, String)>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value))
                .collect(),
            body,
        }
    }

    /// Returns a header value by lowercase name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns the aggregator session id header, when present.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.header(SESSION_HEADER).map(SessionId::new)
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classified shape of a check request.
///
/// # Invariants
/// - `ToolCall::name` is the raw `params.name`; namespacing is validated by
///   the evaluation layer so the rejection can carry a reason.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestClass {
    /// SSE stream establishment or unparseable body (defensive fallback).
    StreamSetup,
    /// JSON-RPC call other than `tools/call`.
    MetaCall {
        /// JSON-RPC method name.
        method: String,
    },
    /// JSON-RPC `tools/call`.
    ToolCall {
        /// Raw `params.name` as sent by the client.
        name: String,
        /// Tool-call arguments object.
        arguments: Value,
        /// Full JSON-RPC body for governance replay.
        payload: Value,
    },
}

impl RequestClass {
    /// Returns true when this is a `tools/list` meta-call.
    #[must_use]
    pub fn is_tools_list(&self) -> bool {
        matches!(self, Self::MetaCall { method } if method == "tools/list")
    }
}

/// Classifies a check request.
#[must_use]
pub fn classify(request: &CheckRequest) -> RequestClass {
    if request.method.eq_ignore_ascii_case("GET") && request.body.is_empty() {
        return RequestClass::StreamSetup;
    }
    if request.body.is_empty() {
        return RequestClass::StreamSetup;
    }
    let Ok(payload) = serde_json::from_slice::<Value>(&request.body) else {
        return RequestClass::StreamSetup;
    };
    let Some(method) = payload.get("method").and_then(Value::as_str) else {
        return RequestClass::StreamSetup;
    };
    if method != "tools/call" {
        return RequestClass::MetaCall {
            method: method.to_string(),
        };
    }
    let name = payload
        .get("params")
        .and_then(|params| params.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let arguments = payload
        .get("params")
        .and_then(|params| params.get("arguments"))
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    RequestClass::ToolCall {
        name,
        arguments,
        payload,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::CheckRequest;
    use super::RequestClass;
    use super::classify;

    fn post(body: &[u8]) -> CheckRequest {
        CheckRequest::new("POST", "/mcp", Vec::new(), body.to_vec())
    }

    #[test]
    fn get_mcp_is_stream_setup() {
        let request = CheckRequest::new("GET", "/mcp", Vec::new(), Vec::new());
        assert_eq!(classify(&request), RequestClass::StreamSetup);
    }

    #[test]
    fn unparseable_body_falls_back_to_stream_setup() {
        assert_eq!(classify(&post(b"not json")), RequestClass::StreamSetup);
        assert_eq!(classify(&post(b"")), RequestClass::StreamSetup);
    }

    #[test]
    fn non_tool_call_is_meta() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        assert_eq!(
            classify(&post(body.to_string().as_bytes())),
            RequestClass::MetaCall {
                method: "initialize".to_string()
            }
        );
    }

    #[test]
    fn tool_call_extracts_name_and_arguments() {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "tools/call",
            "params": {"name": "mock-calendar.list_events", "arguments": {"date": "2026-02-14"}}
        });
        let class = classify(&post(body.to_string().as_bytes()));
        let RequestClass::ToolCall {
            name,
            arguments,
            payload,
        } = class
        else {
            panic!("expected tool call");
        };
        assert_eq!(name, "mock-calendar.list_events");
        assert_eq!(arguments, json!({"date": "2026-02-14"}));
        assert_eq!(payload["id"], json!(2));
    }

    #[test]
    fn header_names_are_lowercased() {
        let request = CheckRequest::new(
            "POST",
            "/mcp",
            vec![("Mcp-Session-Id".to_string(), "sess-1".to_string())],
            Vec::new(),
        );
        assert_eq!(request.header("mcp-session-id"), Some("sess-1"));
        assert_eq!(request.session_id().map(|id| id.as_str().to_string()), Some("sess-1".into()));
    }
}
