// crates/toolgate-aggregator/src/rpc.rs
// ============================================================================
// Module: JSON-RPC Envelopes
// Description: JSON-RPC response builders and backend payload decoding.
// Purpose: Keep the aggregator's wire handling in one place.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! The aggregator speaks JSON-RPC 2.0 on both sides. Backends may answer
//! with raw JSON or SSE-wrapped JSON (the first `data:` line of an event
//! stream); both decode through [`decode_backend_payload`]. Error codes
//! follow the JSON-RPC reservations: `-32602` for invalid params (unknown
//! service) and `-32603` for internal backend failures.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Error Codes
// ============================================================================

/// JSON-RPC error code for invalid params (unknown service).
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC error code for internal errors (backend failure).
pub const INTERNAL_ERROR: i64 = -32603;

// ============================================================================
// SECTION: Response Builders
// ============================================================================

/// Builds a JSON-RPC result response.
#[must_use]
pub fn result_response(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Builds a JSON-RPC error response.
#[must_use]
pub fn error_response(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
        },
    })
}

/// Returns the `id` member of a JSON-RPC request, defaulting to null.
#[must_use]
pub fn request_id(payload: &Value) -> Value {
    payload.get("id").cloned().unwrap_or(Value::Null)
}

// ============================================================================
// SECTION: Backend Payload Decoding
// ============================================================================

/// Decodes a backend response body that is raw JSON or SSE-wrapped JSON.
///
/// SSE-wrapped responses carry the JSON message on the first `data:` line.
#[must_use]
pub fn decode_backend_payload(content_type: Option<&str>, body: &[u8]) -> Option<Value> {
    let is_sse = content_type.is_some_and(|value| value.contains("text/event-stream"));
    if is_sse {
        return decode_sse_payload(body);
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        // Some backends mislabel SSE bodies; fall back to frame scanning.
        Err(_) => decode_sse_payload(body),
    }
}

/// Extracts the first `data:` line of an SSE body and parses it as JSON.
fn decode_sse_payload(body: &[u8]) -> Option<Value> {
    let text = String::from_utf8_lossy(body);
    for line in text.lines() {
        if let Some(data) = line.strip_prefix("data:") {
            let data = data.strip_prefix(' ').unwrap_or(data);
            return serde_json::from_str(data).ok();
        }
    }
    None
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::decode_backend_payload;
    use super::error_response;
    use super::request_id;

    #[test]
    fn decodes_raw_json() {
        let value = decode_backend_payload(Some("application/json"), br#"{"ok":true}"#);
        assert_eq!(value, Some(json!({"ok": true})));
    }

    #[test]
    fn decodes_sse_wrapped_json() {
        let body = b"event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\n";
        let value = decode_backend_payload(Some("text/event-stream"), body);
        assert_eq!(value.map(|payload| payload["id"].clone()), Some(json!(1)));
    }

    #[test]
    fn falls_back_to_sse_scan_on_mislabel() {
        let body = b"data: {\"id\":2}\n\n";
        let value = decode_backend_payload(Some("application/json"), body);
        assert_eq!(value, Some(json!({"id": 2})));
    }

    #[test]
    fn error_response_shape() {
        let value = error_response(json!(7), super::INVALID_PARAMS, "unknown service");
        assert_eq!(value["error"]["code"], json!(-32602));
        assert_eq!(value["id"], json!(7));
    }

    #[test]
    fn request_id_defaults_to_null() {
        assert_eq!(request_id(&json!({"id": 3})), json!(3));
        assert_eq!(request_id(&json!({})), serde_json::Value::Null);
    }
}
