// crates/toolgate-control/src/server/tests.rs
// ============================================================================
// Module: Control-Plane Server Tests
// Description: Handler-level tests for admin, bundle, and governance routes.
// Purpose: Validate role enforcement and operation semantics with in-memory state.
// Dependencies: toolgate-control
// ============================================================================

//! ## Overview
//! Exercises control-plane handlers directly with in-memory fixtures: role
//! separation, catalog mutations, and the evaluate/approve/deny flow.

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

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use serde_json::json;
use toolgate_config::ControlPlaneConfig;
use toolgate_core::ClaimSet;
use toolgate_core::EvaluateRequest;
use toolgate_core::GovernanceDecision;
use toolgate_core::GovernanceId;
use toolgate_core::RequestId;
use toolgate_core::RequestStatus;
use toolgate_core::ServiceName;
use toolgate_core::SubjectId;
use toolgate_core::ToolName;
use toolgate_governance::GovernanceRegistry;
use toolgate_store::PolicyStore;

use super::ControlState;
use super::GovernancePayload;
use super::ResolvePayload;
use super::ServicePayload;
use super::ToolPayload;
use super::handle_approve;
use super::handle_attach_governance;
use super::handle_bundle;
use super::handle_deny;
use super::handle_enable_service;
use super::handle_evaluate;
use super::handle_pending;
use super::handle_register_service;
use super::handle_register_tool;
use super::handle_revoke;
use crate::audit::NoopAuditSink;

// ============================================================================
// SECTION: Test Helpers
// ============================================================================

fn config() -> ControlPlaneConfig {
    ControlPlaneConfig {
        listen: "127.0.0.1:9000".parse().unwrap(),
        admin_tokens: vec!["admin-secret".to_string()],
        gateway_tokens: vec!["gw-secret".to_string()],
        governance_url: "http://npl:12000".to_string(),
        bundle_token: "opaque".to_string(),
        max_body_bytes: 1024 * 1024,
    }
}

fn state() -> ControlState {
    ControlState::new(
        &config(),
        Arc::new(PolicyStore::new()),
        Arc::new(GovernanceRegistry::new()),
        Arc::new(NoopAuditSink),
    )
}

fn headers_for(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let value = format!("Bearer {token}");
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
    headers
}

fn admin_headers() -> HeaderMap {
    headers_for("admin-secret")
}

fn gateway_headers() -> HeaderMap {
    headers_for("gw-secret")
}

fn calendar() -> ServiceName {
    ServiceName::new("mock-calendar")
}

async fn seed_gated_calendar(state: &ControlState) {
    handle_register_service(
        State(state.clone()),
        admin_headers(),
        Json(ServicePayload {
            service: calendar(),
        }),
    )
    .await
    .unwrap();
    handle_enable_service(State(state.clone()), Path(calendar()), admin_headers())
        .await
        .unwrap();
    handle_register_tool(
        State(state.clone()),
        Path(calendar()),
        admin_headers(),
        Json(ToolPayload {
            tool: ToolName::new("create_event"),
            tag: Some("gated".to_string()),
        }),
    )
    .await
    .unwrap();
    handle_attach_governance(
        State(state.clone()),
        Path(calendar()),
        admin_headers(),
        Json(GovernancePayload {
            governance_id: GovernanceId::new("gov-42"),
        }),
    )
    .await
    .unwrap();
}

fn evaluate_request() -> EvaluateRequest {
    EvaluateRequest {
        tool: ToolName::new("create_event"),
        caller: SubjectId::new("jarvis@acme.com"),
        claims: ClaimSet::default(),
        arguments: json!({"title": "T", "date": "2026-02-15"}),
        session_id: None,
        payload: json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call"}),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Admin routes reject gateway tokens and unauthenticated callers.
#[tokio::test]
async fn admin_routes_enforce_role() {
    let state = state();
    let err = handle_register_service(
        State(state.clone()),
        gateway_headers(),
        Json(ServicePayload {
            service: calendar(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);

    let err = handle_register_service(
        State(state),
        HeaderMap::new(),
        Json(ServicePayload {
            service: calendar(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::UNAUTHORIZED);
}

/// Bundle reads require the gateway role.
#[tokio::test]
async fn bundle_requires_gateway_role() {
    let state = state();
    assert!(handle_bundle(State(state.clone()), gateway_headers()).await.is_ok());
    let err = handle_bundle(State(state), admin_headers()).await.unwrap_err();
    assert_eq!(err.status, StatusCode::FORBIDDEN);
}

/// Mutations on unknown services map to 404.
#[tokio::test]
async fn unknown_service_maps_to_not_found() {
    let state = state();
    let err = handle_enable_service(State(state), Path(calendar()), admin_headers())
        .await
        .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

/// Invalid tag labels map to 422.
#[tokio::test]
async fn invalid_tag_maps_to_unprocessable() {
    let state = state();
    handle_register_service(
        State(state.clone()),
        admin_headers(),
        Json(ServicePayload {
            service: calendar(),
        }),
    )
    .await
    .unwrap();
    let err = handle_register_tool(
        State(state),
        Path(calendar()),
        admin_headers(),
        Json(ToolPayload {
            tool: ToolName::new("create_event"),
            tag: Some("locked".to_string()),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
}

/// The evaluate/approve/retry flow consumes decisions exactly once.
#[tokio::test]
async fn evaluate_approve_retry_flow() {
    let state = state();
    seed_gated_calendar(&state).await;

    let Json(first) = handle_evaluate(
        State(state.clone()),
        Path(calendar()),
        gateway_headers(),
        Json(evaluate_request()),
    )
    .await
    .unwrap();
    assert_eq!(first.decision, GovernanceDecision::Pending);
    let request_id = first.request_id.unwrap();
    assert_eq!(request_id, RequestId::new("REQ-1"));

    let Json(pending) =
        handle_pending(State(state.clone()), Path(calendar()), admin_headers()).await.unwrap();
    assert_eq!(pending.len(), 1);

    let Json(approved) = handle_approve(
        State(state.clone()),
        Path((calendar(), request_id.clone())),
        admin_headers(),
        Json(ResolvePayload {
            approver: SubjectId::new("admin@acme.com"),
            reason: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);

    let Json(second) = handle_evaluate(
        State(state.clone()),
        Path(calendar()),
        gateway_headers(),
        Json(evaluate_request()),
    )
    .await
    .unwrap();
    assert_eq!(second.decision, GovernanceDecision::Allow);
    assert_eq!(second.request_id, Some(request_id.clone()));

    let Json(third) = handle_evaluate(
        State(state.clone()),
        Path(calendar()),
        gateway_headers(),
        Json(evaluate_request()),
    )
    .await
    .unwrap();
    assert_eq!(third.decision, GovernanceDecision::Pending);
    assert_eq!(third.request_id, Some(RequestId::new("REQ-2")));

    // Approving the consumed request again conflicts.
    let err = handle_approve(
        State(state),
        Path((calendar(), request_id)),
        admin_headers(),
        Json(ResolvePayload {
            approver: SubjectId::new("admin@acme.com"),
            reason: None,
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::CONFLICT);
}

/// Denials carry the reason to the consuming evaluate.
#[tokio::test]
async fn deny_carries_reason() {
    let state = state();
    seed_gated_calendar(&state).await;

    let Json(first) = handle_evaluate(
        State(state.clone()),
        Path(calendar()),
        gateway_headers(),
        Json(evaluate_request()),
    )
    .await
    .unwrap();
    let request_id = first.request_id.unwrap();

    let Json(denied) = handle_deny(
        State(state.clone()),
        Path((calendar(), request_id.clone())),
        admin_headers(),
        Json(ResolvePayload {
            approver: SubjectId::new("admin@acme.com"),
            reason: Some("not needed".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(denied.status, RequestStatus::Denied);

    let Json(consumed) = handle_evaluate(
        State(state.clone()),
        Path(calendar()),
        gateway_headers(),
        Json(evaluate_request()),
    )
    .await
    .unwrap();
    assert_eq!(consumed.decision, GovernanceDecision::Deny);
    assert_eq!(consumed.message.as_deref(), Some("not needed"));
}

/// Denials without a reason map to 422.
#[tokio::test]
async fn deny_without_reason_is_rejected() {
    let state = state();
    seed_gated_calendar(&state).await;
    let Json(first) = handle_evaluate(
        State(state.clone()),
        Path(calendar()),
        gateway_headers(),
        Json(evaluate_request()),
    )
    .await
    .unwrap();
    let request_id = first.request_id.unwrap();

    let err = handle_deny(
        State(state),
        Path((calendar(), request_id)),
        admin_headers(),
        Json(ResolvePayload {
            approver: SubjectId::new("admin@acme.com"),
            reason: None,
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
}

/// Evaluate against a service without governance maps to 404.
#[tokio::test]
async fn evaluate_without_instance_is_not_found() {
    let state = state();
    let err = handle_evaluate(
        State(state),
        Path(calendar()),
        gateway_headers(),
        Json(evaluate_request()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

/// Revocations surface in bundle data.
#[tokio::test]
async fn revocation_reaches_bundle() {
    let state = state();
    handle_revoke(
        State(state.clone()),
        admin_headers(),
        Json(super::RevocationPayload {
            subject: SubjectId::new("jarvis@acme.com"),
        }),
    )
    .await
    .unwrap();
    let bundle = state.store.bundle_data();
    assert!(bundle.revoked_subjects.contains(&SubjectId::new("jarvis@acme.com")));
}
