// crates/toolgate-control/src/audit.rs
// ============================================================================
// Module: Control-Plane Audit
// Description: Structured audit events for control-plane operations.
// Purpose: Record admin mutations and governance transitions as JSON lines.
// Dependencies: serde, toolgate-core
// ============================================================================

//! ## Overview
//! Every control-plane operation emits one audit event: the operation label,
//! the decision, the caller's token fingerprint, and the resulting revision
//! or request id when applicable. Events serialize as single JSON lines so
//! deployments can ship them with any log collector. Raw tokens never
//! appear in events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use toolgate_core::RequestId;
use toolgate_core::Revision;

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Audit event payload for one control-plane operation.
#[derive(Debug, Serialize)]
pub struct ControlAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Operation label (route-level).
    operation: String,
    /// Decision outcome: `allow` or `deny`.
    decision: &'static str,
    /// Role the caller authenticated under, when authenticated.
    role: Option<&'static str>,
    /// Bearer token fingerprint (sha256), when authenticated.
    token_fingerprint: Option<String>,
    /// Revision after a successful mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    revision: Option<Revision>,
    /// Approval request touched by the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<RequestId>,
    /// Failure reason for deny events.
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl ControlAuditEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(
        operation: impl Into<String>,
        role: &'static str,
        token_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            event: "control_plane_op",
            operation: operation.into(),
            decision: "allow",
            role: Some(role),
            token_fingerprint: Some(token_fingerprint.into()),
            revision: None,
            request_id: None,
            reason: None,
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            event: "control_plane_op",
            operation: operation.into(),
            decision: "deny",
            role: None,
            token_fingerprint: None,
            revision: None,
            request_id: None,
            reason: Some(reason.into()),
        }
    }

    /// Attaches the post-mutation revision.
    #[must_use]
    pub const fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Attaches the approval request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for control-plane events.
pub trait ControlAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &ControlAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl ControlAuditSink for StderrAuditSink {
    fn record(&self, event: &ControlAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            eprintln!("{payload}");
        }
    }
}

/// No-op audit sink for tests.
pub struct NoopAuditSink;

impl ControlAuditSink for NoopAuditSink {
    fn record(&self, _event: &ControlAuditEvent) {}
}
