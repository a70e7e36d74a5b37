// crates/toolgate-gateway/src/audit.rs
// ============================================================================
// Module: Authorization Audit
// Description: Structured audit events for edge authorization decisions.
// Purpose: Record every allow/deny outcome as one JSON line.
// Dependencies: serde, toolgate-core
// ============================================================================

//! ## Overview
//! Every edge decision emits one audit event: the resolved subject, the
//! decision, the stable reason, and the bundle revision consulted. Events
//! serialize as single JSON lines for any log collector. Tokens and raw
//! claims never appear in events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use toolgate_core::Revision;

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Audit event payload for one edge decision.
#[derive(Debug, Serialize)]
pub struct AuthzAuditEvent {
    /// Event identifier.
    event: &'static str,
    /// Request kind label.
    kind: &'static str,
    /// Resolved subject, when authentication succeeded.
    subject: Option<String>,
    /// Decision outcome: `allow` or `deny`.
    decision: &'static str,
    /// HTTP status surfaced to the client.
    status: u16,
    /// Stable decision reason.
    reason: String,
    /// Bundle revision the decision used, when bootstrapped.
    #[serde(skip_serializing_if = "Option::is_none")]
    revision: Option<Revision>,
}

impl AuthzAuditEvent {
    /// Builds a decision event.
    #[must_use]
    pub fn decision(
        kind: &'static str,
        subject: Option<String>,
        allowed: bool,
        status: u16,
        reason: impl Into<String>,
        revision: Option<Revision>,
    ) -> Self {
        Self {
            event: "authz_decision",
            kind,
            subject,
            decision: if allowed { "allow" } else { "deny" },
            status,
            reason: reason.into(),
            revision,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for edge decisions.
pub trait AuthzAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &AuthzAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuthzAuditSink;

impl AuthzAuditSink for StderrAuthzAuditSink {
    fn record(&self, event: &AuthzAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            eprintln!("{payload}");
        }
    }
}

/// No-op audit sink for tests.
pub struct NoopAuthzAuditSink;

impl AuthzAuditSink for NoopAuthzAuditSink {
    fn record(&self, _event: &AuthzAuditEvent) {}
}
