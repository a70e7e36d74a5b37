// crates/toolgate-engine/src/decision.rs
// ============================================================================
// Module: Authorization Decisions
// Description: Decision model and header composition for the engine.
// Purpose: Carry allow/deny outcomes plus upstream and client headers.
// Dependencies: toolgate-core
// ============================================================================

//! ## Overview
//! A decision is the engine's complete answer for one request: allow or
//! deny, the HTTP status to surface on deny, the reason echoed in
//! `x-authz-reason`, headers injected into the upstream request, and
//! headers returned to the client. Reason strings are part of the external
//! contract and stay stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use toolgate_core::RequestId;
use toolgate_core::Revision;
use toolgate_core::ServiceName;
use toolgate_core::SubjectId;

// ============================================================================
// SECTION: Header Names
// ============================================================================

/// Upstream header carrying the resolved subject identity.
pub const HEADER_USER_ID: &str = "x-user-id";
/// Upstream header carrying the target service of a tool call.
pub const HEADER_MCP_SERVICE: &str = "x-mcp-service";
/// Upstream header carrying the bundle revision the decision used.
pub const HEADER_BUNDLE_REVISION: &str = "x-bundle-revision";
/// Upstream header carrying the caller's granted services on `tools/list`.
pub const HEADER_GRANTED_SERVICES: &str = "x-granted-services";
/// Response header carrying the decision reason.
pub const HEADER_AUTHZ_REASON: &str = "x-authz-reason";
/// Response header carrying the approval request id on pending decisions.
pub const HEADER_REQUEST_ID: &str = "x-request-id";
/// Response header advising the retry delay on pending decisions.
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Retry delay advertised on pending decisions, in seconds.
pub const PENDING_RETRY_AFTER_SECS: &str = "30";

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Complete authorization decision for one request.
///
/// # Invariants
/// - `allow = false` implies a 4xx/5xx `status`.
/// - `reason` is always present and echoed in `x-authz-reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed.
    pub allow: bool,
    /// HTTP status surfaced to the client on deny (200 on allow).
    pub status: u16,
    /// Stable decision reason.
    pub reason: String,
    /// Headers injected into the upstream request.
    pub request_headers: Vec<(&'static str, String)>,
    /// Headers returned to the client.
    pub response_headers: Vec<(&'static str, String)>,
}

impl Decision {
    /// Builds an allow decision.
    #[must_use]
    pub fn allow(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            allow: true,
            status: 200,
            response_headers: vec![(HEADER_AUTHZ_REASON, reason.clone())],
            request_headers: Vec::new(),
            reason,
        }
    }

    /// Builds a deny decision.
    #[must_use]
    pub fn deny(status: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            allow: false,
            status,
            response_headers: vec![(HEADER_AUTHZ_REASON, reason.clone())],
            request_headers: Vec::new(),
            reason,
        }
    }

    /// Builds the pending deny with its retry headers.
    #[must_use]
    pub fn pending(request_id: &RequestId) -> Self {
        let mut decision = Self::deny(403, format!("Gated tool pending: {request_id}"));
        decision
            .response_headers
            .push((HEADER_REQUEST_ID, request_id.as_str().to_string()));
        decision
            .response_headers
            .push((HEADER_RETRY_AFTER, PENDING_RETRY_AFTER_SECS.to_string()));
        decision
    }

    /// Attaches the resolved subject identity header.
    #[must_use]
    pub fn with_subject(mut self, subject: &SubjectId) -> Self {
        self.request_headers.push((HEADER_USER_ID, subject.as_str().to_string()));
        self
    }

    /// Attaches the target service header.
    #[must_use]
    pub fn with_service(mut self, service: &ServiceName) -> Self {
        self.request_headers.push((HEADER_MCP_SERVICE, service.as_str().to_string()));
        self
    }

    /// Attaches the bundle revision header.
    #[must_use]
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.request_headers.push((HEADER_BUNDLE_REVISION, revision.to_string()));
        self
    }

    /// Attaches the granted-services header (comma-joined, sorted input).
    #[must_use]
    pub fn with_granted_services(mut self, services: &[ServiceName]) -> Self {
        let joined =
            services.iter().map(ServiceName::as_str).collect::<Vec<&str>>().join(",");
        self.request_headers.push((HEADER_GRANTED_SERVICES, joined));
        self
    }

    /// Returns the value of a response header when set.
    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.response_headers
            .iter()
            .find(|(header, _)| *header == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the value of a request header when set.
    #[must_use]
    pub fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers
            .iter()
            .find(|(header, _)| *header == name)
            .map(|(_, value)| value.as_str())
    }
}
