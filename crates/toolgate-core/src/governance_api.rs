// crates/toolgate-core/src/governance_api.rs
// ============================================================================
// Module: Toolgate Governance Contract
// Description: Approval request records and governance wire payloads.
// Purpose: Provide the shared contract between evaluators and governance instances.
// Dependencies: serde, serde_json, crate::{claims, digest, identifiers, time}
// ============================================================================

//! ## Overview
//! This module defines the record kept per gated tool-call request and the
//! request/response payloads exchanged between the decision engine and a
//! service-governance instance. The decision engine is a client of this
//! contract over HTTP; the control plane serves it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::claims::ClaimSet;
use crate::digest::ArgumentsDigest;
use crate::identifiers::RequestId;
use crate::identifiers::SessionId;
use crate::identifiers::SubjectId;
use crate::identifiers::ToolName;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Request Status
// ============================================================================

/// Lifecycle status of an approval request.
///
/// # Invariants
/// - `Pending → Approved` and `Pending → Denied` are the only transitions;
///   both are irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting an admin decision.
    Pending,
    /// Approved by an admin; executable once.
    Approved,
    /// Denied by an admin.
    Denied,
}

impl RequestStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

// ============================================================================
// SECTION: Approval Request Record
// ============================================================================

/// Record kept per gated tool-call request.
///
/// # Invariants
/// - `(caller, tool, arguments_digest)` is unique while `status = pending`
///   and `decision_consumed = false`.
/// - A resolved record is consumed at most once; after consumption a fresh
///   record may appear under the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request identifier (`REQ-<monotonic>`).
    pub request_id: RequestId,
    /// Caller identity the request belongs to.
    pub caller: SubjectId,
    /// Tool the caller attempted to invoke.
    pub tool: ToolName,
    /// Canonical digest of the call arguments.
    pub arguments_digest: ArgumentsDigest,
    /// Aggregator session the call arrived on, when known.
    pub session_id: Option<SessionId>,
    /// Full JSON-RPC body, retained for replay.
    pub request_payload: Value,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Whether the terminal decision has been consumed by an evaluate.
    pub decision_consumed: bool,
    /// Denial reason, when denied.
    pub reason: Option<String>,
    /// Admin who resolved the request.
    pub approver: Option<SubjectId>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Resolution timestamp, when resolved.
    pub resolved_at: Option<Timestamp>,
}

// ============================================================================
// SECTION: Evaluate Payloads
// ============================================================================

/// Decision returned by a governance evaluation.
///
/// # Invariants
/// - Variants are stable for serialization and header mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceDecision {
    /// The call may proceed.
    Allow,
    /// The call is denied.
    Deny,
    /// The call is suspended awaiting approval.
    Pending,
}

/// Evaluate request sent by the decision engine.
///
/// # Invariants
/// - `arguments` and `payload` are forwarded verbatim from the JSON-RPC body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluateRequest {
    /// Un-prefixed tool name.
    pub tool: ToolName,
    /// Resolved caller identity.
    pub caller: SubjectId,
    /// Full decoded claim set of the caller.
    pub claims: ClaimSet,
    /// Tool-call arguments object.
    pub arguments: Value,
    /// Aggregator session identifier, when present.
    pub session_id: Option<SessionId>,
    /// Full JSON-RPC body, retained for replay.
    pub payload: Value,
}

/// Evaluate response returned by a governance instance.
///
/// # Invariants
/// - `request_id` is present for every decision that touched a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluateResponse {
    /// Decision for this evaluation.
    pub decision: GovernanceDecision,
    /// Approval request the decision refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// Human-readable message (denial reason).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl EvaluateResponse {
    /// Builds a plain allow response.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            decision: GovernanceDecision::Allow,
            request_id: None,
            message: None,
        }
    }
}

// ============================================================================
// SECTION: Resolution Payloads
// ============================================================================

/// Admin resolution payload for approve/deny operations.
///
/// # Invariants
/// - `reason` is required for denials at the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// Admin resolving the request.
    pub approver: SubjectId,
    /// Denial reason (ignored on approve).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
