// crates/toolgate-governance/src/protocol.rs
// ============================================================================
// Module: Service Governance Protocol
// Description: Per-service approval state machine for gated tool calls.
// Purpose: Create, resolve, and consume approval requests exactly once.
// Dependencies: toolgate-core, serde_json
// ============================================================================

//! ## Overview
//! One [`ServiceGovernance`] instance exists per backend service. Evaluating
//! a gated call either creates a pending request, returns the existing
//! pending request for an identical retry, or consumes a resolved decision
//! exactly once. Terminal transitions (`pending → approved`,
//! `pending → denied`) are irreversible; a consumed decision never fires
//! again, and the next identical call starts a fresh pending request.
//!
//! Consumed records are retained for inspection up to a bounded cap and
//! pruned oldest-first; pending and unconsumed resolved records are never
//! pruned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;

use thiserror::Error;
use toolgate_core::ApprovalRequest;
use toolgate_core::EvaluateRequest;
use toolgate_core::EvaluateResponse;
use toolgate_core::GovernanceDecision;
use toolgate_core::GovernanceId;
use toolgate_core::RequestId;
use toolgate_core::RequestStatus;
use toolgate_core::ServiceName;
use toolgate_core::SubjectId;
use toolgate_core::Timestamp;
use toolgate_core::ToolName;
use toolgate_core::ToolTag;
use toolgate_core::digest::ArgumentsDigest;
use toolgate_core::digest::DigestError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum consumed records retained per instance before pruning.
pub const MAX_CONSUMED_RETAINED: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by governance protocol operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// Request is not registered with this instance.
    #[error("unknown request: {0}")]
    UnknownRequest(RequestId),
    /// Terminal transition attempted on a non-pending request.
    #[error("invalid state for {request_id}: expected pending, found {found}")]
    InvalidState {
        /// Request the transition targeted.
        request_id: RequestId,
        /// Status found on the record.
        found: &'static str,
    },
    /// Denial attempted without a reason.
    #[error("denial requires a reason")]
    MissingReason,
    /// Canonical argument digesting failed.
    #[error(transparent)]
    Digest(#[from] DigestError),
}

// ============================================================================
// SECTION: Request Key
// ============================================================================

/// Retry-detection key for pending requests.
///
/// # Invariants
/// - Unique in the index while the request is pending or resolved-unconsumed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RequestKey {
    /// Caller identity.
    caller: SubjectId,
    /// Un-prefixed tool name.
    tool: ToolName,
    /// Canonical digest of the call arguments.
    digest: ArgumentsDigest,
}

// ============================================================================
// SECTION: Protocol Instance
// ============================================================================

/// Per-service approval protocol instance.
///
/// # Invariants
/// - All mutating operations on one instance are serialized by the caller.
/// - `counter` is monotonic; request ids are never reused.
/// - `by_key` indexes exactly the requests whose decision may still fire.
#[derive(Debug)]
pub struct ServiceGovernance {
    /// Service this instance governs.
    service: ServiceName,
    /// Governance instance identifier published in bundles.
    governance_id: GovernanceId,
    /// Tool tags mirrored from the catalog.
    tools: BTreeMap<ToolName, ToolTag>,
    /// All retained requests keyed by id.
    requests: BTreeMap<RequestId, ApprovalRequest>,
    /// Retry-detection index over live requests.
    by_key: BTreeMap<RequestKey, RequestId>,
    /// Monotonic counter backing `REQ-n` ids.
    counter: u64,
    /// Consumed record ids in consumption order, oldest first.
    consumed_order: VecDeque<RequestId>,
}

impl ServiceGovernance {
    /// Creates a new instance for a service.
    #[must_use]
    pub fn new(service: ServiceName, governance_id: GovernanceId) -> Self {
        Self {
            service,
            governance_id,
            tools: BTreeMap::new(),
            requests: BTreeMap::new(),
            by_key: BTreeMap::new(),
            counter: 0,
            consumed_order: VecDeque::new(),
        }
    }

    /// Returns the governed service name.
    #[must_use]
    pub const fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Returns the governance instance identifier.
    #[must_use]
    pub const fn governance_id(&self) -> &GovernanceId {
        &self.governance_id
    }

    /// Mirrors a tool tag from the catalog into this instance.
    pub fn set_tool_tag(&mut self, tool: ToolName, tag: ToolTag) {
        self.tools.insert(tool, tag);
    }

    /// Removes a mirrored tool tag.
    pub fn remove_tool(&mut self, tool: &ToolName) {
        self.tools.remove(tool);
    }

    /// Evaluates a gated tool call against the protocol state.
    ///
    /// Decision semantics:
    /// - tool mirrored as `open` → allow (defensive; the engine should not
    ///   route open tools here),
    /// - no live record under the retry key → create pending,
    /// - live pending record → same pending request id (idempotent retry),
    /// - resolved unconsumed record → consume it exactly once and forward
    ///   the decision,
    /// - consumed record → treated as absent, a fresh pending is created.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Digest`] when arguments cannot be digested.
    pub fn evaluate(
        &mut self,
        request: &EvaluateRequest,
        now: Timestamp,
    ) -> Result<EvaluateResponse, GovernanceError> {
        if self.tools.get(&request.tool) == Some(&ToolTag::Open) {
            return Ok(EvaluateResponse::allow());
        }
        let digest = ArgumentsDigest::of(&request.arguments)?;
        let key = RequestKey {
            caller: request.caller.clone(),
            tool: request.tool.clone(),
            digest: digest.clone(),
        };

        if let Some(request_id) = self.by_key.get(&key).cloned() {
            if let Some(record) = self.requests.get_mut(&request_id) {
                match record.status {
                    RequestStatus::Pending => {
                        return Ok(EvaluateResponse {
                            decision: GovernanceDecision::Pending,
                            request_id: Some(request_id),
                            message: None,
                        });
                    }
                    RequestStatus::Approved => {
                        record.decision_consumed = true;
                        self.by_key.remove(&key);
                        self.mark_consumed(request_id.clone());
                        return Ok(EvaluateResponse {
                            decision: GovernanceDecision::Allow,
                            request_id: Some(request_id),
                            message: None,
                        });
                    }
                    RequestStatus::Denied => {
                        record.decision_consumed = true;
                        let message = record.reason.clone();
                        self.by_key.remove(&key);
                        self.mark_consumed(request_id.clone());
                        return Ok(EvaluateResponse {
                            decision: GovernanceDecision::Deny,
                            request_id: Some(request_id),
                            message,
                        });
                    }
                }
            }
            // Index entry without a record: drop the stale entry and fall
            // through to creating a fresh request.
            self.by_key.remove(&key);
        }

        let request_id = self.next_request_id();
        let record = ApprovalRequest {
            request_id: request_id.clone(),
            caller: request.caller.clone(),
            tool: request.tool.clone(),
            arguments_digest: digest,
            session_id: request.session_id.clone(),
            request_payload: request.payload.clone(),
            status: RequestStatus::Pending,
            decision_consumed: false,
            reason: None,
            approver: None,
            created_at: now,
            resolved_at: None,
        };
        self.requests.insert(request_id.clone(), record);
        self.by_key.insert(key, request_id.clone());
        self.prune_consumed();
        Ok(EvaluateResponse {
            decision: GovernanceDecision::Pending,
            request_id: Some(request_id),
            message: None,
        })
    }

    /// Approves a pending request.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::UnknownRequest`] or
    /// [`GovernanceError::InvalidState`] when the request cannot transition.
    pub fn approve(
        &mut self,
        request_id: &RequestId,
        approver: SubjectId,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        let record = self.pending_record(request_id)?;
        record.status = RequestStatus::Approved;
        record.approver = Some(approver);
        record.resolved_at = Some(now);
        Ok(())
    }

    /// Denies a pending request with a reason.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::MissingReason`] on an empty reason, and
    /// [`GovernanceError::UnknownRequest`] or
    /// [`GovernanceError::InvalidState`] when the request cannot transition.
    pub fn deny(
        &mut self,
        request_id: &RequestId,
        approver: SubjectId,
        reason: String,
        now: Timestamp,
    ) -> Result<(), GovernanceError> {
        if reason.trim().is_empty() {
            return Err(GovernanceError::MissingReason);
        }
        let record = self.pending_record(request_id)?;
        record.status = RequestStatus::Denied;
        record.approver = Some(approver);
        record.reason = Some(reason);
        record.resolved_at = Some(now);
        Ok(())
    }

    /// Returns all pending requests, oldest id first.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<&ApprovalRequest> {
        self.requests
            .values()
            .filter(|record| record.status == RequestStatus::Pending)
            .collect()
    }

    /// Returns approved requests whose decision has not yet been consumed.
    #[must_use]
    pub fn queued_for_execution(&self) -> Vec<&ApprovalRequest> {
        self.requests
            .values()
            .filter(|record| record.status == RequestStatus::Approved && !record.decision_consumed)
            .collect()
    }

    /// Returns the record for a request id.
    #[must_use]
    pub fn execution_result(&self, request_id: &RequestId) -> Option<&ApprovalRequest> {
        self.requests.get(request_id)
    }

    /// Returns a mutable pending record or the matching error.
    fn pending_record(
        &mut self,
        request_id: &RequestId,
    ) -> Result<&mut ApprovalRequest, GovernanceError> {
        let record = self
            .requests
            .get_mut(request_id)
            .ok_or_else(|| GovernanceError::UnknownRequest(request_id.clone()))?;
        if record.status != RequestStatus::Pending {
            return Err(GovernanceError::InvalidState {
                request_id: request_id.clone(),
                found: record.status.as_str(),
            });
        }
        Ok(record)
    }

    /// Allocates the next request identifier.
    fn next_request_id(&mut self) -> RequestId {
        self.counter = self.counter.saturating_add(1);
        RequestId::from_counter(self.counter)
    }

    /// Records a consumption for retention bookkeeping.
    fn mark_consumed(&mut self, request_id: RequestId) {
        self.consumed_order.push_back(request_id);
    }

    /// Prunes consumed records beyond the retention cap, oldest first.
    fn prune_consumed(&mut self) {
        while self.consumed_order.len() > MAX_CONSUMED_RETAINED {
            if let Some(oldest) = self.consumed_order.pop_front() {
                self.requests.remove(&oldest);
            }
        }
    }
}
