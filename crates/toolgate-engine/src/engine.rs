// crates/toolgate-engine/src/engine.rs
// ============================================================================
// Module: Decision Engine
// Description: Stateless three-layer evaluator for incoming requests.
// Purpose: Produce allow/deny/pending decisions with composed headers.
// Dependencies: toolgate-bundle, toolgate-core, crate::{decision, governance_client, request}
// ============================================================================

//! ## Overview
//! The engine evaluates each request against the current bundle snapshot:
//! classify, extract identity, then apply the catalog, revocation, and
//! access-rule layers. Open tools allow directly; gated tools call the
//! service-governance evaluator synchronously and forward its decision.
//! Every failure path denies: malformed tokens, parse errors, a missing
//! bundle, and unreachable governance all map to deny, never allow.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use toolgate_bundle::BundleCache;
use toolgate_core::CallerIdentity;
use toolgate_core::CatalogLookup;
use toolgate_core::EvaluateRequest;
use toolgate_core::GovernanceDecision;
use toolgate_core::PolicyBundle;
use toolgate_core::QualifiedToolName;
use toolgate_core::ServiceName;
use toolgate_core::ToolTag;
use toolgate_core::rules::any_rule_grants;
use toolgate_core::rules::granted_services;

use crate::decision::Decision;
use crate::governance_client::GovernanceClient;
use crate::request::AUTHORIZATION_HEADER;
use crate::request::CheckRequest;
use crate::request::RequestClass;
use crate::request::classify;

// ============================================================================
// SECTION: Reason Strings
// ============================================================================

/// Allow reason for authenticated stream and meta calls.
const REASON_OK: &str = "ok";
/// Deny reason for authentication failures.
const REASON_UNAUTHENTICATED: &str = "missing or invalid token";
/// Deny reason for un-namespaced tool names.
const REASON_NOT_NAMESPACED: &str = "Tool name must be namespaced";
/// Deny reason for catalog misses.
const REASON_NOT_IN_CATALOG: &str = "Service/tool not in catalog";
/// Deny reason for rule misses.
const REASON_NO_RULE: &str = "User not authorized by any rule";
/// Deny reason for gated tools without a governance binding.
const REASON_NO_GOVERNANCE: &str = "Gated tool has no governance instance";
/// Deny reason when no bundle snapshot has been published.
const REASON_NO_BUNDLE: &str = "Policy bundle unavailable";
/// Deny reason when the governance evaluator cannot be reached.
const REASON_POLICY_UNREACHABLE: &str = "Policy evaluator unreachable";

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Stateless decision engine over a shared bundle cache.
///
/// # Invariants
/// - The engine holds no per-request state; decisions depend only on the
///   request and the bundle snapshot read at entry.
pub struct DecisionEngine {
    /// Bundle cache fed by the bundle builder.
    cache: Arc<BundleCache>,
    /// Governance client for the gated path.
    governance: Arc<dyn GovernanceClient>,
}

impl DecisionEngine {
    /// Creates an engine over a cache and governance client.
    #[must_use]
    pub fn new(cache: Arc<BundleCache>, governance: Arc<dyn GovernanceClient>) -> Self {
        Self {
            cache,
            governance,
        }
    }

    /// Evaluates one request to a decision.
    pub async fn check(&self, request: &CheckRequest) -> Decision {
        let class = classify(request);

        let identity = match request.header(AUTHORIZATION_HEADER) {
            Some(header) => match CallerIdentity::from_authorization_header(header) {
                Ok(identity) => identity,
                Err(_err) => return Decision::deny(401, REASON_UNAUTHENTICATED),
            },
            None => return Decision::deny(401, REASON_UNAUTHENTICATED),
        };

        // One acquire-load per request; the snapshot stays consistent for
        // the whole evaluation even if the builder publishes meanwhile.
        let bundle = self.cache.current();

        match class {
            RequestClass::StreamSetup => {
                self.allow_passthrough(&identity, bundle.as_deref(), false)
            }
            RequestClass::MetaCall {
                ref method,
            } => self.allow_passthrough(&identity, bundle.as_deref(), method == "tools/list"),
            RequestClass::ToolCall {
                name,
                arguments,
                payload,
            } => self
                .check_tool_call(request, &identity, bundle.as_deref(), &name, arguments, payload)
                .await
                .unwrap_or_else(|denied| denied),
        }
    }

    /// Allows a stream-setup or meta-call with identity headers.
    fn allow_passthrough(
        &self,
        identity: &CallerIdentity,
        bundle: Option<&PolicyBundle>,
        tools_list: bool,
    ) -> Decision {
        let mut decision = Decision::allow(REASON_OK).with_subject(&identity.subject);
        if let Some(bundle) = bundle {
            decision = decision.with_revision(bundle.revision);
        }
        if tools_list {
            // Fail closed: with no bundle the caller is granted nothing.
            let granted: Vec<ServiceName> = bundle
                .map(|bundle| {
                    granted_services(
                        &bundle.access_rules,
                        &identity.subject,
                        &identity.claims,
                        &bundle.catalog,
                    )
                    .into_iter()
                    .collect()
                })
                .unwrap_or_default();
            decision = decision.with_granted_services(&granted);
        }
        decision
    }

    /// Applies the three layers to a tool call.
    async fn check_tool_call(
        &self,
        request: &CheckRequest,
        identity: &CallerIdentity,
        bundle: Option<&PolicyBundle>,
        name: &str,
        arguments: serde_json::Value,
        payload: serde_json::Value,
    ) -> Result<Decision, Decision> {
        let qualified = QualifiedToolName::parse(name)
            .ok_or_else(|| Decision::deny(403, REASON_NOT_NAMESPACED))?;
        let bundle = bundle.ok_or_else(|| Decision::deny(503, REASON_NO_BUNDLE))?;

        match bundle.catalog.resolve(&qualified.service, &qualified.tool) {
            CatalogLookup::Found(tag) => {
                if bundle.is_revoked(&identity.subject) {
                    return Err(Decision::deny(
                        403,
                        format!("User '{}' is revoked", identity.subject),
                    ));
                }
                if !any_rule_grants(
                    &bundle.access_rules,
                    &identity.subject,
                    &identity.claims,
                    &qualified.service,
                    &qualified.tool,
                ) {
                    return Err(Decision::deny(403, REASON_NO_RULE));
                }
                match tag {
                    ToolTag::Open => Ok(Decision::allow(REASON_OK)
                        .with_subject(&identity.subject)
                        .with_service(&qualified.service)
                        .with_revision(bundle.revision)),
                    ToolTag::Gated => {
                        self.check_gated(request, identity, bundle, &qualified, arguments, payload)
                            .await
                    }
                }
            }
            CatalogLookup::UnknownService
            | CatalogLookup::ServiceDisabled
            | CatalogLookup::UnknownTool => Err(Decision::deny(403, REASON_NOT_IN_CATALOG)),
        }
    }

    /// Evaluates the gated path through service governance.
    async fn check_gated(
        &self,
        request: &CheckRequest,
        identity: &CallerIdentity,
        bundle: &PolicyBundle,
        qualified: &QualifiedToolName,
        arguments: serde_json::Value,
        payload: serde_json::Value,
    ) -> Result<Decision, Decision> {
        if bundle.governance_instance(&qualified.service).is_none() {
            return Err(Decision::deny(403, REASON_NO_GOVERNANCE));
        }
        let evaluate = EvaluateRequest {
            tool: qualified.tool.clone(),
            caller: identity.subject.clone(),
            claims: identity.claims.clone(),
            arguments,
            session_id: request.session_id(),
            payload,
        };
        let response = self
            .governance
            .evaluate(
                &bundle.governance_evaluator_url,
                &bundle.bundle_token,
                &qualified.service,
                &evaluate,
            )
            .await
            .map_err(|_err| Decision::deny(503, REASON_POLICY_UNREACHABLE))?;

        match response.decision {
            GovernanceDecision::Allow => Ok(Decision::allow(REASON_OK)
                .with_subject(&identity.subject)
                .with_service(&qualified.service)
                .with_revision(bundle.revision)),
            GovernanceDecision::Pending => match response.request_id {
                Some(request_id) => Err(Decision::pending(&request_id)),
                None => Err(Decision::deny(403, "Gated tool pending")),
            },
            GovernanceDecision::Deny => {
                let reason = response.message.unwrap_or_else(|| "denied".to_string());
                Err(Decision::deny(403, format!("Gated tool denied: {reason}")))
            }
        }
    }
}
