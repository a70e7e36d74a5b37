// crates/toolgate-core/src/lib.rs
// ============================================================================
// Module: Toolgate Core Library
// Description: Public API surface for the Toolgate core.
// Purpose: Expose the policy data model shared by all Toolgate components.
// Dependencies: crate::{bundle, catalog, claims, digest, governance_api, identifiers, rules, time}
// ============================================================================

//! ## Overview
//! Toolgate core provides the policy data model shared by the control plane,
//! bundle builder, decision engine, and aggregator: identifiers, the service
//! catalog, access rules, bundle snapshots, caller claims, governance
//! contracts, and argument digests. It is transport-agnostic; HTTP surfaces
//! live in the server crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bundle;
pub mod catalog;
pub mod claims;
pub mod digest;
pub mod governance_api;
pub mod identifiers;
pub mod rules;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bundle::BundleData;
pub use bundle::PolicyBundle;
pub use catalog::Catalog;
pub use catalog::CatalogError;
pub use catalog::CatalogLookup;
pub use catalog::ServiceEntry;
pub use catalog::ToolEntry;
pub use catalog::ToolTag;
pub use claims::CallerIdentity;
pub use claims::ClaimSet;
pub use claims::ClaimsError;
pub use digest::ArgumentsDigest;
pub use digest::DigestError;
pub use digest::token_fingerprint;
pub use governance_api::ApprovalRequest;
pub use governance_api::EvaluateRequest;
pub use governance_api::EvaluateResponse;
pub use governance_api::GovernanceDecision;
pub use governance_api::RequestStatus;
pub use governance_api::ResolveRequest;
pub use identifiers::GovernanceId;
pub use identifiers::QualifiedToolName;
pub use identifiers::RequestId;
pub use identifiers::Revision;
pub use identifiers::RuleId;
pub use identifiers::ServiceName;
pub use identifiers::SessionId;
pub use identifiers::SubjectId;
pub use identifiers::ToolName;
pub use rules::AccessGrant;
pub use rules::AccessRule;
pub use rules::RuleError;
pub use rules::RuleMatcher;
pub use time::Timestamp;
