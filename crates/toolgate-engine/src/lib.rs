// crates/toolgate-engine/src/lib.rs
// ============================================================================
// Module: Toolgate Engine Library
// Description: Public API surface for the decision engine.
// Purpose: Expose the evaluator, decision model, and governance client seam.
// Dependencies: crate::{decision, engine, governance_client, request}
// ============================================================================

//! ## Overview
//! The decision engine consumes a full request (bearer JWT, JSON-RPC body)
//! and returns an allow/deny/pending decision plus headers, fed by the
//! in-memory bundle snapshot refreshed from the control plane. All defaults
//! deny.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod decision;
pub mod engine;
pub mod governance_client;
pub mod request;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use decision::Decision;
pub use decision::HEADER_AUTHZ_REASON;
pub use decision::HEADER_BUNDLE_REVISION;
pub use decision::HEADER_GRANTED_SERVICES;
pub use decision::HEADER_MCP_SERVICE;
pub use decision::HEADER_REQUEST_ID;
pub use decision::HEADER_RETRY_AFTER;
pub use decision::HEADER_USER_ID;
pub use engine::DecisionEngine;
pub use governance_client::GovernanceClient;
pub use governance_client::GovernanceClientError;
pub use governance_client::HttpGovernanceClient;
pub use request::CheckRequest;
pub use request::RequestClass;
pub use request::classify;
