// crates/toolgate-gateway/src/lib.rs
// ============================================================================
// Module: Toolgate Gateway Library
// Description: Public API surface for the edge gateway.
// Purpose: Expose the edge server, JWT verification, and subject throttling.
// Dependencies: crate::{audit, jwks, limits, server, telemetry}
// ============================================================================

//! ## Overview
//! The edge gateway terminates agent traffic: JWKS-backed JWT verification,
//! optional per-subject throttling, the decision engine's three
//! authorization layers, and the MCP aggregator, plus liveness and OAuth
//! discovery endpoints.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod jwks;
pub mod limits;
pub mod server;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuthzAuditEvent;
pub use audit::AuthzAuditSink;
pub use audit::NoopAuthzAuditSink;
pub use audit::StderrAuthzAuditSink;
pub use jwks::JwksVerifier;
pub use jwks::TokenVerifier;
pub use jwks::VerifyError;
pub use limits::SubjectThrottle;
pub use limits::ThrottleVerdict;
pub use server::GatewayServerError;
pub use server::GatewayState;
pub use server::router;
pub use server::serve;
pub use telemetry::DecisionMetricEvent;
pub use telemetry::EdgeRequestKind;
pub use telemetry::GatewayMetrics;
pub use telemetry::NoopMetrics;
