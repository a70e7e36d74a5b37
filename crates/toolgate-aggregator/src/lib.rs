// crates/toolgate-aggregator/src/lib.rs
// ============================================================================
// Module: Toolgate Aggregator Library
// Description: Public API surface for the MCP aggregator.
// Purpose: Expose the session router, transport seam, and merge helpers.
// Dependencies: crate::{aggregator, merge, rpc, session, transport}
// ============================================================================

//! ## Overview
//! The aggregator is a stateful session router between the edge and backend
//! MCP servers: `initialize` fan-out with capability unions, namespaced
//! `tools/list`, per-service `tools/call` routing, and SSE multiplexing
//! support via per-backend byte sources.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod aggregator;
pub mod merge;
pub mod rpc;
pub mod session;
pub mod transport;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregator::Aggregator;
pub use aggregator::BackendEndpoint;
pub use aggregator::McpResponse;
pub use merge::merge_initialize_result;
pub use merge::prefix_tools;
pub use rpc::INTERNAL_ERROR;
pub use rpc::INVALID_PARAMS;
pub use rpc::decode_backend_payload;
pub use rpc::error_response;
pub use rpc::request_id;
pub use rpc::result_response;
pub use session::BackendSession;
pub use session::Session;
pub use session::SessionStore;
pub use transport::BackendError;
pub use transport::BackendReply;
pub use transport::BackendTransport;
pub use transport::ByteSource;
pub use transport::HttpBackendTransport;
pub use transport::MCP_SESSION_HEADER;
