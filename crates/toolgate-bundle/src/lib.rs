// crates/toolgate-bundle/src/lib.rs
// ============================================================================
// Module: Toolgate Bundle Library
// Description: Public API surface for the bundle builder.
// Purpose: Expose the bundle cache, control-plane client, and rebuild loop.
// Dependencies: crate::{builder, cache, client, sse}
// ============================================================================

//! ## Overview
//! The bundle builder keeps decision engines supplied with immutable policy
//! snapshots: a bootstrap fetch, a debounced change-stream subscription with
//! reconnect and full resync, and an atomic-pointer cache for lock-free
//! reads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod builder;
pub mod cache;
pub mod client;
pub mod sse;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use builder::BundleBuilder;
pub use builder::Shutdown;
pub use builder::ShutdownHandle;
pub use cache::BundleCache;
pub use client::ClientError;
pub use client::ControlPlaneClient;
pub use client::EventStream;
pub use sse::SseEvent;
pub use sse::SseParser;
