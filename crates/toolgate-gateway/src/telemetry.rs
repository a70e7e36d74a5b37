// crates/toolgate-gateway/src/telemetry.rs
// ============================================================================
// Module: Gateway Telemetry
// Description: Observability hooks for edge decisions and routing.
// Purpose: Provide metric events and latency buckets without hard deps.
// Dependencies: toolgate-core
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for decision counters and
//! request latencies. It is intentionally dependency-light so deployments
//! can plug in Prometheus or OpenTelemetry without redesign. Labels must
//! never carry tokens or raw claims.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use toolgate_core::Revision;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for edge request histograms.
pub const EDGE_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Edge request classification for metric labels.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeRequestKind {
    /// SSE stream establishment.
    StreamSetup,
    /// JSON-RPC meta call.
    MetaCall,
    /// JSON-RPC tool call.
    ToolCall,
    /// Session teardown.
    Teardown,
}

impl EdgeRequestKind {
    /// Returns a stable label for the request kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StreamSetup => "stream_setup",
            Self::MetaCall => "meta_call",
            Self::ToolCall => "tool_call",
            Self::Teardown => "teardown",
        }
    }
}

/// Edge decision metric event payload.
///
/// # Invariants
/// - Optional fields are `None` when the metadata is unavailable.
#[derive(Debug, Clone)]
pub struct DecisionMetricEvent {
    /// Request classification.
    pub kind: EdgeRequestKind,
    /// Whether the decision allowed the request.
    pub allowed: bool,
    /// HTTP status surfaced to the client.
    pub status: u16,
    /// Stable decision reason.
    pub reason: String,
    /// Bundle revision the decision used, when bootstrapped.
    pub revision: Option<Revision>,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for edge decisions and latencies.
pub trait GatewayMetrics: Send + Sync {
    /// Records a decision counter event.
    fn record_decision(&self, event: &DecisionMetricEvent);
    /// Records a latency observation for the request.
    fn record_latency(&self, event: &DecisionMetricEvent, latency: Duration);
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl GatewayMetrics for NoopMetrics {
    fn record_decision(&self, _event: &DecisionMetricEvent) {}

    fn record_latency(&self, _event: &DecisionMetricEvent, _latency: Duration) {}
}
