// crates/toolgate-engine/src/governance_client.rs
// ============================================================================
// Module: Governance Client
// Description: HTTP client seam for gated-path governance evaluations.
// Purpose: Let the engine call governance synchronously and fail closed.
// Dependencies: async-trait, reqwest, toolgate-core
// ============================================================================

//! ## Overview
//! The gated path calls the governance evaluator over HTTP with a small
//! connection pool and a per-call timeout. Responses are never cached; each
//! call is authoritative. The trait seam lets decision-engine tests inject a
//! fake client.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use toolgate_core::EvaluateRequest;
use toolgate_core::EvaluateResponse;
use toolgate_core::ServiceName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Idle connections kept per governance host.
const POOL_MAX_IDLE_PER_HOST: usize = 8;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by governance evaluations.
///
/// # Invariants
/// - Every variant maps to deny at the decision engine (fail closed).
#[derive(Debug, Error)]
pub enum GovernanceClientError {
    /// Client construction failed.
    #[error("governance client build failed: {0}")]
    Build(String),
    /// Evaluator was unreachable or timed out.
    #[error("governance evaluator unreachable: {0}")]
    Unreachable(String),
    /// Evaluator answered with an unexpected status.
    #[error("governance evaluator returned status {0}")]
    Status(u16),
    /// Response payload failed to decode.
    #[error("governance response decode failed: {0}")]
    Decode(String),
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Client seam for governance evaluations.
#[async_trait]
pub trait GovernanceClient: Send + Sync {
    /// Evaluates a gated tool call against the service's instance.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceClientError`] when the call fails; the engine
    /// maps every error to deny.
    async fn evaluate(
        &self,
        evaluator_url: &str,
        bundle_token: &str,
        service: &ServiceName,
        request: &EvaluateRequest,
    ) -> Result<EvaluateResponse, GovernanceClientError>;
}

// ============================================================================
// SECTION: HTTP Implementation
// ============================================================================

/// HTTP governance client with a pooled connection and per-call timeout.
pub struct HttpGovernanceClient {
    /// Shared HTTP client.
    client: Client,
    /// Per-call timeout.
    timeout: Duration,
}

impl HttpGovernanceClient {
    /// Creates a governance client with the given per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceClientError::Build`] when the HTTP client cannot
    /// be built.
    pub fn new(timeout: Duration) -> Result<Self, GovernanceClientError> {
        let client = Client::builder()
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .connect_timeout(timeout)
            .build()
            .map_err(|err| GovernanceClientError::Build(err.to_string()))?;
        Ok(Self {
            client,
            timeout,
        })
    }
}

#[async_trait]
impl GovernanceClient for HttpGovernanceClient {
    async fn evaluate(
        &self,
        evaluator_url: &str,
        bundle_token: &str,
        service: &ServiceName,
        request: &EvaluateRequest,
    ) -> Result<EvaluateResponse, GovernanceClientError> {
        let url = format!(
            "{}/governance/{}/evaluate",
            evaluator_url.trim_end_matches('/'),
            service
        );
        let response = self
            .client
            .post(url)
            .bearer_auth(bundle_token)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|err| GovernanceClientError::Unreachable(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GovernanceClientError::Status(status.as_u16()));
        }
        response
            .json()
            .await
            .map_err(|err| GovernanceClientError::Decode(err.to_string()))
    }
}
