// crates/toolgate-control/src/auth.rs
// ============================================================================
// Module: Control-Plane Authn/Authz
// Description: Bearer-token role enforcement for control-plane operations.
// Purpose: Provide strict, fail-closed capability checks per operation.
// Dependencies: toolgate-config, toolgate-core
// ============================================================================

//! ## Overview
//! Every control-plane route requires a bearer token. Admin mutations and
//! governance resolutions require an admin token; `getBundleData`, the
//! change stream, and `evaluate` require a gateway-role token. Decisions are
//! fail-closed and audited with SHA-256 token fingerprints; raw tokens never
//! leave this module.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use thiserror::Error;
use toolgate_config::ControlPlaneConfig;
use toolgate_core::digest::token_fingerprint;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on accepted authorization header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Capability role required by a control-plane operation.
///
/// # Invariants
/// - Roles are disjoint; a token grants exactly the roles it is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Admin mutations and governance resolutions.
    Admin,
    /// Bundle reads, change-stream subscription, and evaluate.
    Gateway,
}

impl Role {
    /// Returns a stable label for audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Gateway => "gateway",
        }
    }
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Authenticated control-plane caller context.
///
/// # Invariants
/// - `token_fingerprint` is a SHA-256 hex digest, never the raw token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Role the caller authenticated under.
    pub role: Role,
    /// Token fingerprint for audit correlation.
    pub token_fingerprint: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication or authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or invalid authentication.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Caller is authenticated but lacks the required role.
    #[error("unauthorized: {0} role required")]
    Unauthorized(&'static str),
}

// ============================================================================
// SECTION: Authorizer
// ============================================================================

/// Bearer-token authorizer derived from control-plane configuration.
///
/// # Invariants
/// - Token sets are immutable after construction.
pub struct ControlAuthorizer {
    /// Tokens granting the admin role.
    admin_tokens: BTreeSet<String>,
    /// Tokens granting the gateway role.
    gateway_tokens: BTreeSet<String>,
}

impl ControlAuthorizer {
    /// Builds an authorizer from control-plane configuration.
    #[must_use]
    pub fn from_config(config: &ControlPlaneConfig) -> Self {
        Self {
            admin_tokens: config.admin_tokens.iter().cloned().collect(),
            gateway_tokens: config.gateway_tokens.iter().cloned().collect(),
        }
    }

    /// Authorizes a request for the required role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the token is missing, unknown, or lacks
    /// the role.
    pub fn authorize(
        &self,
        auth_header: Option<&str>,
        role: Role,
    ) -> Result<AuthContext, AuthError> {
        let token = parse_bearer_token(auth_header)?;
        let granted = match role {
            Role::Admin => self.admin_tokens.contains(token),
            Role::Gateway => self.gateway_tokens.contains(token),
        };
        if !granted {
            let known =
                self.admin_tokens.contains(token) || self.gateway_tokens.contains(token);
            if known {
                return Err(AuthError::Unauthorized(role.as_str()));
            }
            return Err(AuthError::Unauthenticated("unknown bearer token".to_string()));
        }
        Ok(AuthContext {
            role,
            token_fingerprint: token_fingerprint(token),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the bearer token from an `Authorization` header value.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<&str, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header".to_string()));
    }
    Ok(token)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use toolgate_config::ControlPlaneConfig;

    use super::AuthError;
    use super::ControlAuthorizer;
    use super::Role;

    fn authorizer() -> ControlAuthorizer {
        ControlAuthorizer::from_config(&ControlPlaneConfig {
            listen: "127.0.0.1:9000".parse().unwrap(),
            admin_tokens: vec!["admin-secret".to_string()],
            gateway_tokens: vec!["gw-secret".to_string()],
            governance_url: "http://npl:12000".to_string(),
            bundle_token: "opaque".to_string(),
            max_body_bytes: 1024,
        })
    }

    #[test]
    fn admin_token_grants_admin() {
        let auth = authorizer().authorize(Some("Bearer admin-secret"), Role::Admin).unwrap();
        assert_eq!(auth.role, Role::Admin);
        assert_ne!(auth.token_fingerprint, "admin-secret");
    }

    #[test]
    fn roles_are_disjoint() {
        let err = authorizer().authorize(Some("Bearer gw-secret"), Role::Admin).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized("admin")));
        let err = authorizer().authorize(Some("Bearer admin-secret"), Role::Gateway).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized("gateway")));
    }

    #[test]
    fn unknown_token_is_unauthenticated() {
        let err = authorizer().authorize(Some("Bearer nope"), Role::Admin).unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
        let err = authorizer().authorize(None, Role::Gateway).unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated(_)));
    }
}
