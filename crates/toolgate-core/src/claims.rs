// crates/toolgate-core/src/claims.rs
// ============================================================================
// Module: Toolgate Caller Claims
// Description: JWT claim decoding and canonical subject resolution.
// Purpose: Provide the caller identity model consumed by the policy layers.
// Dependencies: base64, serde, serde_json
// ============================================================================

//! ## Overview
//! The decision engine receives a bearer JWT whose signature has already been
//! validated at the edge. This module decodes the payload segment (base64url,
//! no padding) into a claim set and resolves the canonical subject identity
//! as `email ?? preferred_username ?? sub`. Claim values are kept as raw JSON
//! so array-valued claims can participate in rule matching.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::identifiers::SubjectId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Claim keys consulted for subject resolution, in priority order.
const SUBJECT_CLAIM_KEYS: &[&str] = &["email", "preferred_username", "sub"];

/// Upper bound on accepted authorization header size.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while decoding caller claims.
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// Authorization header is missing or malformed.
    #[error("invalid authorization header: {0}")]
    InvalidHeader(String),
    /// Token is not a structurally valid JWT.
    #[error("malformed token: {0}")]
    MalformedToken(String),
    /// Payload decoded but no subject claim was present.
    #[error("token carries no resolvable subject")]
    MissingSubject,
}

// ============================================================================
// SECTION: Claim Set
// ============================================================================

/// Decoded JWT claims for one caller.
///
/// # Invariants
/// - Values are stored verbatim; no claim is interpreted except during
///   subject resolution and rule matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, Value>);

impl ClaimSet {
    /// Creates a claim set from a raw claim map.
    #[must_use]
    pub const fn new(claims: BTreeMap<String, Value>) -> Self {
        Self(claims)
    }

    /// Returns the raw value for a claim key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the claim value as a string slice when it is a JSON string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(Value::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns true when a required claim value is satisfied.
    ///
    /// String claims match by equality; array claims match when the expected
    /// value is an element. All other claim shapes never match.
    #[must_use]
    pub fn satisfies(&self, key: &str, expected: &str) -> bool {
        match self.0.get(key) {
            Some(Value::String(actual)) => actual == expected,
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| matches!(item, Value::String(actual) if actual == expected)),
            _ => false,
        }
    }

    /// Resolves the canonical subject identity for this claim set.
    ///
    /// Consults `email`, `preferred_username`, and `sub` in that order and
    /// returns the first string-valued claim.
    #[must_use]
    pub fn subject(&self) -> Option<SubjectId> {
        SUBJECT_CLAIM_KEYS
            .iter()
            .find_map(|key| self.get_str(key))
            .map(SubjectId::new)
    }

    /// Returns an iterator over all claims.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, Value>> for ClaimSet {
    fn from(claims: BTreeMap<String, Value>) -> Self {
        Self(claims)
    }
}

// ============================================================================
// SECTION: Caller Identity
// ============================================================================

/// Authenticated caller identity paired with its decoded claims.
///
/// # Invariants
/// - `subject` is the canonical identity resolved from `claims`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Canonical subject identifier.
    pub subject: SubjectId,
    /// Full decoded claim set.
    pub claims: ClaimSet,
}

impl CallerIdentity {
    /// Resolves a caller identity from an `Authorization` header value.
    ///
    /// The signature is trusted to have been validated at the edge; only the
    /// payload segment is decoded here.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError`] when the header, token, or subject is invalid.
    pub fn from_authorization_header(header: &str) -> Result<Self, ClaimsError> {
        let token = parse_bearer_token(header)?;
        Self::from_token(token)
    }

    /// Resolves a caller identity from a compact JWT.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError`] when the token or subject is invalid.
    pub fn from_token(token: &str) -> Result<Self, ClaimsError> {
        let claims = decode_payload_claims(token)?;
        let subject = claims.subject().ok_or(ClaimsError::MissingSubject)?;
        Ok(Self {
            subject,
            claims,
        })
    }
}

// ============================================================================
// SECTION: Decoding Helpers
// ============================================================================

/// Extracts the bearer token from an `Authorization` header value.
///
/// # Errors
///
/// Returns [`ClaimsError::InvalidHeader`] when the scheme or token is absent.
pub fn parse_bearer_token(header: &str) -> Result<&str, ClaimsError> {
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(ClaimsError::InvalidHeader("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(ClaimsError::InvalidHeader("expected bearer scheme".to_string()));
    }
    Ok(token)
}

/// Decodes the payload segment of a compact JWT into a claim set.
///
/// # Errors
///
/// Returns [`ClaimsError::MalformedToken`] on structural or encoding errors.
pub fn decode_payload_claims(token: &str) -> Result<ClaimSet, ClaimsError> {
    let mut segments = token.split('.');
    let _header = segments
        .next()
        .ok_or_else(|| ClaimsError::MalformedToken("missing header segment".to_string()))?;
    let payload = segments
        .next()
        .ok_or_else(|| ClaimsError::MalformedToken("missing payload segment".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|err| ClaimsError::MalformedToken(format!("payload base64: {err}")))?;
    let claims: BTreeMap<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|err| ClaimsError::MalformedToken(format!("payload json: {err}")))?;
    Ok(ClaimSet::new(claims))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
