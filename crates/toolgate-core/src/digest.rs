// crates/toolgate-core/src/digest.rs
// ============================================================================
// Module: Toolgate Digests
// Description: Argument digests for retry detection and token fingerprints.
// Purpose: Make identical gated calls collide and keep tokens out of logs.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! Gated-call retry detection hinges on one value: the digest of a tool
//! call's `arguments`. Arguments are canonicalized with RFC 8785 (JCS)
//! before hashing so two clients sending the same object with different
//! member order or whitespace produce the same digest. The other hashing
//! consumer is audit: bearer tokens are logged only as SHA-256
//! fingerprints, never raw.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while digesting call arguments.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Arguments could not be canonicalized to RFC 8785 JSON.
    #[error("arguments are not canonicalizable: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Arguments Digest
// ============================================================================

/// Retry-detection digest of a tool call's `arguments`.
///
/// # Invariants
/// - Equal digests mean canonically equal arguments; member order and
///   whitespace never fork the value.
/// - Wire form is the lowercase hex SHA-256 of the RFC 8785 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentsDigest(String);

impl ArgumentsDigest {
    /// Digests a tool call's arguments.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::Canonicalization`] when the arguments cannot
    /// be serialized as canonical JSON.
    pub fn of(arguments: &Value) -> Result<Self, DigestError> {
        let canonical = serde_jcs::to_vec(arguments)
            .map_err(|err| DigestError::Canonicalization(err.to_string()))?;
        Ok(Self(sha256_hex(&canonical)))
    }

    /// Returns the digest as its lowercase hex wire form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArgumentsDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Token Fingerprints
// ============================================================================

/// Fingerprints a bearer token for audit labeling.
///
/// The fingerprint is the lowercase hex SHA-256 of the token bytes; audit
/// events carry it in place of the token itself.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    sha256_hex(token.as_bytes())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Hashes bytes with SHA-256 and renders the lowercase hex form.
fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().fold(String::with_capacity(64), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
