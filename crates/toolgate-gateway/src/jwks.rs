// crates/toolgate-gateway/src/jwks.rs
// ============================================================================
// Module: Edge JWT Verification
// Description: OIDC JWKS discovery and RS256 signature verification.
// Purpose: Validate bearer tokens at the edge before any policy evaluation.
// Dependencies: async-trait, jsonwebtoken, reqwest, serde
// ============================================================================

//! ## Overview
//! The edge verifies every bearer token's signature against the OIDC
//! issuer's JWKS, discovered through `/.well-known/openid-configuration`
//! and cached by key id. An unknown `kid` triggers one JWKS refresh before
//! the request fails. Downstream, the decision engine only decodes claims;
//! it never re-verifies. The trait seam lets server tests inject a
//! non-cryptographic verifier.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Validation;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Timeout for discovery and JWKS fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by token verification.
///
/// # Invariants
/// - Every variant maps to 401 at the edge.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Token is structurally invalid or its signature failed.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Signing key for the token's `kid` is unknown.
    #[error("unknown signing key: {0}")]
    UnknownKey(String),
    /// Issuer discovery or JWKS fetch failed.
    #[error("issuer unreachable: {0}")]
    IssuerUnreachable(String),
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Verification seam for bearer tokens.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verifies a compact JWT's signature and registered claims.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError`] when the token must be rejected.
    async fn verify(&self, token: &str) -> Result<(), VerifyError>;
}

// ============================================================================
// SECTION: JWKS Documents
// ============================================================================

/// OIDC discovery document (the single field we need).
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    /// JWKS endpoint URL.
    jwks_uri: String,
}

/// JWKS document.
#[derive(Debug, Deserialize)]
struct JwksDocument {
    /// Published signing keys.
    keys: Vec<Jwk>,
}

/// One JSON Web Key (RSA members only).
#[derive(Debug, Deserialize)]
struct Jwk {
    /// Key type.
    kty: String,
    /// Key identifier.
    kid: Option<String>,
    /// RSA modulus (base64url).
    n: Option<String>,
    /// RSA exponent (base64url).
    e: Option<String>,
}

// ============================================================================
// SECTION: JWKS Verifier
// ============================================================================

/// RS256 verifier backed by the issuer's JWKS.
///
/// # Invariants
/// - Keys are cached by `kid`; a cache miss refreshes once per request.
pub struct JwksVerifier {
    /// Issuer base URL without a trailing slash.
    issuer_url: String,
    /// HTTP client for discovery and JWKS fetches.
    client: reqwest::Client,
    /// Cached decoding keys by `kid`.
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl JwksVerifier {
    /// Creates a verifier for the given issuer.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::IssuerUnreachable`] when the HTTP client
    /// cannot be built.
    pub fn new(issuer_url: impl Into<String>) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|err| VerifyError::IssuerUnreachable(err.to_string()))?;
        Ok(Self {
            issuer_url: issuer_url.into().trim_end_matches('/').to_string(),
            client,
            keys: RwLock::new(HashMap::new()),
        })
    }

    /// Fetches the JWKS and replaces the key cache.
    async fn refresh_keys(&self) -> Result<(), VerifyError> {
        let discovery_url = format!("{}/.well-known/openid-configuration", self.issuer_url);
        let discovery: DiscoveryDocument = self
            .client
            .get(discovery_url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|err| VerifyError::IssuerUnreachable(err.to_string()))?
            .json()
            .await
            .map_err(|err| VerifyError::IssuerUnreachable(err.to_string()))?;
        let jwks: JwksDocument = self
            .client
            .get(discovery.jwks_uri)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|err| VerifyError::IssuerUnreachable(err.to_string()))?
            .json()
            .await
            .map_err(|err| VerifyError::IssuerUnreachable(err.to_string()))?;

        let mut fresh = HashMap::new();
        for key in jwks.keys {
            if key.kty != "RSA" {
                continue;
            }
            let (Some(kid), Some(n), Some(e)) = (key.kid, key.n, key.e) else {
                continue;
            };
            if let Ok(decoding) = DecodingKey::from_rsa_components(&n, &e) {
                fresh.insert(kid, decoding);
            }
        }
        if let Ok(mut keys) = self.keys.write() {
            *keys = fresh;
        }
        Ok(())
    }

    /// Returns the cached key for a `kid`.
    fn cached_key(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.read().ok().and_then(|keys| keys.get(kid).cloned())
    }

    /// Builds the validation rules for this issuer.
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.issuer_url.clone()]);
        validation.validate_aud = false;
        validation
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<(), VerifyError> {
        let header =
            decode_header(token).map_err(|err| VerifyError::InvalidToken(err.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| VerifyError::InvalidToken("token has no kid".to_string()))?;

        let key = match self.cached_key(&kid) {
            Some(key) => key,
            None => {
                self.refresh_keys().await?;
                self.cached_key(&kid).ok_or_else(|| VerifyError::UnknownKey(kid.clone()))?
            }
        };
        decode::<serde_json::Value>(token, &key, &self.validation())
            .map(|_claims| ())
            .map_err(|err| VerifyError::InvalidToken(err.to_string()))
    }
}
