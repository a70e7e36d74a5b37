// crates/toolgate-config/src/config.rs
// ============================================================================
// Module: Toolgate Configuration
// Description: Environment-driven configuration for gateway and control plane.
// Purpose: Provide strict, fail-fast config parsing with validated defaults.
// Dependencies: toolgate-core, serde, url
// ============================================================================

//! ## Overview
//! Toolgate services take a minimal environment: listen addresses, the
//! control-plane URL, the OIDC issuer, bearer tokens, and the backend
//! service list formatted `name=url,name=url`. Missing or invalid
//! configuration fails closed at startup (non-zero exit). Optional knobs
//! (timeouts, limits, keepalive) carry validated defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use toolgate_core::ServiceName;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment prefix shared by all Toolgate variables.
pub const ENV_PREFIX: &str = "TOOLGATE_";

/// Maximum accepted bearer token length.
const MAX_TOKEN_LENGTH: usize = 4096;
/// Maximum number of configured backends.
const MAX_BACKENDS: usize = 256;
/// Default governance evaluate timeout.
const DEFAULT_GOVERNANCE_TIMEOUT_MS: u64 = 5_000;
/// Default backend initialize timeout.
const DEFAULT_INITIALIZE_TIMEOUT_MS: u64 = 10_000;
/// Default backend tool-call timeout.
const DEFAULT_TOOL_CALL_TIMEOUT_MS: u64 = 30_000;
/// Default bundle fetch timeout.
const DEFAULT_BUNDLE_FETCH_TIMEOUT_MS: u64 = 10_000;
/// Default SSE keepalive interval.
const DEFAULT_SSE_KEEPALIVE_SECS: u64 = 30;
/// Default rebuild debounce window.
const DEFAULT_DEBOUNCE_MS: u64 = 100;
/// Default maximum request body size.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading configuration.
///
/// # Invariants
/// - Every variant names the offending variable for operator diagnosis.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required environment variable is absent.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    /// Environment variable carries an invalid value.
    #[error("invalid {variable}: {message}")]
    Invalid {
        /// Variable name.
        variable: &'static str,
        /// Failure description.
        message: String,
    },
}

impl ConfigError {
    fn invalid(variable: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            variable,
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Environment Source
// ============================================================================

/// Environment lookup seam so tests can inject variables.
pub trait EnvSource {
    /// Returns the value of a variable when set and valid UTF-8.
    fn get(&self, key: &str) -> Option<String>;
}

/// Process environment source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        Self::get(self, key).cloned()
    }
}

// ============================================================================
// SECTION: Shared Pieces
// ============================================================================

/// Outbound timeout settings.
///
/// # Invariants
/// - All values are non-zero after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Governance evaluate timeout in milliseconds.
    pub governance_ms: u64,
    /// Backend initialize timeout in milliseconds.
    pub initialize_ms: u64,
    /// Backend tool-call timeout in milliseconds.
    pub tool_call_ms: u64,
    /// Bundle fetch timeout in milliseconds.
    pub bundle_fetch_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            governance_ms: DEFAULT_GOVERNANCE_TIMEOUT_MS,
            initialize_ms: DEFAULT_INITIALIZE_TIMEOUT_MS,
            tool_call_ms: DEFAULT_TOOL_CALL_TIMEOUT_MS,
            bundle_fetch_ms: DEFAULT_BUNDLE_FETCH_TIMEOUT_MS,
        }
    }
}

impl TimeoutConfig {
    /// Governance evaluate timeout.
    #[must_use]
    pub const fn governance(&self) -> Duration {
        Duration::from_millis(self.governance_ms)
    }

    /// Backend initialize timeout.
    #[must_use]
    pub const fn initialize(&self) -> Duration {
        Duration::from_millis(self.initialize_ms)
    }

    /// Backend tool-call timeout.
    #[must_use]
    pub const fn tool_call(&self) -> Duration {
        Duration::from_millis(self.tool_call_ms)
    }

    /// Bundle fetch timeout.
    #[must_use]
    pub const fn bundle_fetch(&self) -> Duration {
        Duration::from_millis(self.bundle_fetch_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let pairs = [
            ("TOOLGATE_GOVERNANCE_TIMEOUT_MS", self.governance_ms),
            ("TOOLGATE_INITIALIZE_TIMEOUT_MS", self.initialize_ms),
            ("TOOLGATE_TOOL_CALL_TIMEOUT_MS", self.tool_call_ms),
            ("TOOLGATE_BUNDLE_FETCH_TIMEOUT_MS", self.bundle_fetch_ms),
        ];
        for (variable, value) in pairs {
            if value == 0 {
                return Err(ConfigError::invalid(variable, "timeout must be non-zero"));
            }
        }
        Ok(())
    }
}

/// One configured MCP backend.
///
/// # Invariants
/// - `url` is an absolute http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Service name used for tool prefixes and catalog lookups.
    pub name: ServiceName,
    /// Base URL of the backend MCP endpoint.
    pub url: String,
}

/// Fixed-window rate limit settings (absent means disabled).
///
/// # Invariants
/// - All values are non-zero after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window per subject.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Maximum tracked subjects before the throttle sheds load.
    pub max_entries: usize,
}

impl RateLimitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::invalid(
                "TOOLGATE_RATE_LIMIT_MAX_REQUESTS",
                "rate limit must be non-zero",
            ));
        }
        if self.window_ms == 0 {
            return Err(ConfigError::invalid(
                "TOOLGATE_RATE_LIMIT_WINDOW_MS",
                "rate limit window must be non-zero",
            ));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::invalid(
                "TOOLGATE_RATE_LIMIT_MAX_ENTRIES",
                "rate limit capacity must be non-zero",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Gateway Configuration
// ============================================================================

/// Configuration for the edge gateway process.
///
/// # Invariants
/// - Validated before use; every URL parses and every list is bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Listen address for the edge HTTP server.
    pub listen: SocketAddr,
    /// Control-plane base URL.
    pub control_plane_url: String,
    /// OIDC issuer base URL.
    pub oidc_issuer_url: String,
    /// Backend MCP services.
    pub backends: Vec<BackendConfig>,
    /// Gateway-role bearer token for the control plane.
    pub gateway_token: String,
    /// Governance evaluator URL stamped into bundle snapshots.
    ///
    /// Defaults to the control-plane URL, which hosts governance in the
    /// standard deployment.
    pub governance_url: String,
    /// Opaque token stamped into bundle snapshots.
    ///
    /// Defaults to the gateway token.
    pub bundle_token: String,
    /// Outbound timeout settings.
    pub timeouts: TimeoutConfig,
    /// SSE keepalive interval in seconds.
    pub sse_keepalive_secs: u64,
    /// Change-stream rebuild debounce window in milliseconds.
    pub debounce_ms: u64,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Per-subject rate limit; absent disables limiting.
    pub rate_limit: Option<RateLimitConfig>,
}

impl GatewayConfig {
    /// Loads gateway configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// Loads gateway configuration from an environment source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or invalid.
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let control_plane_url = require_url(env, "TOOLGATE_CONTROL_PLANE_URL")?;
        let gateway_token = require_token(env, "TOOLGATE_GATEWAY_TOKEN")?;
        let governance_url = match env.get("TOOLGATE_GOVERNANCE_URL") {
            Some(_) => require_url(env, "TOOLGATE_GOVERNANCE_URL")?,
            None => control_plane_url.clone(),
        };
        let bundle_token = match env.get("TOOLGATE_BUNDLE_TOKEN") {
            Some(_) => require_token(env, "TOOLGATE_BUNDLE_TOKEN")?,
            None => gateway_token.clone(),
        };
        let config = Self {
            listen: parse_listen(env, "TOOLGATE_GATEWAY_LISTEN")?,
            control_plane_url,
            oidc_issuer_url: require_url(env, "TOOLGATE_OIDC_ISSUER_URL")?,
            backends: parse_backends(env, "TOOLGATE_BACKENDS")?,
            gateway_token,
            governance_url,
            bundle_token,
            timeouts: parse_timeouts(env)?,
            sse_keepalive_secs: parse_u64(
                env,
                "TOOLGATE_SSE_KEEPALIVE_SECS",
                DEFAULT_SSE_KEEPALIVE_SECS,
            )?,
            debounce_ms: parse_u64(env, "TOOLGATE_DEBOUNCE_MS", DEFAULT_DEBOUNCE_MS)?,
            max_body_bytes: parse_usize(
                env,
                "TOOLGATE_MAX_BODY_BYTES",
                DEFAULT_MAX_BODY_BYTES,
            )?,
            rate_limit: parse_rate_limit(env)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeouts.validate()?;
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.validate()?;
        }
        if self.backends.is_empty() {
            return Err(ConfigError::invalid(
                "TOOLGATE_BACKENDS",
                "at least one backend is required",
            ));
        }
        if self.sse_keepalive_secs == 0 {
            return Err(ConfigError::invalid(
                "TOOLGATE_SSE_KEEPALIVE_SECS",
                "keepalive must be non-zero",
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::invalid(
                "TOOLGATE_MAX_BODY_BYTES",
                "body limit must be non-zero",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Control-Plane Configuration
// ============================================================================

/// Configuration for the control-plane process.
///
/// # Invariants
/// - Validated before use; token lists are non-empty and bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneConfig {
    /// Listen address for the control-plane HTTP server.
    pub listen: SocketAddr,
    /// Admin bearer tokens.
    pub admin_tokens: Vec<String>,
    /// Gateway-role bearer tokens.
    pub gateway_tokens: Vec<String>,
    /// Governance evaluator URL advertised in bundle snapshots.
    pub governance_url: String,
    /// Opaque token attached to bundle snapshots.
    pub bundle_token: String,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl ControlPlaneConfig {
    /// Loads control-plane configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(&ProcessEnv)
    }

    /// Loads control-plane configuration from an environment source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or invalid.
    pub fn from_source(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let config = Self {
            listen: parse_listen(env, "TOOLGATE_CONTROL_LISTEN")?,
            admin_tokens: parse_tokens(env, "TOOLGATE_ADMIN_TOKENS")?,
            gateway_tokens: parse_tokens(env, "TOOLGATE_GATEWAY_TOKENS")?,
            governance_url: require_url(env, "TOOLGATE_GOVERNANCE_URL")?,
            bundle_token: require_token(env, "TOOLGATE_BUNDLE_TOKEN")?,
            max_body_bytes: parse_usize(
                env,
                "TOOLGATE_MAX_BODY_BYTES",
                DEFAULT_MAX_BODY_BYTES,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_tokens.is_empty() {
            return Err(ConfigError::invalid(
                "TOOLGATE_ADMIN_TOKENS",
                "at least one admin token is required",
            ));
        }
        if self.gateway_tokens.is_empty() {
            return Err(ConfigError::invalid(
                "TOOLGATE_GATEWAY_TOKENS",
                "at least one gateway token is required",
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::invalid(
                "TOOLGATE_MAX_BODY_BYTES",
                "body limit must be non-zero",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

/// Requires and parses a listen address.
fn parse_listen(env: &impl EnvSource, variable: &'static str) -> Result<SocketAddr, ConfigError> {
    let raw = env.get(variable).ok_or(ConfigError::Missing(variable))?;
    raw.parse().map_err(|_| ConfigError::invalid(variable, format!("invalid address: {raw}")))
}

/// Requires an absolute http(s) URL and returns it without a trailing slash.
fn require_url(env: &impl EnvSource, variable: &'static str) -> Result<String, ConfigError> {
    let raw = env.get(variable).ok_or(ConfigError::Missing(variable))?;
    let parsed =
        Url::parse(&raw).map_err(|err| ConfigError::invalid(variable, err.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ConfigError::invalid(variable, format!("unsupported scheme: {other}")));
        }
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Requires a non-empty bearer token within the size bound.
fn require_token(env: &impl EnvSource, variable: &'static str) -> Result<String, ConfigError> {
    let raw = env.get(variable).ok_or(ConfigError::Missing(variable))?;
    let token = raw.trim().to_string();
    if token.is_empty() {
        return Err(ConfigError::invalid(variable, "token must be non-empty"));
    }
    if token.len() > MAX_TOKEN_LENGTH {
        return Err(ConfigError::invalid(variable, "token exceeds size limit"));
    }
    Ok(token)
}

/// Parses a comma-separated token list.
fn parse_tokens(env: &impl EnvSource, variable: &'static str) -> Result<Vec<String>, ConfigError> {
    let raw = env.get(variable).ok_or(ConfigError::Missing(variable))?;
    let mut tokens = Vec::new();
    for entry in raw.split(',') {
        let token = entry.trim();
        if token.is_empty() {
            continue;
        }
        if token.len() > MAX_TOKEN_LENGTH {
            return Err(ConfigError::invalid(variable, "token exceeds size limit"));
        }
        tokens.push(token.to_string());
    }
    if tokens.is_empty() {
        return Err(ConfigError::invalid(variable, "token list must be non-empty"));
    }
    Ok(tokens)
}

/// Parses the backend list formatted `name=url,name=url`.
fn parse_backends(
    env: &impl EnvSource,
    variable: &'static str,
) -> Result<Vec<BackendConfig>, ConfigError> {
    let raw = env.get(variable).ok_or(ConfigError::Missing(variable))?;
    let mut backends: Vec<BackendConfig> = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let Some((name, url)) = entry.split_once('=') else {
            return Err(ConfigError::invalid(variable, format!("expected name=url, got {entry}")));
        };
        let name = name.trim();
        let url = url.trim();
        if name.is_empty() || name.contains('.') {
            return Err(ConfigError::invalid(
                variable,
                format!("service names must be non-empty and dot-free: {name}"),
            ));
        }
        let parsed =
            Url::parse(url).map_err(|err| ConfigError::invalid(variable, err.to_string()))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::invalid(
                    variable,
                    format!("unsupported backend scheme: {other}"),
                ));
            }
        }
        if backends.iter().any(|backend| backend.name.as_str() == name) {
            return Err(ConfigError::invalid(variable, format!("duplicate backend: {name}")));
        }
        backends.push(BackendConfig {
            name: ServiceName::new(name),
            url: url.trim_end_matches('/').to_string(),
        });
    }
    if backends.len() > MAX_BACKENDS {
        return Err(ConfigError::invalid(variable, "too many backends"));
    }
    Ok(backends)
}

/// Parses timeout overrides with defaults.
fn parse_timeouts(env: &impl EnvSource) -> Result<TimeoutConfig, ConfigError> {
    let defaults = TimeoutConfig::default();
    Ok(TimeoutConfig {
        governance_ms: parse_u64(env, "TOOLGATE_GOVERNANCE_TIMEOUT_MS", defaults.governance_ms)?,
        initialize_ms: parse_u64(env, "TOOLGATE_INITIALIZE_TIMEOUT_MS", defaults.initialize_ms)?,
        tool_call_ms: parse_u64(env, "TOOLGATE_TOOL_CALL_TIMEOUT_MS", defaults.tool_call_ms)?,
        bundle_fetch_ms: parse_u64(
            env,
            "TOOLGATE_BUNDLE_FETCH_TIMEOUT_MS",
            defaults.bundle_fetch_ms,
        )?,
    })
}

/// Parses the optional rate limit block; limiting is off unless the
/// request cap is set.
fn parse_rate_limit(env: &impl EnvSource) -> Result<Option<RateLimitConfig>, ConfigError> {
    let Some(raw) = env.get("TOOLGATE_RATE_LIMIT_MAX_REQUESTS") else {
        return Ok(None);
    };
    let max_requests = raw.trim().parse().map_err(|_| {
        ConfigError::invalid("TOOLGATE_RATE_LIMIT_MAX_REQUESTS", format!("invalid integer: {raw}"))
    })?;
    Ok(Some(RateLimitConfig {
        max_requests,
        window_ms: parse_u64(env, "TOOLGATE_RATE_LIMIT_WINDOW_MS", 60_000)?,
        max_entries: parse_usize(env, "TOOLGATE_RATE_LIMIT_MAX_ENTRIES", 10_000)?,
    }))
}

/// Parses an optional unsigned integer with a default.
fn parse_u64(
    env: &impl EnvSource,
    variable: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match env.get(variable) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(variable, format!("invalid integer: {raw}"))),
    }
}

/// Parses an optional usize with a default.
fn parse_usize(
    env: &impl EnvSource,
    variable: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    match env.get(variable) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(variable, format!("invalid integer: {raw}"))),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
