// crates/toolgate-config/src/lib.rs
// ============================================================================
// Module: Toolgate Config Library
// Description: Public API surface for Toolgate configuration.
// Purpose: Expose environment-driven, fail-fast configuration loading.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Configuration for the gateway and control-plane processes, loaded from
//! `TOOLGATE_*` environment variables and validated eagerly so
//! misconfiguration is a fatal startup error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::BackendConfig;
pub use config::ConfigError;
pub use config::ControlPlaneConfig;
pub use config::EnvSource;
pub use config::GatewayConfig;
pub use config::ProcessEnv;
pub use config::RateLimitConfig;
pub use config::TimeoutConfig;
