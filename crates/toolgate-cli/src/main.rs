// crates/toolgate-cli/src/main.rs
// ============================================================================
// Module: Toolgate CLI Entry Point
// Description: Command dispatcher for the control-plane and gateway servers.
// Purpose: Wire configuration into long-running Toolgate processes.
// Dependencies: clap, tokio, toolgate-*
// ============================================================================

//! ## Overview
//! The `toolgate` binary runs either the control plane (policy store,
//! service governance, bundle endpoint) or the edge gateway (JWT
//! verification, decision engine, MCP aggregator, bundle builder).
//! Configuration comes from `TOOLGATE_*` environment variables; any missing
//! or invalid variable is a fatal startup error with a non-zero exit code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use thiserror::Error;
use toolgate_aggregator::Aggregator;
use toolgate_aggregator::BackendEndpoint;
use toolgate_aggregator::HttpBackendTransport;
use toolgate_bundle::BundleBuilder;
use toolgate_bundle::BundleCache;
use toolgate_bundle::ControlPlaneClient;
use toolgate_bundle::Shutdown;
use toolgate_config::ConfigError;
use toolgate_config::ControlPlaneConfig;
use toolgate_config::GatewayConfig;
use toolgate_engine::DecisionEngine;
use toolgate_engine::HttpGovernanceClient;
use toolgate_gateway::GatewayState;
use toolgate_gateway::JwksVerifier;
use toolgate_gateway::SubjectThrottle;
use toolgate_governance::GovernanceRegistry;
use toolgate_store::PolicyStore;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Toolgate: an MCP tool-access gateway with layered authorization.
#[derive(Debug, Parser)]
#[command(name = "toolgate", version, about)]
struct Cli {
    /// Process to run.
    #[command(subcommand)]
    command: Command,
}

/// Toolgate processes.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the control plane: policy store, governance, bundle endpoint.
    ControlPlane,
    /// Run the edge gateway: decision engine and MCP aggregator.
    Gateway,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal CLI errors.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration failed to load or validate.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    /// A client could not be constructed.
    #[error("startup error: {0}")]
    Startup(String),
    /// The control-plane server failed.
    #[error(transparent)]
    ControlPlane(#[from] toolgate_control::ControlServerError),
    /// The gateway server failed.
    #[error(transparent)]
    Gateway(#[from] toolgate_gateway::GatewayServerError),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::ControlPlane => run_control_plane().await,
        Command::Gateway => run_gateway().await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            #[allow(clippy::print_stderr, reason = "Fatal startup errors go to stderr.")]
            {
                eprintln!("toolgate: {err}");
            }
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// SECTION: Control Plane
// ============================================================================

/// Runs the control-plane server until it fails.
async fn run_control_plane() -> Result<(), CliError> {
    let config = ControlPlaneConfig::from_env()?;
    let store = Arc::new(PolicyStore::new());
    let registry = Arc::new(GovernanceRegistry::new());
    let audit = Arc::new(toolgate_control::StderrAuditSink);
    toolgate_control::serve(config, store, registry, audit).await?;
    Ok(())
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Runs the edge gateway until it fails.
async fn run_gateway() -> Result<(), CliError> {
    let config = GatewayConfig::from_env()?;

    let cache = Arc::new(BundleCache::new());
    let client = ControlPlaneClient::new(
        &config.control_plane_url,
        &config.gateway_token,
        config.timeouts.bundle_fetch(),
    )
    .map_err(|err| CliError::Startup(err.to_string()))?;
    let builder = BundleBuilder::new(
        client,
        Arc::clone(&cache),
        &config.governance_url,
        &config.bundle_token,
        Duration::from_millis(config.debounce_ms),
    );
    let (shutdown_handle, shutdown) = Shutdown::new();
    let builder_task = builder.spawn(shutdown);

    let governance = HttpGovernanceClient::new(config.timeouts.governance())
        .map_err(|err| CliError::Startup(err.to_string()))?;
    let engine = Arc::new(DecisionEngine::new(Arc::clone(&cache), Arc::new(governance)));

    let transport = HttpBackendTransport::new()
        .map_err(|err| CliError::Startup(err.to_string()))?;
    let aggregator = Arc::new(Aggregator::new(
        backend_endpoints(&config),
        Arc::new(transport),
        config.timeouts.initialize(),
        config.timeouts.tool_call(),
    ));

    let verifier = JwksVerifier::new(&config.oidc_issuer_url)
        .map_err(|err| CliError::Startup(err.to_string()))?;
    let throttle = config.rate_limit.map(|settings| Arc::new(SubjectThrottle::new(settings)));

    let state = GatewayState::new(
        engine,
        aggregator,
        Arc::new(verifier),
        throttle,
        &config.oidc_issuer_url,
        Duration::from_secs(config.sse_keepalive_secs),
    )
    .map_err(|err| CliError::Startup(err.to_string()))?
    .with_observability(
        Arc::new(toolgate_gateway::NoopMetrics),
        Arc::new(toolgate_gateway::StderrAuthzAuditSink),
    );

    let result = toolgate_gateway::serve(&config, state).await;
    shutdown_handle.trigger();
    builder_task.abort();
    result?;
    Ok(())
}

/// Maps configured backends into aggregator endpoints.
fn backend_endpoints(config: &GatewayConfig) -> Vec<BackendEndpoint> {
    config
        .backends
        .iter()
        .map(|backend| BackendEndpoint {
            name: backend.name.clone(),
            url: backend.url.clone(),
        })
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::Cli;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
