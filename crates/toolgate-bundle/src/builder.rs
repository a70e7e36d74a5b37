// crates/toolgate-bundle/src/builder.rs
// ============================================================================
// Module: Bundle Builder
// Description: Long-running rebuild loop feeding the bundle cache.
// Purpose: Keep decision engines supplied with fresh, immutable snapshots.
// Dependencies: tokio, toolgate-core, crate::{cache, client}
// ============================================================================

//! ## Overview
//! The builder bootstraps from `getBundleData`, publishes a snapshot, then
//! follows the control-plane change stream. Change events are coalesced
//! through a trailing debounce window before one rebuild runs. A dropped
//! stream reconnects with exponential backoff and a full resync. The loop
//! stops when the shutdown signal fires. If the control plane is unreachable
//! the cache keeps serving the last good snapshot; before the first
//! publication decision engines deny everything.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use toolgate_core::PolicyBundle;

use crate::cache::BundleCache;
use crate::client::ClientError;
use crate::client::ControlPlaneClient;
use crate::client::EventStream;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Initial reconnect backoff after a dropped stream.
const BACKOFF_INITIAL: Duration = Duration::from_millis(500);
/// Upper bound on reconnect backoff.
const BACKOFF_MAX: Duration = Duration::from_secs(30);
/// Retry interval while bootstrapping against an unreachable control plane.
const BOOTSTRAP_RETRY: Duration = Duration::from_secs(2);

// ============================================================================
// SECTION: Shutdown Signal
// ============================================================================

/// Cooperative shutdown signal for builder tasks.
///
/// # Invariants
/// - Once triggered the signal never resets.
#[derive(Debug, Clone)]
pub struct Shutdown {
    /// Receiver side observed by tasks.
    receiver: watch::Receiver<bool>,
}

/// Handle that triggers a [`Shutdown`].
#[derive(Debug)]
pub struct ShutdownHandle {
    /// Sender side held by the owner.
    sender: watch::Sender<bool>,
}

impl Shutdown {
    /// Creates a signal and its trigger handle.
    #[must_use]
    pub fn new() -> (ShutdownHandle, Self) {
        let (sender, receiver) = watch::channel(false);
        (
            ShutdownHandle {
                sender,
            },
            Self {
                receiver,
            },
        )
    }

    /// Completes when shutdown is triggered.
    pub async fn triggered(&mut self) {
        while !*self.receiver.borrow() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// Returns true when shutdown has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}

impl ShutdownHandle {
    /// Triggers shutdown for all signal clones.
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Long-running bundle builder.
///
/// # Invariants
/// - Snapshots publish through the shared cache only; the builder holds no
///   other mutable state.
pub struct BundleBuilder {
    /// Control-plane client.
    client: ControlPlaneClient,
    /// Shared cache fed by this builder.
    cache: Arc<BundleCache>,
    /// Governance evaluator URL stamped into snapshots.
    governance_evaluator_url: String,
    /// Opaque token stamped into snapshots.
    bundle_token: String,
    /// Trailing debounce window for change coalescing.
    debounce: Duration,
}

impl BundleBuilder {
    /// Creates a builder feeding the given cache.
    #[must_use]
    pub fn new(
        client: ControlPlaneClient,
        cache: Arc<BundleCache>,
        governance_evaluator_url: impl Into<String>,
        bundle_token: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            governance_evaluator_url: governance_evaluator_url.into(),
            bundle_token: bundle_token.into(),
            debounce,
        }
    }

    /// Spawns the builder loop on the current runtime.
    #[must_use]
    pub fn spawn(self, shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Runs the builder loop until shutdown.
    pub async fn run(self, mut shutdown: Shutdown) {
        // Bootstrap: retry until the first snapshot publishes or shutdown.
        while !self.refresh().await {
            tokio::select! {
                () = shutdown.triggered() => return,
                () = tokio::time::sleep(BOOTSTRAP_RETRY) => {}
            }
        }

        let mut backoff = BACKOFF_INITIAL;
        loop {
            if shutdown.is_triggered() {
                return;
            }
            match self.client.subscribe_events().await {
                Ok(stream) => {
                    backoff = BACKOFF_INITIAL;
                    // Full resync covers events lost while disconnected.
                    self.refresh().await;
                    self.follow(stream, &mut shutdown).await;
                }
                Err(_err) => {}
            }
            tokio::select! {
                () = shutdown.triggered() => return,
                () = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(BACKOFF_MAX);
        }
    }

    /// Follows an open change stream until it drops or shutdown fires.
    async fn follow(&self, mut stream: EventStream, shutdown: &mut Shutdown) {
        loop {
            let event = tokio::select! {
                () = shutdown.triggered() => return,
                event = stream.next_event() => event,
            };
            match event {
                Ok(Some(_event)) => {
                    self.debounce_window(&mut stream, shutdown).await;
                    self.refresh().await;
                }
                Ok(None) | Err(ClientError::Transport(_)) => return,
                Err(_other) => return,
            }
        }
    }

    /// Coalesces rapid successive events into one rebuild.
    async fn debounce_window(&self, stream: &mut EventStream, shutdown: &mut Shutdown) {
        loop {
            let more = tokio::select! {
                () = shutdown.triggered() => return,
                () = tokio::time::sleep(self.debounce) => return,
                event = stream.next_event() => event,
            };
            match more {
                Ok(Some(_event)) => {}
                Ok(None) | Err(_) => return,
            }
        }
    }

    /// Fetches the latest policy state and publishes a snapshot.
    ///
    /// Returns true when a snapshot was published or the fetched revision
    /// was already cached.
    async fn refresh(&self) -> bool {
        match self.client.get_bundle_data().await {
            Ok(data) => {
                let revision = data.revision;
                let bundle = PolicyBundle::from_data(
                    data,
                    self.governance_evaluator_url.clone(),
                    self.bundle_token.clone(),
                );
                self.cache.publish(bundle);
                self.cache.revision().is_some_and(|current| current >= revision)
            }
            Err(_err) => false,
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
