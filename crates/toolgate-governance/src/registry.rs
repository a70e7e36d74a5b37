// crates/toolgate-governance/src/registry.rs
// ============================================================================
// Module: Governance Registry
// Description: Registry of per-service governance protocol instances.
// Purpose: Locate and serialize access to the instance governing each service.
// Dependencies: toolgate-core, std::sync
// ============================================================================

//! ## Overview
//! The registry owns one [`ServiceGovernance`] instance per service,
//! created when the control plane attaches a governance binding. Each
//! instance carries its own lock so mutations on different services proceed
//! independently while operations on one instance serialize.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use toolgate_core::GovernanceId;
use toolgate_core::ServiceName;

use crate::protocol::ServiceGovernance;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Shared handle to one governance instance.
pub type SharedGovernance = Arc<Mutex<ServiceGovernance>>;

/// Registry of governance instances keyed by service name.
///
/// # Invariants
/// - At most one instance exists per service; re-attaching with the same
///   identifier is a no-op, while a new identifier starts a fresh instance.
#[derive(Debug, Default)]
pub struct GovernanceRegistry {
    /// Instance map guarded by a registry-level lock.
    instances: Mutex<BTreeMap<ServiceName, SharedGovernance>>,
}

impl GovernanceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a governance instance to a service, creating it when absent.
    ///
    /// Returns the instance handle. Re-attaching with the same identifier
    /// keeps the instance state; a different identifier starts a fresh
    /// protocol instance and discards prior requests.
    pub fn attach(&self, service: ServiceName, governance_id: GovernanceId) -> SharedGovernance {
        let mut instances = lock_unpoisoned(&self.instances);
        if let Some(existing) = instances.get(&service) {
            let handle = Arc::clone(existing);
            drop(instances);
            let mut instance = lock_unpoisoned(&handle);
            if instance.governance_id() != &governance_id {
                *instance = rebind(&instance, governance_id);
            }
            drop(instance);
            return handle;
        }
        let handle = Arc::new(Mutex::new(ServiceGovernance::new(service.clone(), governance_id)));
        instances.insert(service, Arc::clone(&handle));
        handle
    }

    /// Returns the instance governing a service, when attached.
    #[must_use]
    pub fn instance(&self, service: &ServiceName) -> Option<SharedGovernance> {
        lock_unpoisoned(&self.instances).get(service).map(Arc::clone)
    }

    /// Returns the services with an attached instance.
    #[must_use]
    pub fn services(&self) -> Vec<ServiceName> {
        lock_unpoisoned(&self.instances).keys().cloned().collect()
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks a mutex, recovering the inner value if a holder panicked.
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Rebuilds an instance with a fresh binding identifier.
///
/// Request state is not carried over: a rebind represents a new protocol
/// instance on the governance evaluator.
fn rebind(instance: &ServiceGovernance, governance_id: GovernanceId) -> ServiceGovernance {
    ServiceGovernance::new(instance.service().clone(), governance_id)
}
