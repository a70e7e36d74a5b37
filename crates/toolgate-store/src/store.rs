// crates/toolgate-store/src/store.rs
// ============================================================================
// Module: Toolgate Policy Store
// Description: Singleton control-plane state with a revisioned change stream.
// Purpose: Serialize admin mutations and serve consistent bundle snapshots.
// Dependencies: toolgate-core, tokio
// ============================================================================

//! ## Overview
//! The policy store is the single source of truth for the catalog, access
//! rules, revocation list, and governance bindings. Admin operations
//! serialize behind one lock; every mutation bumps a monotonic revision and
//! publishes a change event on a broadcast stream. `bundle_data` returns a
//! deep snapshot that observes either pre- or post-mutation state, never a
//! partial view. Subscribers that lose events recover by re-reading
//! `bundle_data`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use toolgate_core::AccessRule;
use toolgate_core::BundleData;
use toolgate_core::Catalog;
use toolgate_core::CatalogError;
use toolgate_core::GovernanceId;
use toolgate_core::Revision;
use toolgate_core::RuleError;
use toolgate_core::RuleId;
use toolgate_core::ServiceName;
use toolgate_core::SubjectId;
use toolgate_core::ToolName;
use toolgate_core::ToolTag;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Buffered change events per subscriber before lag forces a resync.
const CHANGE_STREAM_CAPACITY: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by policy store mutations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Catalog mutation failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// Access rule failed validation.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

// ============================================================================
// SECTION: Change Events
// ============================================================================

/// Facet of policy state touched by a mutation.
///
/// # Invariants
/// - Variants are stable for serialization and audit labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Catalog entries changed (services or tools).
    Catalog,
    /// Access rule list changed.
    Rules,
    /// Revocation list changed.
    Revocations,
    /// Governance bindings changed.
    Governance,
}

/// Event published on the change stream after each mutation.
///
/// # Invariants
/// - `revision` values observed by one subscriber are strictly increasing
///   while the subscriber keeps up; a lagged subscriber must resync via
///   `bundle_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Revision after the mutation.
    pub revision: Revision,
    /// Facet the mutation touched.
    pub kind: ChangeKind,
}

// ============================================================================
// SECTION: Store State
// ============================================================================

/// Mutable policy state guarded by the store lock.
#[derive(Debug, Default)]
struct StoreState {
    /// Service and tool catalog.
    catalog: Catalog,
    /// Access rules in insertion order.
    rules: Vec<AccessRule>,
    /// Revoked subject identities.
    revoked: BTreeSet<SubjectId>,
    /// Governance instance bound to each service.
    governance: BTreeMap<ServiceName, GovernanceId>,
    /// Monotonic revision counter.
    revision: Revision,
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

/// Singleton control-plane policy store.
///
/// # Invariants
/// - Mutations serialize behind one lock (single writer).
/// - `revision` strictly increases across mutations.
/// - Snapshots are deep copies; published state is never aliased mutably.
#[derive(Debug)]
pub struct PolicyStore {
    /// Guarded policy state.
    state: Mutex<StoreState>,
    /// Fan-out change stream; each subscriber owns its cursor.
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyStore {
    /// Creates an empty policy store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_STREAM_CAPACITY);
        Self {
            state: Mutex::new(StoreState::default()),
            changes,
        }
    }

    /// Subscribes to the change stream.
    ///
    /// Lost events are recoverable by re-reading [`PolicyStore::bundle_data`].
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Registers a service as disabled when absent.
    pub fn register_service(&self, service: ServiceName) -> Revision {
        let mut state = self.lock();
        state.catalog.register_service(service);
        self.publish(&mut state, ChangeKind::Catalog)
    }

    /// Enables a service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Catalog`] when the service is unknown.
    pub fn enable_service(&self, service: &ServiceName) -> Result<Revision, StoreError> {
        let mut state = self.lock();
        state.catalog.set_enabled(service, true)?;
        Ok(self.publish(&mut state, ChangeKind::Catalog))
    }

    /// Disables a service, masking all of its tools.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Catalog`] when the service is unknown.
    pub fn disable_service(&self, service: &ServiceName) -> Result<Revision, StoreError> {
        let mut state = self.lock();
        state.catalog.set_enabled(service, false)?;
        Ok(self.publish(&mut state, ChangeKind::Catalog))
    }

    /// Registers a tool with the given tag.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Catalog`] when the service is unknown.
    pub fn register_tool(
        &self,
        service: &ServiceName,
        tool: ToolName,
        tag: ToolTag,
    ) -> Result<Revision, StoreError> {
        let mut state = self.lock();
        state.catalog.register_tool(service, tool, tag)?;
        Ok(self.publish(&mut state, ChangeKind::Catalog))
    }

    /// Removes a tool from a service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Catalog`] when the service is unknown.
    pub fn remove_tool(
        &self,
        service: &ServiceName,
        tool: &ToolName,
    ) -> Result<Revision, StoreError> {
        let mut state = self.lock();
        state.catalog.remove_tool(service, tool)?;
        Ok(self.publish(&mut state, ChangeKind::Catalog))
    }

    /// Changes the tag of a registered tool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Catalog`] when the service or tool is unknown.
    pub fn set_tag(
        &self,
        service: &ServiceName,
        tool: &ToolName,
        tag: ToolTag,
    ) -> Result<Revision, StoreError> {
        let mut state = self.lock();
        state.catalog.set_tag(service, tool, tag)?;
        Ok(self.publish(&mut state, ChangeKind::Catalog))
    }

    /// Inserts an access rule, replacing any rule with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Rule`] when the rule fails validation.
    pub fn add_access_rule(&self, rule: AccessRule) -> Result<Revision, StoreError> {
        rule.validate()?;
        let mut state = self.lock();
        if let Some(existing) = state.rules.iter_mut().find(|existing| existing.id == rule.id) {
            *existing = rule;
        } else {
            state.rules.push(rule);
        }
        Ok(self.publish(&mut state, ChangeKind::Rules))
    }

    /// Removes an access rule when present.
    pub fn remove_access_rule(&self, id: &RuleId) -> Revision {
        let mut state = self.lock();
        state.rules.retain(|rule| &rule.id != id);
        self.publish(&mut state, ChangeKind::Rules)
    }

    /// Adds a subject to the revocation list.
    pub fn revoke_subject(&self, subject: SubjectId) -> Revision {
        let mut state = self.lock();
        state.revoked.insert(subject);
        self.publish(&mut state, ChangeKind::Revocations)
    }

    /// Removes a subject from the revocation list.
    pub fn reinstate_subject(&self, subject: &SubjectId) -> Revision {
        let mut state = self.lock();
        state.revoked.remove(subject);
        self.publish(&mut state, ChangeKind::Revocations)
    }

    /// Binds a governance instance to a service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Catalog`] when the service is unknown.
    pub fn attach_governance(
        &self,
        service: &ServiceName,
        governance_id: GovernanceId,
    ) -> Result<Revision, StoreError> {
        let mut state = self.lock();
        if !state.catalog.contains_service(service) {
            return Err(StoreError::Catalog(CatalogError::UnknownService(service.clone())));
        }
        state.governance.insert(service.clone(), governance_id);
        Ok(self.publish(&mut state, ChangeKind::Governance))
    }

    /// Returns a consistent deep snapshot of the full policy state.
    #[must_use]
    pub fn bundle_data(&self) -> BundleData {
        let state = self.lock();
        BundleData {
            revision: state.revision,
            catalog: state.catalog.clone(),
            access_rules: state.rules.clone(),
            revoked_subjects: state.revoked.clone(),
            governance_instances: state.governance.clone(),
        }
    }

    /// Returns the current revision.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.lock().revision
    }

    /// Locks the state, recovering from a poisoned lock.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Bumps the revision and publishes a change event.
    ///
    /// Send failures mean no subscriber is connected; the revision still
    /// advances and late subscribers bootstrap from `bundle_data`.
    fn publish(&self, state: &mut StoreState, kind: ChangeKind) -> Revision {
        state.revision = state.revision.next();
        let event = ChangeEvent {
            revision: state.revision,
            kind,
        };
        let _ = self.changes.send(event);
        state.revision
    }
}
