// crates/toolgate-core/src/bundle.rs
// ============================================================================
// Module: Toolgate Policy Bundle
// Description: Immutable, revisioned snapshots of policy state.
// Purpose: Provide the data contract between the control plane and evaluators.
// Dependencies: serde, crate::{catalog, identifiers, rules}
// ============================================================================

//! ## Overview
//! A bundle is the immutable snapshot of policy state consumed by decision
//! engines: catalog, access rules, revoked subjects, governance-instance map,
//! and the metadata evaluators need to reach the governance evaluator. Once
//! published a snapshot is never mutated; rebuilds produce a fresh value with
//! a strictly larger revision.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::identifiers::GovernanceId;
use crate::identifiers::Revision;
use crate::identifiers::ServiceName;
use crate::identifiers::SubjectId;
use crate::rules::AccessRule;

// ============================================================================
// SECTION: Bundle Data
// ============================================================================

/// Raw policy state returned by the control plane's `getBundleData`.
///
/// # Invariants
/// - Represents a consistent snapshot: never a partially applied mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleData {
    /// Policy revision at snapshot time.
    pub revision: Revision,
    /// Service and tool catalog.
    pub catalog: Catalog,
    /// Access rule list.
    pub access_rules: Vec<AccessRule>,
    /// Revoked subject identities.
    pub revoked_subjects: BTreeSet<SubjectId>,
    /// Governance instance bound to each service.
    pub governance_instances: BTreeMap<ServiceName, GovernanceId>,
}

// ============================================================================
// SECTION: Policy Bundle
// ============================================================================

/// Immutable bundle snapshot served to decision engines.
///
/// # Invariants
/// - Never mutated after publication; readers observe a consistent copy.
/// - `revision` strictly increases across publications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyBundle {
    /// Policy revision of this snapshot.
    pub revision: Revision,
    /// Service and tool catalog.
    pub catalog: Catalog,
    /// Access rule list.
    pub access_rules: Vec<AccessRule>,
    /// Revoked subject identities.
    pub revoked_subjects: BTreeSet<SubjectId>,
    /// Governance instance bound to each service.
    pub governance_instances: BTreeMap<ServiceName, GovernanceId>,
    /// Base URL of the governance evaluator.
    pub governance_evaluator_url: String,
    /// Opaque token evaluators present to the governance evaluator.
    pub bundle_token: String,
}

impl PolicyBundle {
    /// Composes a bundle snapshot from raw policy state and evaluator metadata.
    #[must_use]
    pub fn from_data(
        data: BundleData,
        governance_evaluator_url: impl Into<String>,
        bundle_token: impl Into<String>,
    ) -> Self {
        Self {
            revision: data.revision,
            catalog: data.catalog,
            access_rules: data.access_rules,
            revoked_subjects: data.revoked_subjects,
            governance_instances: data.governance_instances,
            governance_evaluator_url: governance_evaluator_url.into(),
            bundle_token: bundle_token.into(),
        }
    }

    /// Returns true when the subject is revoked.
    #[must_use]
    pub fn is_revoked(&self, subject: &SubjectId) -> bool {
        self.revoked_subjects.contains(subject)
    }

    /// Returns the governance instance bound to a service.
    #[must_use]
    pub fn governance_instance(&self, service: &ServiceName) -> Option<&GovernanceId> {
        self.governance_instances.get(service)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::BundleData;
    use super::PolicyBundle;
    use crate::catalog::Catalog;
    use crate::catalog::ToolTag;
    use crate::identifiers::GovernanceId;
    use crate::identifiers::Revision;
    use crate::identifiers::ServiceName;
    use crate::identifiers::ToolName;

    #[test]
    fn bundle_serializes_to_wire_shape() {
        let mut catalog = Catalog::new();
        catalog.register_service(ServiceName::new("mock-calendar"));
        catalog.set_enabled(&ServiceName::new("mock-calendar"), true).unwrap();
        catalog
            .register_tool(
                &ServiceName::new("mock-calendar"),
                ToolName::new("list_events"),
                ToolTag::Open,
            )
            .unwrap();
        let mut instances = BTreeMap::new();
        instances.insert(ServiceName::new("mock-calendar"), GovernanceId::new("gov-42"));
        let bundle = PolicyBundle::from_data(
            BundleData {
                revision: Revision::new(42),
                catalog,
                access_rules: Vec::new(),
                revoked_subjects: BTreeSet::new(),
                governance_instances: instances,
            },
            "http://npl:12000",
            "opaque",
        );

        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(value["revision"], json!(42));
        assert_eq!(value["catalog"]["mock-calendar"]["enabled"], json!(true));
        assert_eq!(
            value["catalog"]["mock-calendar"]["tools"]["list_events"]["tag"],
            json!("open")
        );
        assert_eq!(value["governance_instances"]["mock-calendar"], json!("gov-42"));
        assert_eq!(value["governance_evaluator_url"], json!("http://npl:12000"));
        assert_eq!(value["bundle_token"], json!("opaque"));
    }
}
