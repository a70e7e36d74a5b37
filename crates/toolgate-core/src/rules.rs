// crates/toolgate-core/src/rules.rs
// ============================================================================
// Module: Toolgate Access Rules
// Description: Claim- and identity-matched access rules with allow lists.
// Purpose: Provide the second authorization layer and granted-service replay.
// Dependencies: serde, crate::{catalog, claims, identifiers}
// ============================================================================

//! ## Overview
//! Access rules couple a matcher (claims or identity) with an allow list of
//! services and tools. Rules compose by OR across the rule set; there is no
//! deny-override class. A claims matcher fires iff every required `(k, v)`
//! pair is satisfied by the caller's claims; an identity matcher fires iff
//! the resolved subject equals the rule's identity literally. Allow lists
//! match by exact name or the `"*"` wildcard.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::claims::ClaimSet;
use crate::identifiers::RuleId;
use crate::identifiers::ServiceName;
use crate::identifiers::SubjectId;
use crate::identifiers::ToolName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wildcard entry accepted in allow lists.
pub const WILDCARD: &str = "*";

// ============================================================================
// SECTION: Matchers
// ============================================================================

/// Matcher deciding whether a rule applies to a caller.
///
/// # Invariants
/// - Variants are stable for serialization and bundle matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleMatcher {
    /// Fires iff every `(k, v)` pair is present in the caller's claims.
    Claims {
        /// Required claim key/value pairs.
        claims: BTreeMap<String, String>,
    },
    /// Fires iff the caller's resolved identity equals `identity`.
    Identity {
        /// Subject the rule targets.
        identity: SubjectId,
    },
}

impl RuleMatcher {
    /// Returns true when the matcher fires for the given caller.
    #[must_use]
    pub fn matches(&self, subject: &SubjectId, claims: &ClaimSet) -> bool {
        match self {
            Self::Claims {
                claims: required,
            } => required.iter().all(|(key, value)| claims.satisfies(key, value)),
            Self::Identity {
                identity,
            } => identity == subject,
        }
    }
}

// ============================================================================
// SECTION: Allow Lists
// ============================================================================

/// Services and tools granted by a rule.
///
/// # Invariants
/// - Both lists are non-empty on validated rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Service names or `"*"`.
    pub services: Vec<String>,
    /// Tool names or `"*"`.
    pub tools: Vec<String>,
}

impl AccessGrant {
    /// Returns true when the grant covers the service.
    #[must_use]
    pub fn covers_service(&self, service: &ServiceName) -> bool {
        self.services.iter().any(|entry| entry == WILDCARD || entry == service.as_str())
    }

    /// Returns true when the grant covers the tool.
    #[must_use]
    pub fn covers_tool(&self, tool: &ToolName) -> bool {
        self.tools.iter().any(|entry| entry == WILDCARD || entry == tool.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when validating an access rule.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    /// Allow list grants no services or no tools.
    #[error("access rule {0} has an empty allow list")]
    EmptyAllow(RuleId),
    /// Claims matcher carries no required claims.
    #[error("access rule {0} has an empty claims matcher")]
    EmptyClaims(RuleId),
}

// ============================================================================
// SECTION: Access Rules
// ============================================================================

/// One entry in the access rule list.
///
/// # Invariants
/// - `id` is unique within a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    /// Unique rule identifier.
    pub id: RuleId,
    /// Matcher deciding rule applicability.
    pub matcher: RuleMatcher,
    /// Services and tools granted when the matcher fires.
    pub allow: AccessGrant,
}

impl AccessRule {
    /// Validates the rule shape.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when the allow list or claims matcher is empty.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.allow.services.is_empty() || self.allow.tools.is_empty() {
            return Err(RuleError::EmptyAllow(self.id.clone()));
        }
        if let RuleMatcher::Claims {
            claims,
        } = &self.matcher
            && claims.is_empty()
        {
            return Err(RuleError::EmptyClaims(self.id.clone()));
        }
        Ok(())
    }

    /// Returns true when this rule grants the caller the given tool.
    #[must_use]
    pub fn grants(
        &self,
        subject: &SubjectId,
        claims: &ClaimSet,
        service: &ServiceName,
        tool: &ToolName,
    ) -> bool {
        self.matcher.matches(subject, claims)
            && self.allow.covers_service(service)
            && self.allow.covers_tool(tool)
    }
}

// ============================================================================
// SECTION: Rule Set Evaluation
// ============================================================================

/// Returns true when any rule grants the caller the given tool.
///
/// Rules compose by OR; the first grant wins and order is irrelevant.
#[must_use]
pub fn any_rule_grants(
    rules: &[AccessRule],
    subject: &SubjectId,
    claims: &ClaimSet,
    service: &ServiceName,
    tool: &ToolName,
) -> bool {
    rules.iter().any(|rule| rule.grants(subject, claims, service, tool))
}

/// Replays the rule set against the catalog to compute granted services.
///
/// A service is granted when it is enabled and some firing rule covers it.
/// The result is sorted by construction, ready for the
/// `x-granted-services` header.
#[must_use]
pub fn granted_services(
    rules: &[AccessRule],
    subject: &SubjectId,
    claims: &ClaimSet,
    catalog: &Catalog,
) -> BTreeSet<ServiceName> {
    let firing: Vec<&AccessRule> =
        rules.iter().filter(|rule| rule.matcher.matches(subject, claims)).collect();
    catalog
        .services()
        .filter(|(_, entry)| entry.enabled)
        .filter(|(service, _)| firing.iter().any(|rule| rule.allow.covers_service(service)))
        .map(|(service, _)| service.clone())
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
