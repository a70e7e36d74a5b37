// crates/toolgate-core/src/identifiers.rs
// ============================================================================
// Module: Toolgate Identifiers
// Description: Canonical opaque identifiers for services, tools, and callers.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Toolgate.
//! Identifiers are opaque strings on the wire. The only structured name is
//! [`QualifiedToolName`], the client-side `service.tool` form: the first `.`
//! separates the service from the tool, and the tool part may contain
//! further dots.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Service and Tool Names
// ============================================================================

/// Backend service name as registered in the catalog.
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Creates a new service name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ServiceName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServiceName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Tool name within a single backend service (un-prefixed form).
///
/// # Invariants
/// - Opaque UTF-8 string; may contain dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolName(String);

impl ToolName {
    /// Creates a new tool name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ToolName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ToolName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Client-side namespaced tool name in `service.tool` form.
///
/// # Invariants
/// - `service` never contains a dot; `tool` may contain further dots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedToolName {
    /// Service component before the first dot.
    pub service: ServiceName,
    /// Tool component after the first dot.
    pub tool: ToolName,
}

impl QualifiedToolName {
    /// Parses a namespaced tool name at the first dot.
    ///
    /// Returns `None` when the name has no dot or either side is empty.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let (service, tool) = name.split_once('.')?;
        if service.is_empty() || tool.is_empty() {
            return None;
        }
        Some(Self {
            service: ServiceName::new(service),
            tool: ToolName::new(tool),
        })
    }
}

impl fmt::Display for QualifiedToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.tool)
    }
}

// ============================================================================
// SECTION: Caller and Governance Identifiers
// ============================================================================

/// Canonical subject identity resolved from caller claims.
///
/// # Invariants
/// - Resolved as `email ?? preferred_username ?? sub`; opaque afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a new subject identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SubjectId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Access rule identifier.
///
/// # Invariants
/// - Unique within a rule set; inserting the same id replaces the rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Creates a new rule identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RuleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Governance protocol instance identifier bound to a service.
///
/// # Invariants
/// - Opaque UTF-8 string assigned by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GovernanceId(String);

impl GovernanceId {
    /// Creates a new governance identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GovernanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for GovernanceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Approval request identifier in `REQ-<monotonic>` form.
///
/// # Invariants
/// - Produced from a per-instance monotonic counter; never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Builds a request identifier from a monotonic counter value.
    #[must_use]
    pub fn from_counter(counter: u64) -> Self {
        Self(format!("REQ-{counter}"))
    }

    /// Creates a request identifier from its wire form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Client session identifier issued by the aggregator.
///
/// # Invariants
/// - Opaque UTF-8 string; uniqueness is the issuer's responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Revision
// ============================================================================

/// Monotonic policy revision counter.
///
/// # Invariants
/// - Strictly increases across published bundle snapshots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// Creates a revision from a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the next revision.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::QualifiedToolName;
    use super::RequestId;
    use super::Revision;

    #[test]
    fn qualified_name_splits_at_first_dot() {
        let name = QualifiedToolName::parse("mock-calendar.create.event").unwrap();
        assert_eq!(name.service.as_str(), "mock-calendar");
        assert_eq!(name.tool.as_str(), "create.event");
    }

    #[test]
    fn qualified_name_rejects_unnamespaced() {
        assert!(QualifiedToolName::parse("list_events").is_none());
        assert!(QualifiedToolName::parse(".tool").is_none());
        assert!(QualifiedToolName::parse("service.").is_none());
    }

    #[test]
    fn request_id_wire_form() {
        assert_eq!(RequestId::from_counter(1).as_str(), "REQ-1");
        assert_eq!(RequestId::from_counter(42).as_str(), "REQ-42");
    }

    #[test]
    fn revision_is_monotonic() {
        let first = Revision::new(1);
        assert_eq!(first.next().get(), 2);
        assert!(first.next() > first);
    }
}
