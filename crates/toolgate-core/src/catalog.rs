// crates/toolgate-core/src/catalog.rs
// ============================================================================
// Module: Toolgate Catalog
// Description: Service and tool catalog with open/gated tags.
// Purpose: Provide the first authorization layer consulted by the decision engine.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The catalog maps backend services to their tools and tags. A tool is
//! either `open` (catalog + access-rule approval suffices) or `gated`
//! (additionally requires a service-governance decision). Disabling a
//! service masks all of its tools from the decision engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identifiers::ServiceName;
use crate::identifiers::ToolName;

// ============================================================================
// SECTION: Tool Tags
// ============================================================================

/// Authorization tag attached to every catalog tool.
///
/// # Invariants
/// - Variants are stable for serialization and bundle matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolTag {
    /// Catalog and access-rule approval suffice.
    Open,
    /// A service-governance decision is additionally required.
    Gated,
}

impl ToolTag {
    /// Returns a stable label for the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Gated => "gated",
        }
    }

    /// Parses a tag label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "open" => Some(Self::Open),
            "gated" => Some(Self::Gated),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Catalog Entries
// ============================================================================

/// Catalog entry for a single tool.
///
/// # Invariants
/// - `tag` is always one of the two [`ToolTag`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Authorization tag for the tool.
    pub tag: ToolTag,
}

/// Catalog entry for a single backend service.
///
/// # Invariants
/// - `enabled = false` masks every tool of the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    /// Whether the service is visible to the decision engine.
    pub enabled: bool,
    /// Tools registered for the service.
    pub tools: BTreeMap<ToolName, ToolEntry>,
}

impl ServiceEntry {
    /// Creates a disabled service entry with no tools.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            tools: BTreeMap::new(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors returned by catalog mutations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// Service is not registered in the catalog.
    #[error("unknown service: {0}")]
    UnknownService(ServiceName),
    /// Tool is not registered for the service.
    #[error("unknown tool: {service}.{tool}")]
    UnknownTool {
        /// Service the lookup targeted.
        service: ServiceName,
        /// Tool the lookup targeted.
        tool: ToolName,
    },
}

// ============================================================================
// SECTION: Lookup Outcome
// ============================================================================

/// Result of resolving a tool call against the catalog.
///
/// # Invariants
/// - `Found` is returned only for enabled services with the tool present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogLookup {
    /// Service enabled and tool present; carries the tool tag.
    Found(ToolTag),
    /// Service is not registered.
    UnknownService,
    /// Service is registered but disabled.
    ServiceDisabled,
    /// Service enabled but the tool is not registered.
    UnknownTool,
}

impl CatalogLookup {
    /// Returns the tag when the lookup succeeded.
    #[must_use]
    pub const fn tag(self) -> Option<ToolTag> {
        match self {
            Self::Found(tag) => Some(tag),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Service and tool catalog.
///
/// # Invariants
/// - Serializes transparently as `service → { enabled, tools }`.
/// - Mutations are serialized by the owning policy store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    /// Registered services keyed by name.
    services: BTreeMap<ServiceName, ServiceEntry>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service as disabled when absent; no-op when present.
    pub fn register_service(&mut self, service: ServiceName) {
        self.services.entry(service).or_insert_with(ServiceEntry::disabled);
    }

    /// Sets the enabled flag for a service.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownService`] when the service is absent.
    pub fn set_enabled(&mut self, service: &ServiceName, enabled: bool) -> Result<(), CatalogError> {
        let entry = self
            .services
            .get_mut(service)
            .ok_or_else(|| CatalogError::UnknownService(service.clone()))?;
        entry.enabled = enabled;
        Ok(())
    }

    /// Registers a tool with the given tag, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownService`] when the service is absent.
    pub fn register_tool(
        &mut self,
        service: &ServiceName,
        tool: ToolName,
        tag: ToolTag,
    ) -> Result<(), CatalogError> {
        let entry = self
            .services
            .get_mut(service)
            .ok_or_else(|| CatalogError::UnknownService(service.clone()))?;
        entry.tools.insert(tool, ToolEntry {
            tag,
        });
        Ok(())
    }

    /// Removes a tool from a service.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownService`] when the service is absent.
    pub fn remove_tool(&mut self, service: &ServiceName, tool: &ToolName) -> Result<(), CatalogError> {
        let entry = self
            .services
            .get_mut(service)
            .ok_or_else(|| CatalogError::UnknownService(service.clone()))?;
        entry.tools.remove(tool);
        Ok(())
    }

    /// Changes the tag of a registered tool.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownService`] or [`CatalogError::UnknownTool`].
    pub fn set_tag(
        &mut self,
        service: &ServiceName,
        tool: &ToolName,
        tag: ToolTag,
    ) -> Result<(), CatalogError> {
        let entry = self
            .services
            .get_mut(service)
            .ok_or_else(|| CatalogError::UnknownService(service.clone()))?;
        let tool_entry = entry.tools.get_mut(tool).ok_or_else(|| CatalogError::UnknownTool {
            service: service.clone(),
            tool: tool.clone(),
        })?;
        tool_entry.tag = tag;
        Ok(())
    }

    /// Resolves a tool call against the catalog.
    #[must_use]
    pub fn resolve(&self, service: &ServiceName, tool: &ToolName) -> CatalogLookup {
        let Some(entry) = self.services.get(service) else {
            return CatalogLookup::UnknownService;
        };
        if !entry.enabled {
            return CatalogLookup::ServiceDisabled;
        }
        match entry.tools.get(tool) {
            Some(tool_entry) => CatalogLookup::Found(tool_entry.tag),
            None => CatalogLookup::UnknownTool,
        }
    }

    /// Returns true when the service is registered.
    #[must_use]
    pub fn contains_service(&self, service: &ServiceName) -> bool {
        self.services.contains_key(service)
    }

    /// Returns the entry for a service.
    #[must_use]
    pub fn service(&self, service: &ServiceName) -> Option<&ServiceEntry> {
        self.services.get(service)
    }

    /// Iterates over all registered services.
    pub fn services(&self) -> impl Iterator<Item = (&ServiceName, &ServiceEntry)> {
        self.services.iter()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
