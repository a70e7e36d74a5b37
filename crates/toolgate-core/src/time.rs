// crates/toolgate-core/src/time.rs
// ============================================================================
// Module: Toolgate Time Model
// Description: Canonical timestamp representations for protocol records.
// Purpose: Provide deterministic, replayable time values across Toolgate records.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Toolgate embeds explicit time values in governance records to keep replay
//! and testing deterministic. Protocol state machines never read wall-clock
//! time directly; hosts supply timestamps at operation boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in governance records and audit events.
///
/// # Invariants
/// - Values are explicitly provided by callers; protocol state never reads
///   wall-clock time.
/// - No validation is performed; monotonicity is a caller responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value.
    Logical(u64),
}

impl Timestamp {
    /// Returns the timestamp as unix milliseconds when available.
    #[must_use]
    pub const fn as_unix_millis(&self) -> Option<i64> {
        match self {
            Self::UnixMillis(value) => Some(*value),
            Self::Logical(_) => None,
        }
    }

    /// Returns the timestamp as logical time when available.
    #[must_use]
    pub const fn as_logical(&self) -> Option<u64> {
        match self {
            Self::UnixMillis(_) => None,
            Self::Logical(value) => Some(*value),
        }
    }
}
