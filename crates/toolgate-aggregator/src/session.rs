// crates/toolgate-aggregator/src/session.rs
// ============================================================================
// Module: Aggregator Sessions
// Description: Per-client session state mapping services to backend sessions.
// Purpose: Track backend session ids across the lifetime of a client session.
// Dependencies: rand, toolgate-core
// ============================================================================

//! ## Overview
//! Each client session owns a map from service name to the backend URL and
//! the backend's own session id collected during `initialize`. Sessions are
//! created by `initialize`, read by routing and streaming, and dropped by
//! `DELETE /mcp`. A session survives as long as any backend remains.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use rand::RngCore;
use toolgate_core::ServiceName;
use toolgate_core::SessionId;

// ============================================================================
// SECTION: Session Model
// ============================================================================

/// One backend bound into a client session.
///
/// # Invariants
/// - `session_id` is absent when the backend did not issue one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSession {
    /// Base URL of the backend MCP endpoint.
    pub url: String,
    /// Session id issued by the backend, when any.
    pub session_id: Option<SessionId>,
}

/// Per-client session state.
///
/// # Invariants
/// - Only the owning request/stream handlers mutate a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Backends bound into this session.
    pub backends: BTreeMap<ServiceName, BackendSession>,
}

impl Session {
    /// Returns the backend bound for a service.
    #[must_use]
    pub fn backend(&self, service: &ServiceName) -> Option<&BackendSession> {
        self.backends.get(service)
    }
}

// ============================================================================
// SECTION: Session Store
// ============================================================================

/// Store of live client sessions keyed by client session id.
///
/// # Invariants
/// - Lookups return value copies; the map lock is never held across awaits.
#[derive(Debug, Default)]
pub struct SessionStore {
    /// Live sessions.
    sessions: Mutex<BTreeMap<SessionId, Session>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh client session id.
    #[must_use]
    pub fn allocate_id() -> SessionId {
        let mut bytes = [0_u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let mut id = String::with_capacity(32);
        for byte in bytes {
            id.push_str(&format!("{byte:02x}"));
        }
        SessionId::new(id)
    }

    /// Inserts a session under a client session id.
    pub fn insert(&self, id: SessionId, session: Session) {
        self.lock().insert(id, session);
    }

    /// Returns a copy of the session for a client session id.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.lock().get(id).cloned()
    }

    /// Removes and returns the session for a client session id.
    #[must_use]
    pub fn remove(&self, id: &SessionId) -> Option<Session> {
        self.lock().remove(id)
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Locks the session map, recovering from a poisoned lock.
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<SessionId, Session>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use toolgate_core::ServiceName;
    use toolgate_core::SessionId;

    use super::BackendSession;
    use super::Session;
    use super::SessionStore;

    #[test]
    fn session_round_trip() {
        let store = SessionStore::new();
        let id = SessionStore::allocate_id();
        let mut session = Session::default();
        session.backends.insert(
            ServiceName::new("mock-calendar"),
            BackendSession {
                url: "http://calendar:3000/mcp".to_string(),
                session_id: Some(SessionId::new("backend-1")),
            },
        );
        store.insert(id.clone(), session.clone());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id), Some(session.clone()));
        assert_eq!(store.remove(&id), Some(session));
        assert!(store.is_empty());
    }

    #[test]
    fn allocated_ids_are_distinct_hex() {
        let first = SessionStore::allocate_id();
        let second = SessionStore::allocate_id();
        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 32);
        assert!(first.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
