// crates/toolgate-bundle/src/cache.rs
// ============================================================================
// Module: Bundle Cache
// Description: Copy-on-publish bundle snapshots behind an atomic pointer.
// Purpose: Give decision engines lock-free reads of the current bundle.
// Dependencies: arc-swap, toolgate-core
// ============================================================================

//! ## Overview
//! The cache holds the current immutable [`PolicyBundle`] behind an
//! [`arc_swap::ArcSwapOption`]: readers acquire-load a shared pointer, the
//! builder release-stores a fresh snapshot. Publication is monotonic; a
//! snapshot with a stale revision is discarded. Before the first publication
//! the cache is empty and a decision engine must deny everything.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use toolgate_core::PolicyBundle;
use toolgate_core::Revision;

// ============================================================================
// SECTION: Bundle Cache
// ============================================================================

/// Shared cache of the current bundle snapshot.
///
/// # Invariants
/// - Snapshots are immutable after publication.
/// - The published revision strictly increases.
#[derive(Debug, Default)]
pub struct BundleCache {
    /// Current snapshot, absent before bootstrap.
    current: ArcSwapOption<PolicyBundle>,
}

impl BundleCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot when bootstrapped.
    #[must_use]
    pub fn current(&self) -> Option<Arc<PolicyBundle>> {
        self.current.load_full()
    }

    /// Returns the revision of the current snapshot.
    #[must_use]
    pub fn revision(&self) -> Option<Revision> {
        self.current.load().as_ref().map(|bundle| bundle.revision)
    }

    /// Publishes a snapshot when its revision advances the cache.
    ///
    /// Returns true when the snapshot was published.
    pub fn publish(&self, bundle: PolicyBundle) -> bool {
        let stale = self
            .current
            .load()
            .as_ref()
            .is_some_and(|current| current.revision >= bundle.revision);
        if stale {
            return false;
        }
        self.current.store(Some(Arc::new(bundle)));
        true
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::collections::BTreeSet;

    use toolgate_core::BundleData;
    use toolgate_core::Catalog;
    use toolgate_core::PolicyBundle;
    use toolgate_core::Revision;

    use super::BundleCache;

    fn bundle(revision: u64) -> PolicyBundle {
        PolicyBundle::from_data(
            BundleData {
                revision: Revision::new(revision),
                catalog: Catalog::new(),
                access_rules: Vec::new(),
                revoked_subjects: BTreeSet::new(),
                governance_instances: BTreeMap::new(),
            },
            "http://npl:12000",
            "opaque",
        )
    }

    #[test]
    fn empty_cache_serves_nothing() {
        let cache = BundleCache::new();
        assert!(cache.current().is_none());
        assert!(cache.revision().is_none());
    }

    #[test]
    fn publication_is_monotonic() {
        let cache = BundleCache::new();
        assert!(cache.publish(bundle(2)));
        assert!(!cache.publish(bundle(2)));
        assert!(!cache.publish(bundle(1)));
        assert!(cache.publish(bundle(3)));
        assert_eq!(cache.revision(), Some(Revision::new(3)));
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let cache = BundleCache::new();
        cache.publish(bundle(1));
        let held = cache.current().unwrap();
        cache.publish(bundle(2));
        assert_eq!(held.revision, Revision::new(1));
        assert_eq!(cache.current().unwrap().revision, Revision::new(2));
    }
}
