// crates/toolgate-gateway/src/limits.rs
// ============================================================================
// Module: Subject Throttling
// Description: Optional per-subject admission control for the edge.
// Purpose: Shed abusive callers before policy evaluation when configured.
// Dependencies: toolgate-config, toolgate-core
// ============================================================================

//! ## Overview
//! Throttling is keyed by the resolved subject identity, the same key the
//! policy layers use, so one caller cannot starve the edge across tool
//! calls, listings, and stream setups. Each subject gets a window of
//! `max_requests` calls; a throttled subject learns its retry delay in
//! whole seconds, matching the `retry-after` convention the pending path
//! already uses. Stale windows are swept once per window; if the table is
//! full of distinct live subjects the throttle sheds new callers rather
//! than growing unbounded. Throttling is off unless configured.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use toolgate_config::RateLimitConfig;
use toolgate_core::SubjectId;

// ============================================================================
// SECTION: Verdicts
// ============================================================================

/// Admission verdict for one subject's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleVerdict {
    /// The request proceeds to policy evaluation.
    Proceed,
    /// The subject exhausted its window.
    Throttled {
        /// Whole seconds until the subject's window reopens.
        retry_after_secs: u64,
    },
    /// Too many distinct live subjects; the request is shed.
    Shedding,
}

// ============================================================================
// SECTION: Throttle
// ============================================================================

/// Per-subject admission throttle for the edge.
///
/// # Invariants
/// - A subject's window opens on its first admitted call and reopens after
///   `window_ms`.
/// - The window table never exceeds `max_entries` live subjects.
pub struct SubjectThrottle {
    /// Configured window length, call cap, and table bound.
    settings: RateLimitConfig,
    /// Window table and sweep bookkeeping.
    state: Mutex<ThrottleState>,
}

/// Guarded throttle state.
struct ThrottleState {
    /// Open windows keyed by subject.
    windows: BTreeMap<SubjectId, SubjectWindow>,
    /// When stale windows were last swept.
    swept_at: Instant,
}

/// One subject's open window.
struct SubjectWindow {
    /// When this window opened.
    opened_at: Instant,
    /// Calls admitted in this window.
    admitted: u32,
}

impl SubjectThrottle {
    /// Creates a throttle from configuration.
    #[must_use]
    pub fn new(settings: RateLimitConfig) -> Self {
        Self {
            settings,
            state: Mutex::new(ThrottleState {
                windows: BTreeMap::new(),
                swept_at: Instant::now(),
            }),
        }
    }

    /// Decides whether a subject's request may proceed.
    pub fn admit(&self, subject: &SubjectId) -> ThrottleVerdict {
        let window = Duration::from_millis(self.settings.window_ms);
        let now = Instant::now();
        let Ok(mut state) = self.state.lock() else {
            return ThrottleVerdict::Shedding;
        };

        if now.duration_since(state.swept_at) >= window {
            state.windows.retain(|_, open| now.duration_since(open.opened_at) < window);
            state.swept_at = now;
        }
        if !state.windows.contains_key(subject) && state.windows.len() >= self.settings.max_entries
        {
            return ThrottleVerdict::Shedding;
        }

        let open = state.windows.entry(subject.clone()).or_insert(SubjectWindow {
            opened_at: now,
            admitted: 0,
        });
        if now.duration_since(open.opened_at) >= window {
            open.opened_at = now;
            open.admitted = 0;
        }
        if open.admitted >= self.settings.max_requests {
            let remaining = window.saturating_sub(now.duration_since(open.opened_at));
            return ThrottleVerdict::Throttled {
                retry_after_secs: ceil_secs(remaining),
            };
        }
        open.admitted = open.admitted.saturating_add(1);
        ThrottleVerdict::Proceed
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rounds a duration up to whole seconds, never below one.
fn ceil_secs(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1_000).max(1)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use toolgate_config::RateLimitConfig;
    use toolgate_core::SubjectId;

    use super::SubjectThrottle;
    use super::ThrottleVerdict;

    fn throttle(max_requests: u32, max_entries: usize) -> SubjectThrottle {
        SubjectThrottle::new(RateLimitConfig {
            max_requests,
            window_ms: 60_000,
            max_entries,
        })
    }

    #[test]
    fn throttles_after_window_cap() {
        let throttle = throttle(2, 16);
        let jarvis = SubjectId::new("jarvis@acme.com");
        assert_eq!(throttle.admit(&jarvis), ThrottleVerdict::Proceed);
        assert_eq!(throttle.admit(&jarvis), ThrottleVerdict::Proceed);
        let verdict = throttle.admit(&jarvis);
        let ThrottleVerdict::Throttled {
            retry_after_secs,
        } = verdict
        else {
            panic!("expected throttled, got {verdict:?}");
        };
        assert!(retry_after_secs >= 1);
        assert!(retry_after_secs <= 60);
    }

    #[test]
    fn subjects_keep_independent_windows() {
        let throttle = throttle(1, 16);
        let jarvis = SubjectId::new("jarvis@acme.com");
        let pepper = SubjectId::new("pepper@acme.com");
        assert_eq!(throttle.admit(&jarvis), ThrottleVerdict::Proceed);
        assert!(matches!(throttle.admit(&jarvis), ThrottleVerdict::Throttled { .. }));
        assert_eq!(throttle.admit(&pepper), ThrottleVerdict::Proceed);
    }

    #[test]
    fn full_table_sheds_new_subjects_only() {
        let throttle = throttle(5, 1);
        let jarvis = SubjectId::new("jarvis@acme.com");
        let pepper = SubjectId::new("pepper@acme.com");
        assert_eq!(throttle.admit(&jarvis), ThrottleVerdict::Proceed);
        assert_eq!(throttle.admit(&pepper), ThrottleVerdict::Shedding);
        // The tracked subject keeps its window.
        assert_eq!(throttle.admit(&jarvis), ThrottleVerdict::Proceed);
    }
}
