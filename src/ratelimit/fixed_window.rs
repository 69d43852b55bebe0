//! Fixed window counter.
//!
//! Time is cut into aligned windows of `window_ms`; each key counts the cost admitted in
//! the current window. The count resets when a request lands in a newer window.
//!
//! Windows are independent, so a burst of `limit` at the end of one window followed by
//! another `limit` at the start of the next admits up to `2 × limit` across the boundary.
//! That is inherent to the algorithm; use a sliding window where it matters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::algorithm::{decode, encode, Algorithm};
use super::policy::AlgorithmKind;
use super::Decision;
use crate::error::Result;
use crate::store::Commit;

/// Persisted state: which window the count belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct WindowCount {
    window_id: u64,
    count: u64,
}

/// Fixed window algorithm.
#[derive(Debug, Clone)]
pub struct FixedWindow {
    limit: u64,
    window_ms: u64,
}

impl FixedWindow {
    /// Create a fixed window admitting `limit` per `window_ms`.
    pub fn new(limit: u64, window_ms: u64) -> Self {
        Self { limit, window_ms }
    }
}

impl Algorithm for FixedWindow {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::FixedWindow
    }

    fn apply(&self, current: Option<&str>, now: u64, cost: u64) -> Result<Commit> {
        let window_id = now / self.window_ms;

        let mut state = match decode::<WindowCount>(current)? {
            // A stored window at or ahead of ours is kept so a lagging clock cannot reset it.
            Some(stored) if stored.window_id >= window_id => stored,
            _ => WindowCount { window_id, count: 0 },
        };

        let decision = if state.count.saturating_add(cost) <= self.limit {
            state.count += cost;
            Decision::admit(self.limit - state.count)
        } else {
            let window_end = (state.window_id + 1).saturating_mul(self.window_ms);
            let retry_after =
                (cost <= self.limit).then(|| Duration::from_millis(window_end.saturating_sub(now)));
            Decision::reject(self.limit.saturating_sub(state.count), retry_after)
        };

        Ok(Commit::new(
            encode(&state)?,
            Duration::from_millis(self.window_ms),
            decision,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_of(commit: &Commit) -> WindowCount {
        serde_json::from_str(&commit.state).unwrap()
    }

    #[test]
    fn test_first_request_creates_window() {
        let window = FixedWindow::new(10, 1_000);
        let commit = window.apply(None, 2_500, 1).unwrap();

        assert!(commit.decision.admitted);
        assert_eq!(commit.decision.remaining, 9);
        assert_eq!(count_of(&commit), WindowCount { window_id: 2, count: 1 });
        assert_eq!(commit.ttl, Duration::from_secs(1));
    }

    #[test]
    fn test_rejection_does_not_increment() {
        let window = FixedWindow::new(5, 1_000);
        let full = encode(&WindowCount { window_id: 0, count: 5 }).unwrap();

        let commit = window.apply(Some(&full), 400, 1).unwrap();

        assert!(commit.decision.is_rejected());
        assert_eq!(commit.decision.retry_after, Some(Duration::from_millis(600)));
        assert_eq!(count_of(&commit).count, 5);
    }

    #[test]
    fn test_multi_cost_must_fit_whole() {
        let window = FixedWindow::new(10, 1_000);
        let state = encode(&WindowCount { window_id: 0, count: 8 }).unwrap();

        let commit = window.apply(Some(&state), 10, 3).unwrap();
        assert!(commit.decision.is_rejected());
        assert_eq!(commit.decision.remaining, 2);
        assert_eq!(count_of(&commit).count, 8);

        let commit = window.apply(Some(&state), 10, 2).unwrap();
        assert!(commit.decision.admitted);
        assert_eq!(count_of(&commit).count, 10);
    }

    #[test]
    fn test_new_window_resets_count() {
        let window = FixedWindow::new(5, 1_000);
        let full = encode(&WindowCount { window_id: 0, count: 5 }).unwrap();

        let commit = window.apply(Some(&full), 1_000, 1).unwrap();

        assert!(commit.decision.admitted);
        assert_eq!(count_of(&commit), WindowCount { window_id: 1, count: 1 });
    }

    #[test]
    fn test_lagging_clock_keeps_newer_window() {
        let window = FixedWindow::new(5, 1_000);
        let full = encode(&WindowCount { window_id: 3, count: 5 }).unwrap();

        let commit = window.apply(Some(&full), 2_999, 1).unwrap();

        assert!(commit.decision.is_rejected());
        assert_eq!(count_of(&commit), WindowCount { window_id: 3, count: 5 });
    }

    #[test]
    fn test_oversized_cost_has_no_retry_hint() {
        let window = FixedWindow::new(5, 1_000);
        let commit = window.apply(None, 0, 6).unwrap();

        assert!(commit.decision.is_rejected());
        assert_eq!(commit.decision.retry_after, None);
        assert_eq!(commit.decision.remaining, 5);
    }
}
