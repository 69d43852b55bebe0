//! Sliding window log.
//!
//! Each key keeps the timestamps of its admitted events. On every call, entries older
//! than `now - window_ms` are evicted, then the request is admitted only if it fits. A
//! rejected request never occupies a slot: the fit check and the insert happen in the same
//! store transaction, so there is nothing to roll back afterwards.
//!
//! Eviction is lazy. A key idle for a long time is pruned on its next access; the record
//! TTL of `2 × window_ms` reclaims keys that never come back.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::algorithm::{decode, encode, Algorithm};
use super::policy::AlgorithmKind;
use super::Decision;
use crate::error::Result;
use crate::store::Commit;

/// Persisted state: admitted timestamps, each with a unique tiebreaker so events at the
/// same millisecond from different callers stay distinct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct EventLog {
    entries: BTreeSet<(u64, String)>,
}

impl EventLog {
    /// Drop every entry with a timestamp strictly before `cutoff`.
    fn evict_before(&mut self, cutoff: u64) {
        self.entries = self.entries.split_off(&(cutoff, String::new()));
    }
}

/// Sliding window (log) algorithm.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    limit: u64,
    window_ms: u64,
}

impl SlidingWindow {
    /// Create a sliding window admitting `limit` in any trailing `window_ms`.
    pub fn new(limit: u64, window_ms: u64) -> Self {
        Self { limit, window_ms }
    }

    /// Time until enough of the oldest entries leave the window for `cost` to fit.
    fn retry_after(&self, log: &EventLog, now: u64, cost: u64) -> Option<Duration> {
        if cost > self.limit {
            return None;
        }
        let excess = (log.entries.len() as u64 + cost).saturating_sub(self.limit);
        let (oldest_blocking, _) = log.entries.iter().nth(excess.saturating_sub(1) as usize)?;
        // An entry at `t` is evicted once `now > t + window_ms`.
        let free_at = oldest_blocking.saturating_add(self.window_ms).saturating_add(1);
        Some(Duration::from_millis(free_at.saturating_sub(now)))
    }
}

impl Algorithm for SlidingWindow {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::SlidingWindow
    }

    fn apply(&self, current: Option<&str>, now: u64, cost: u64) -> Result<Commit> {
        let mut log = decode::<EventLog>(current)?.unwrap_or_default();
        log.evict_before(now.saturating_sub(self.window_ms));

        let occupied = log.entries.len() as u64;
        let decision = if occupied.saturating_add(cost) <= self.limit {
            for _ in 0..cost {
                log.entries.insert((now, Uuid::new_v4().simple().to_string()));
            }
            Decision::admit(self.limit - occupied - cost)
        } else {
            Decision::reject(
                self.limit.saturating_sub(occupied),
                self.retry_after(&log, now, cost),
            )
        };

        Ok(Commit::new(
            encode(&log)?,
            Duration::from_millis(self.window_ms.saturating_mul(2)),
            decision,
        ))
    }
}
