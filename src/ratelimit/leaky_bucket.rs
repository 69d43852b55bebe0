//! Leaky bucket (as a meter).
//!
//! The state is the bucket's fill level: occupied capacity rather than available tokens.
//! Each call drains `floor(elapsed × rate)` and then admits the request if its cost still
//! fits under `capacity`. Admission is immediate; requests are never held back in a queue
//! to be released at the drain rate.

use serde::{Deserialize, Serialize};

use super::algorithm::{accrued, decode, encode, millis_for, Algorithm};
use super::policy::AlgorithmKind;
use super::Decision;
use crate::error::Result;
use crate::store::Commit;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Level {
    queued: f64,
    last_leak: u64,
}

/// Leaky bucket algorithm.
#[derive(Debug, Clone)]
pub struct LeakyBucket {
    capacity: u64,
    /// Events drained per second
    rate: f64,
}

impl LeakyBucket {
    /// Create a bucket of `capacity` draining at `rate` per second.
    pub fn new(capacity: u64, rate: f64) -> Self {
        Self { capacity, rate }
    }
}

impl Algorithm for LeakyBucket {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::LeakyBucket
    }

    fn apply(&self, current: Option<&str>, now: u64, cost: u64) -> Result<Commit> {
        let capacity = self.capacity as f64;
        let mut level = decode::<Level>(current)?.unwrap_or(Level {
            queued: 0.0,
            last_leak: now,
        });

        let elapsed = now.saturating_sub(level.last_leak);
        level.queued = (level.queued - accrued(elapsed, self.rate)).max(0.0);
        level.last_leak = level.last_leak.max(now);

        let cost = cost as f64;
        let decision = if level.queued + cost <= capacity {
            level.queued += cost;
            Decision::admit((capacity - level.queued).floor() as u64)
        } else {
            let overflow = level.queued + cost - capacity;
            let retry_after = (cost <= capacity).then(|| millis_for(overflow, self.rate));
            Decision::reject((capacity - level.queued).max(0.0).floor() as u64, retry_after)
        };

        // A bucket idle long enough to drain completely is the same as an absent one.
        let ttl = millis_for(capacity, self.rate);
        Ok(Commit::new(encode(&level)?, ttl, decision))
    }
}
