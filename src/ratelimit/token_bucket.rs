//! Token bucket.
//!
//! A key starts with `capacity` tokens. Each call first refills `floor(elapsed × rate)`
//! tokens (capped at `capacity`) and moves the refill clock to `now`, then spends `cost`
//! tokens if it can. The refill clock advances on rejections too, so elapsed time is
//! never counted twice; the price is that sub-token remainders are dropped on every call.

use serde::{Deserialize, Serialize};

use super::algorithm::{accrued, decode, encode, millis_for, Algorithm};
use super::policy::AlgorithmKind;
use super::Decision;
use crate::error::Result;
use crate::store::Commit;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Bucket {
    tokens: f64,
    last_refill: u64,
}

/// Token bucket algorithm.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: u64,
    /// Tokens per second
    rate: f64,
}

impl TokenBucket {
    /// Create a bucket holding up to `capacity` tokens, refilled at `rate` per second.
    pub fn new(capacity: u64, rate: f64) -> Self {
        Self { capacity, rate }
    }
}

impl Algorithm for TokenBucket {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::TokenBucket
    }

    fn apply(&self, current: Option<&str>, now: u64, cost: u64) -> Result<Commit> {
        let capacity = self.capacity as f64;
        let mut bucket = decode::<Bucket>(current)?.unwrap_or(Bucket {
            tokens: capacity,
            last_refill: now,
        });

        // A clock behind last_refill yields zero elapsed, and last_refill never rewinds.
        let elapsed = now.saturating_sub(bucket.last_refill);
        bucket.tokens = (bucket.tokens + accrued(elapsed, self.rate)).min(capacity);
        bucket.last_refill = bucket.last_refill.max(now);

        let cost = cost as f64;
        let decision = if bucket.tokens >= cost {
            bucket.tokens -= cost;
            Decision::admit(bucket.tokens.floor() as u64)
        } else {
            let retry_after = (cost <= capacity).then(|| millis_for(cost - bucket.tokens, self.rate));
            Decision::reject(bucket.tokens.floor() as u64, retry_after)
        };

        // Once idle for a full refill the bucket is indistinguishable from a new one.
        let ttl = millis_for(capacity, self.rate);
        Ok(Commit::new(encode(&bucket)?, ttl, decision))
    }
}
