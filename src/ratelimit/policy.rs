//! Limiter policies: which algorithm to run and with which parameters.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FloodgateError, Result};

/// The four admission algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    FixedWindow,
    SlidingWindow,
    TokenBucket,
    LeakyBucket,
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlgorithmKind::FixedWindow => "fixed_window",
            AlgorithmKind::SlidingWindow => "sliding_window",
            AlgorithmKind::TokenBucket => "token_bucket",
            AlgorithmKind::LeakyBucket => "leaky_bucket",
        };
        f.write_str(name)
    }
}

/// Algorithm selection plus its numeric parameters.
///
/// Rates are events per second; windows are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum PolicyKind {
    /// At most `limit` events per aligned window of `window_ms`
    FixedWindow { limit: u64, window_ms: u64 },
    /// At most `limit` events in any trailing `window_ms`
    SlidingWindow { limit: u64, window_ms: u64 },
    /// Bursts up to `capacity`, refilled at `rate` tokens per second
    TokenBucket { capacity: u64, rate: f64 },
    /// Fill level up to `capacity`, drained at `rate` events per second
    LeakyBucket { capacity: u64, rate: f64 },
}

impl PolicyKind {
    /// The algorithm this kind selects.
    pub fn algorithm(&self) -> AlgorithmKind {
        match self {
            PolicyKind::FixedWindow { .. } => AlgorithmKind::FixedWindow,
            PolicyKind::SlidingWindow { .. } => AlgorithmKind::SlidingWindow,
            PolicyKind::TokenBucket { .. } => AlgorithmKind::TokenBucket,
            PolicyKind::LeakyBucket { .. } => AlgorithmKind::LeakyBucket,
        }
    }

    /// The maximum admissible cost: the window limit or the bucket capacity.
    pub fn ceiling(&self) -> u64 {
        match *self {
            PolicyKind::FixedWindow { limit, .. } | PolicyKind::SlidingWindow { limit, .. } => limit,
            PolicyKind::TokenBucket { capacity, .. } | PolicyKind::LeakyBucket { capacity, .. } => {
                capacity
            }
        }
    }
}

/// Immutable limiter configuration, identified by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Identifier scoping the persisted state of this policy
    pub id: String,
    /// Algorithm and parameters
    #[serde(flatten)]
    pub kind: PolicyKind,
}

impl Policy {
    /// Create a policy from an id and kind.
    pub fn new(id: impl Into<String>, kind: PolicyKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// A fixed window policy. Fails when `window` does not span a whole millisecond.
    pub fn fixed_window(id: impl Into<String>, limit: u64, window: Duration) -> Result<Self> {
        let id = id.into();
        let window_ms = window_millis(&id, window)?;
        Ok(Self::new(id, PolicyKind::FixedWindow { limit, window_ms }))
    }

    /// A sliding window (log) policy. Fails when `window` does not span a whole millisecond.
    pub fn sliding_window(id: impl Into<String>, limit: u64, window: Duration) -> Result<Self> {
        let id = id.into();
        let window_ms = window_millis(&id, window)?;
        Ok(Self::new(id, PolicyKind::SlidingWindow { limit, window_ms }))
    }

    /// A token bucket policy; `rate` is tokens per second.
    pub fn token_bucket(id: impl Into<String>, capacity: u64, rate: f64) -> Self {
        Self::new(id, PolicyKind::TokenBucket { capacity, rate })
    }

    /// A leaky bucket policy; `rate` is events drained per second.
    pub fn leaky_bucket(id: impl Into<String>, capacity: u64, rate: f64) -> Self {
        Self::new(id, PolicyKind::LeakyBucket { capacity, rate })
    }

    /// The algorithm this policy selects.
    pub fn algorithm(&self) -> AlgorithmKind {
        self.kind.algorithm()
    }

    /// Check every parameter, failing with `InvalidPolicy` on the first bad one.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(FloodgateError::InvalidPolicy(
                "policy id must not be empty".to_string(),
            ));
        }
        if self.id.contains(':') {
            return Err(FloodgateError::InvalidPolicy(format!(
                "policy id '{}' must not contain ':'",
                self.id
            )));
        }

        match self.kind {
            PolicyKind::FixedWindow { limit, window_ms }
            | PolicyKind::SlidingWindow { limit, window_ms } => {
                self.require_positive("limit", limit)?;
                self.require_positive("window_ms", window_ms)
            }
            PolicyKind::TokenBucket { capacity, rate } | PolicyKind::LeakyBucket { capacity, rate } => {
                self.require_positive("capacity", capacity)?;
                if !rate.is_finite() || rate <= 0.0 {
                    return Err(FloodgateError::InvalidPolicy(format!(
                        "policy '{}': rate must be a positive number, got {}",
                        self.id, rate
                    )));
                }
                Ok(())
            }
        }
    }

    fn require_positive(&self, field: &str, value: u64) -> Result<()> {
        if value == 0 {
            return Err(FloodgateError::InvalidPolicy(format!(
                "policy '{}': {} must be greater than zero",
                self.id, field
            )));
        }
        Ok(())
    }
}

fn window_millis(id: &str, window: Duration) -> Result<u64> {
    let millis = u64::try_from(window.as_millis()).map_err(|_| {
        FloodgateError::InvalidPolicy(format!("policy '{}': window {:?} is too long", id, window))
    })?;
    if millis == 0 {
        return Err(FloodgateError::InvalidPolicy(format!(
            "policy '{}': window {:?} is shorter than one millisecond",
            id, window
        )));
    }
    Ok(millis)
}
