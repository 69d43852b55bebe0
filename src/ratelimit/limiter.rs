//! The rate limiter facade callers interact with.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::algorithm::{self, Algorithm};
use super::key::StateKey;
use super::policy::Policy;
use super::Decision;
use crate::clock::Clock;
use crate::error::{FloodgateError, Result};
use crate::store::{AtomicStore, Transaction};

/// Default namespace for store keys.
pub const DEFAULT_KEY_PREFIX: &str = "floodgate";

/// Per-limiter settings that are not part of the policy itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterOptions {
    /// Namespace prepended to every store key
    pub key_prefix: String,
    /// Upper bound on one store round trip; `None` waits as long as the store takes
    pub timeout: Option<Duration>,
}

impl Default for LimiterOptions {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            timeout: None,
        }
    }
}

/// Admission control for one policy over a shared atomic store.
///
/// Every call reads the clock once and runs exactly one store transaction. The limiter
/// holds no mutable per-key state of its own, so any number of limiters, in any number of
/// processes, can serve the same policy against the same store.
pub struct RateLimiter {
    policy: Policy,
    algorithm: Box<dyn Algorithm>,
    store: Arc<dyn AtomicStore>,
    clock: Arc<dyn Clock>,
    options: LimiterOptions,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .field("options", &self.options)
            .finish()
    }
}

impl RateLimiter {
    /// Create a limiter for `policy`, failing with `InvalidPolicy` if it does not validate.
    pub fn new(policy: Policy, store: Arc<dyn AtomicStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        policy.validate()?;
        let algorithm = algorithm::from_kind(&policy.kind);
        Ok(Self {
            policy,
            algorithm,
            store,
            clock,
            options: LimiterOptions::default(),
        })
    }

    /// Replace the limiter options.
    pub fn with_options(mut self, options: LimiterOptions) -> Self {
        self.options = options;
        self
    }

    /// The policy this limiter enforces.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// The store key holding state for `traffic_key`.
    pub fn state_key(&self, traffic_key: &str) -> StateKey {
        StateKey::new(&self.options.key_prefix, &self.policy.id, traffic_key)
    }

    /// Admit or reject one event of weight 1.
    pub async fn allow_one(&self, key: &str) -> Result<Decision> {
        self.allow(key, 1).await
    }

    /// Admit or reject an event of weight `cost` for `key`.
    ///
    /// Fails with `InvalidArgument` for an empty key or zero cost, and with
    /// `StoreUnavailable` when the store cannot run the transaction in time. Store failures
    /// are never turned into a decision here; see [`FailMode`].
    pub async fn allow(&self, key: &str, cost: u64) -> Result<Decision> {
        if key.is_empty() {
            return Err(FloodgateError::InvalidArgument(
                "traffic key must not be empty".to_string(),
            ));
        }
        if cost == 0 {
            return Err(FloodgateError::InvalidArgument(
                "cost must be greater than zero".to_string(),
            ));
        }

        let state_key = self.state_key(key);
        let store_key = state_key.to_store_key();
        let now = self.clock.now_millis();

        trace!(
            key = %state_key,
            algorithm = %self.policy.algorithm(),
            cost = cost,
            now = now,
            "Checking admission"
        );

        let algorithm = &*self.algorithm;
        let transaction: Transaction<'_> =
            Box::new(move |current: Option<&str>| algorithm.apply(current, now, cost));
        let execution = self.store.execute_atomic(&store_key, transaction);

        let result = match self.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(result) => result,
                Err(_) => Err(FloodgateError::StoreUnavailable(format!(
                    "store did not answer within {}ms",
                    limit.as_millis()
                ))),
            },
            None => execution.await,
        };

        match &result {
            Ok(decision) if decision.is_rejected() => {
                debug!(
                    key = %state_key,
                    cost = cost,
                    remaining = decision.remaining,
                    retry_after_ms = decision.retry_after.map(|d| d.as_millis() as u64),
                    "Rate limit exceeded"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(key = %state_key, error = %e, "Admission check failed"),
        }

        result
    }

    /// Close the underlying store.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}

/// Explicit caller choice for what a store failure means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Treat an unavailable store as admission
    Open,
    /// Treat an unavailable store as rejection
    #[default]
    Closed,
}

impl FailMode {
    /// Turn `StoreUnavailable` into a decision; every other outcome passes through.
    pub fn resolve(self, result: Result<Decision>) -> Result<Decision> {
        match result {
            Err(FloodgateError::StoreUnavailable(reason)) => {
                warn!(fail_mode = ?self, reason = %reason, "Store unavailable, applying fail mode");
                Ok(match self {
                    FailMode::Open => Decision::admit(0),
                    FailMode::Closed => Decision::reject(0, None),
                })
            }
            other => other,
        }
    }
}
