//! Limiters for every configured policy over one shared store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::limiter::{LimiterOptions, RateLimiter};
use super::rules::PolicySet;
use super::Decision;
use crate::clock::Clock;
use crate::error::{FloodgateError, Result};
use crate::store::AtomicStore;

/// Maps policy ids to their limiters.
///
/// Limiters are immutable; [`LimiterRegistry::reload`] swaps in a freshly built set.
/// Persisted state is keyed by policy id, so a policy that survives a reload keeps the
/// state its keys already accumulated.
pub struct LimiterRegistry {
    limiters: RwLock<HashMap<String, Arc<RateLimiter>>>,
    store: Arc<dyn AtomicStore>,
    clock: Arc<dyn Clock>,
    options: LimiterOptions,
}

impl LimiterRegistry {
    /// Build a limiter for every policy in `policies`.
    pub fn new(
        policies: &PolicySet,
        store: Arc<dyn AtomicStore>,
        clock: Arc<dyn Clock>,
        options: LimiterOptions,
    ) -> Result<Self> {
        let registry = Self {
            limiters: RwLock::new(HashMap::new()),
            store,
            clock,
            options,
        };
        registry.reload(policies)?;
        Ok(registry)
    }

    /// Replace every limiter. Nothing changes if any policy fails validation.
    pub fn reload(&self, policies: &PolicySet) -> Result<()> {
        policies.validate()?;

        let mut limiters = HashMap::with_capacity(policies.len());
        for policy in &policies.policies {
            let limiter = RateLimiter::new(policy.clone(), self.store.clone(), self.clock.clone())?
                .with_options(self.options.clone());
            limiters.insert(policy.id.clone(), Arc::new(limiter));
        }

        *self.limiters.write() = limiters;
        info!(policies = policies.len(), "Rate limit policies loaded");
        Ok(())
    }

    /// The limiter for a policy id.
    pub fn get(&self, policy_id: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.read().get(policy_id).cloned()
    }

    /// Admit or reject `cost` for `key` under the named policy.
    pub async fn allow(&self, policy_id: &str, key: &str, cost: u64) -> Result<Decision> {
        let limiter = self
            .get(policy_id)
            .ok_or_else(|| FloodgateError::UnknownPolicy(policy_id.to_string()))?;
        limiter.allow(key, cost).await
    }

    /// Registered policy ids, sorted.
    pub fn policy_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.limiters.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered limiters.
    pub fn len(&self) -> usize {
        self.limiters.read().len()
    }

    /// Whether no limiters are registered.
    pub fn is_empty(&self) -> bool {
        self.limiters.read().is_empty()
    }

    /// Close the shared store.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ratelimit::Policy;
    use crate::store::MemoryStore;
    use std::time::Duration;

    fn registry(policies: Vec<Policy>) -> LimiterRegistry {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::with_clock(Arc::new(clock.clone())));
        LimiterRegistry::new(
            &PolicySet::new(policies).unwrap(),
            store,
            Arc::new(clock),
            LimiterOptions::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_allow_routes_by_policy() {
        let registry = registry(vec![
            Policy::fixed_window("strict", 1, Duration::from_secs(60)).unwrap(),
            Policy::fixed_window("loose", 100, Duration::from_secs(60)).unwrap(),
        ]);

        assert!(registry.allow("strict", "user", 1).await.unwrap().admitted);
        assert!(registry.allow("strict", "user", 1).await.unwrap().is_rejected());
        assert!(registry.allow("loose", "user", 1).await.unwrap().admitted);
        assert_eq!(registry.policy_ids(), vec!["loose".to_string(), "strict".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_policy() {
        let registry = registry(vec![Policy::token_bucket("api", 1, 1.0)]);
        let result = registry.allow("other", "user", 1).await;
        assert!(matches!(result, Err(FloodgateError::UnknownPolicy(id)) if id == "other"));
    }

    #[tokio::test]
    async fn test_reload_keeps_state_for_surviving_policy() {
        let registry = registry(vec![
            Policy::fixed_window("api", 2, Duration::from_secs(60)).unwrap()
        ]);
        assert!(registry.allow("api", "user", 2).await.unwrap().admitted);

        let widened = PolicySet::new(vec![
            Policy::fixed_window("api", 3, Duration::from_secs(60)).unwrap(),
            Policy::token_bucket("burst", 5, 1.0),
        ])
        .unwrap();
        registry.reload(&widened).unwrap();

        assert_eq!(registry.len(), 2);
        let decision = registry.allow("api", "user", 1).await.unwrap();
        assert!(decision.admitted);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_limiters() {
        let registry = registry(vec![Policy::token_bucket("api", 1, 1.0)]);

        let broken = PolicySet {
            policies: vec![Policy::token_bucket("api", 1, -1.0)],
        };
        assert!(registry.reload(&broken).is_err());
        assert!(registry.get("api").is_some());
        assert_eq!(registry.get("api").unwrap().policy().kind.ceiling(), 1);
    }
}
