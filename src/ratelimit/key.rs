//! Store key generation for limiter state.

use std::fmt;

/// The unique identity of one LimiterState: `(policy id, traffic key)`.
///
/// Rendered as `{prefix}:{policy_id}:{traffic_key}`. Policy ids may not contain `:`,
/// so the traffic key is free to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    /// Namespace shared by all limiters on one store
    pub prefix: String,
    /// The policy this state belongs to
    pub policy_id: String,
    /// The traffic key (user, token, address, route)
    pub traffic_key: String,
}

impl StateKey {
    /// Create a new state key.
    pub fn new(prefix: &str, policy_id: &str, traffic_key: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            policy_id: policy_id.to_string(),
            traffic_key: traffic_key.to_string(),
        }
    }

    /// The string the store indexes the record by.
    pub fn to_store_key(&self) -> String {
        format!("{}:{}:{}", self.prefix, self.policy_id, self.traffic_key)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_store_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_key_format() {
        let key = StateKey::new("floodgate", "login", "user:42");
        assert_eq!(key.to_store_key(), "floodgate:login:user:42");
        assert_eq!(key.to_string(), "floodgate:login:user:42");
    }

    #[test]
    fn test_state_keys_differ_by_policy() {
        let a = StateKey::new("floodgate", "login", "10.0.0.1");
        let b = StateKey::new("floodgate", "search", "10.0.0.1");
        assert_ne!(a, b);
        assert_ne!(a.to_store_key(), b.to_store_key());
    }
}
