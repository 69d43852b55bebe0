//! Policy sets loaded from configuration.
//!
//! A policy file lists every limiter a process serves:
//!
//! ```yaml
//! policies:
//!   - id: login
//!     algorithm: token_bucket
//!     capacity: 10
//!     rate: 1
//!   - id: search
//!     algorithm: sliding_window
//!     limit: 100
//!     window_ms: 60000
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::policy::Policy;
use crate::error::{FloodgateError, Result};

/// A validated collection of policies with unique ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    /// Policies in file order
    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl PolicySet {
    /// Create a policy set, validating every policy and id uniqueness.
    pub fn new(policies: Vec<Policy>) -> Result<Self> {
        let set = Self { policies };
        set.validate()?;
        Ok(set)
    }

    /// Load a policy set from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit policies");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load a policy set from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let set: PolicySet = serde_yaml::from_str(yaml)
            .map_err(|e| FloodgateError::Config(format!("Failed to parse policies: {}", e)))?;
        set.validate()?;
        Ok(set)
    }

    /// Check every policy and reject duplicate ids.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for policy in &self.policies {
            policy.validate()?;
            if !seen.insert(policy.id.as_str()) {
                return Err(FloodgateError::InvalidPolicy(format!(
                    "duplicate policy id '{}'",
                    policy.id
                )));
            }
        }
        Ok(())
    }

    /// Find a policy by id.
    pub fn get(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    /// Number of policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether the set holds no policies.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{AlgorithmKind, PolicyKind};
    use std::time::Duration;

    #[test]
    fn test_parse_all_algorithms() {
        let yaml = r#"
policies:
  - id: per_second
    algorithm: fixed_window
    limit: 10
    window_ms: 1000
  - id: trailing_minute
    algorithm: sliding_window
    limit: 100
    window_ms: 60000
  - id: login
    algorithm: token_bucket
    capacity: 10
    rate: 0.5
  - id: uploads
    algorithm: leaky_bucket
    capacity: 5
    rate: 1
"#;
        let set = PolicySet::from_yaml(yaml).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(
            set.get("per_second"),
            Some(&Policy::fixed_window("per_second", 10, Duration::from_secs(1)).unwrap())
        );
        assert_eq!(set.get("trailing_minute").unwrap().algorithm(), AlgorithmKind::SlidingWindow);
        assert_eq!(
            set.get("login").unwrap().kind,
            PolicyKind::TokenBucket { capacity: 10, rate: 0.5 }
        );
        assert_eq!(
            set.get("uploads").unwrap().kind,
            PolicyKind::LeakyBucket { capacity: 5, rate: 1.0 }
        );
        assert!(set.get("missing").is_none());
    }

    #[test]
    fn test_empty_document() {
        let set = PolicySet::from_yaml("policies: []").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_invalid_policy_in_file() {
        let yaml = r#"
policies:
  - id: broken
    algorithm: token_bucket
    capacity: 0
    rate: 1
"#;
        let result = PolicySet::from_yaml(yaml);
        assert!(matches!(result, Err(FloodgateError::InvalidPolicy(_))));
    }

    #[test]
    fn test_unknown_algorithm_is_config_error() {
        let yaml = r#"
policies:
  - id: odd
    algorithm: gcra
    limit: 1
"#;
        let result = PolicySet::from_yaml(yaml);
        assert!(matches!(result, Err(FloodgateError::Config(_))));
    }

    #[test]
    fn test_negative_limit_is_config_error() {
        let yaml = r#"
policies:
  - id: neg
    algorithm: fixed_window
    limit: -1
    window_ms: 1000
"#;
        assert!(matches!(PolicySet::from_yaml(yaml), Err(FloodgateError::Config(_))));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = PolicySet::new(vec![
            Policy::token_bucket("api", 1, 1.0),
            Policy::leaky_bucket("api", 1, 1.0),
        ]);
        assert!(matches!(result, Err(FloodgateError::InvalidPolicy(_))));
    }

    #[test]
    fn test_from_missing_file() {
        let result = PolicySet::from_file("/nonexistent/floodgate/policies.yaml");
        assert!(matches!(result, Err(FloodgateError::Io(_))));
    }
}
