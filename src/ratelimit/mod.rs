//! Admission algorithms, policies and the limiter facade.

mod algorithm;
mod decision;
mod fixed_window;
mod key;
mod leaky_bucket;
mod limiter;
mod policy;
mod registry;
mod rules;
mod sliding_window;
mod token_bucket;

pub use algorithm::Algorithm;
pub use decision::Decision;
pub use fixed_window::FixedWindow;
pub use key::StateKey;
pub use leaky_bucket::LeakyBucket;
pub use limiter::{FailMode, LimiterOptions, RateLimiter, DEFAULT_KEY_PREFIX};
pub use policy::{AlgorithmKind, Policy, PolicyKind};
pub use registry::LimiterRegistry;
pub use rules::PolicySet;
pub use sliding_window::SlidingWindow;
pub use token_bucket::TokenBucket;
