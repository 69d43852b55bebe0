//! The seam shared by the four admission algorithms.

use std::fmt::Debug;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::fixed_window::FixedWindow;
use super::leaky_bucket::LeakyBucket;
use super::policy::{AlgorithmKind, PolicyKind};
use super::sliding_window::SlidingWindow;
use super::token_bucket::TokenBucket;
use crate::error::{FloodgateError, Result};
use crate::store::Commit;

/// One admission algorithm.
///
/// `apply` is the read-compute-write step the store runs atomically for a key: it gets
/// the raw persisted state (or `None`), the caller's timestamp and cost, and produces the
/// new state, its expiry and the decision. It must not perform I/O.
pub trait Algorithm: Send + Sync + Debug {
    /// Which algorithm this is.
    fn kind(&self) -> AlgorithmKind;

    /// Compute the next state and decision from the current raw state.
    fn apply(&self, current: Option<&str>, now: u64, cost: u64) -> Result<Commit>;
}

/// Build the algorithm for an already validated policy kind.
pub(crate) fn from_kind(kind: &PolicyKind) -> Box<dyn Algorithm> {
    match *kind {
        PolicyKind::FixedWindow { limit, window_ms } => Box::new(FixedWindow::new(limit, window_ms)),
        PolicyKind::SlidingWindow { limit, window_ms } => {
            Box::new(SlidingWindow::new(limit, window_ms))
        }
        PolicyKind::TokenBucket { capacity, rate } => Box::new(TokenBucket::new(capacity, rate)),
        PolicyKind::LeakyBucket { capacity, rate } => Box::new(LeakyBucket::new(capacity, rate)),
    }
}

/// Decode a persisted state record.
pub(crate) fn decode<T: DeserializeOwned>(raw: Option<&str>) -> Result<Option<T>> {
    raw.map(|raw| {
        serde_json::from_str(raw).map_err(|e| FloodgateError::CorruptState(e.to_string()))
    })
    .transpose()
}

/// Encode a state record for the store.
pub(crate) fn encode<T: Serialize>(state: &T) -> Result<String> {
    serde_json::to_string(state).map_err(|e| FloodgateError::CorruptState(e.to_string()))
}

/// Milliseconds needed to move `amount` units at `rate` units per second, rounded up.
pub(crate) fn millis_for(amount: f64, rate: f64) -> Duration {
    let millis = (amount * 1000.0 / rate).ceil();
    // Float to int casts saturate, so tiny rates cap out instead of wrapping.
    Duration::from_millis(millis.max(1.0) as u64)
}

/// Whole units accrued over `elapsed_ms` at `rate` units per second.
///
/// The product is nudged up by a few ulps before flooring, so a rate such as 1.15/s
/// accrues exactly 115 units over 100s instead of 114.999... floored to 114.
pub(crate) fn accrued(elapsed_ms: u64, rate: f64) -> f64 {
    let units = elapsed_ms as f64 * rate / 1000.0;
    (units + units.abs() * f64::EPSILON * 4.0).floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        n: u64,
    }

    #[test]
    fn test_decode_absent_state() {
        assert_eq!(decode::<Sample>(None).unwrap(), None);
    }

    #[test]
    fn test_decode_corrupt_state() {
        let result = decode::<Sample>(Some("{not json"));
        assert!(matches!(result, Err(FloodgateError::CorruptState(_))));
    }

    #[test]
    fn test_encode_then_decode() {
        let raw = encode(&Sample { n: 7 }).unwrap();
        assert_eq!(decode::<Sample>(Some(&raw)).unwrap(), Some(Sample { n: 7 }));
    }

    #[test]
    fn test_accrued_floors() {
        assert_eq!(accrued(5_000, 1.0), 5.0);
        assert_eq!(accrued(999, 1.0), 0.0);
        assert_eq!(accrued(1_500, 2.0), 3.0);
    }

    #[test]
    fn test_accrued_absorbs_float_error() {
        // Every rate with two decimals accrues exactly `rate × 100` units over 100s.
        for hundredths in 1..500u64 {
            let rate = hundredths as f64 / 100.0;
            assert_eq!(accrued(100_000, rate), hundredths as f64, "rate {}", rate);
        }
        assert_eq!(accrued(99_999, 1.0), 99.0);
    }

    #[test]
    fn test_millis_for_rounds_up() {
        assert_eq!(millis_for(1.0, 1.0), Duration::from_millis(1_000));
        assert_eq!(millis_for(1.0, 3.0), Duration::from_millis(334));
        assert_eq!(millis_for(10.0, 1e-300), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_from_kind_selects_algorithm() {
        let kinds = [
            (PolicyKind::FixedWindow { limit: 1, window_ms: 1 }, AlgorithmKind::FixedWindow),
            (PolicyKind::SlidingWindow { limit: 1, window_ms: 1 }, AlgorithmKind::SlidingWindow),
            (PolicyKind::TokenBucket { capacity: 1, rate: 1.0 }, AlgorithmKind::TokenBucket),
            (PolicyKind::LeakyBucket { capacity: 1, rate: 1.0 }, AlgorithmKind::LeakyBucket),
        ];
        for (kind, expected) in kinds {
            assert_eq!(from_kind(&kind).kind(), expected);
        }
    }
}
