//! Atomic state store abstraction.
//!
//! Every limiter mutation goes through [`AtomicStore::execute_atomic`]: the store hands
//! the current raw record for a key to a transaction closure and persists whatever the
//! closure returns, with no other transaction on the same key interleaving. Any
//! mechanism with that guarantee (entry locks, server-side scripts, versioned
//! compare-and-swap) can back the trait.

mod memory;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::ratelimit::Decision;

pub use memory::MemoryStore;

/// A read-compute-write step run by the store under its per-key atomicity guarantee.
///
/// The argument is the raw persisted state, or `None` when the key is absent or expired.
/// Returning an error aborts the transaction without touching the stored record.
pub type Transaction<'a> = Box<dyn FnOnce(Option<&str>) -> Result<Commit> + Send + 'a>;

/// The outcome of a transaction: the record to persist and the decision to hand back.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    /// New raw state for the key
    pub state: String,
    /// Expiry applied alongside the write
    pub ttl: Duration,
    /// Admission decision returned to the caller
    pub decision: Decision,
}

impl Commit {
    /// Create a new commit.
    pub fn new(state: String, ttl: Duration, decision: Decision) -> Self {
        Self {
            state,
            ttl,
            decision,
        }
    }
}

/// Store offering per-key atomic transactions with expiry.
#[async_trait]
pub trait AtomicStore: Send + Sync + Debug {
    /// Run `transaction` against the record stored under `key` as one indivisible unit.
    ///
    /// Fails with `StoreUnavailable` when the store cannot execute the transaction.
    async fn execute_atomic(&self, key: &str, transaction: Transaction<'_>) -> Result<Decision>;

    /// Reset the expiry of an existing record. Absent keys are left absent.
    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Release the store. Later operations fail with `StoreUnavailable`.
    async fn close(&self) -> Result<()>;
}
