//! In-process atomic store backed by a sharded concurrent map.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use super::{AtomicStore, Transaction};
use crate::clock::{Clock, SystemClock};
use crate::error::{FloodgateError, Result};
use crate::ratelimit::Decision;

/// Writes between two sweeps of expired records.
const SWEEP_INTERVAL: u64 = 1024;

/// A stored record and its absolute expiry in clock milliseconds.
#[derive(Debug, Clone)]
struct Record {
    value: String,
    expires_at: u64,
}

impl Record {
    fn new(value: String, ttl: Duration, now: u64) -> Self {
        Self {
            value,
            expires_at: now.saturating_add(ttl.as_millis() as u64),
        }
    }

    fn is_live(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

/// An [`AtomicStore`] that keeps records in a `DashMap`.
///
/// A transaction runs while the map holds the write lock for the key's shard, so
/// transactions on the same key are linearizable. Expiry is evaluated lazily against the
/// store's clock: an expired record reads as absent and is replaced on the next write.
///
/// Every 1024 writes the store also drops all expired records, so the map
/// holds at most the live records plus the keys written since the last sweep.
#[derive(Debug)]
pub struct MemoryStore {
    records: DashMap<String, Record>,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    /// Create a store that expires records against the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Create a store that expires records against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
            closed: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Read the live raw record for a key without mutating it.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now_millis();
        self.records
            .get(key)
            .filter(|record| record.is_live(now))
            .map(|record| record.value.clone())
    }

    /// Number of records held, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every expired record and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.records.len();
        self.records.retain(|_, record| record.is_live(now));
        let purged = before.saturating_sub(self.records.len());
        if purged > 0 {
            debug!(purged = purged, "Purged expired limiter records");
        }
        purged
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FloodgateError::StoreUnavailable(
                "memory store is closed".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AtomicStore for MemoryStore {
    async fn execute_atomic(&self, key: &str, transaction: Transaction<'_>) -> Result<Decision> {
        self.ensure_open()?;
        let now = self.clock.now_millis();

        // The entry guard holds the shard lock until the new record is written.
        let decision = match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let commit = {
                    let record = occupied.get();
                    let current = record.is_live(now).then_some(record.value.as_str());
                    transaction(current)?
                };
                trace!(key = %key, ttl_ms = commit.ttl.as_millis() as u64, "Updating record");
                occupied.insert(Record::new(commit.state, commit.ttl, now));
                commit.decision
            }
            Entry::Vacant(vacant) => {
                let commit = transaction(None)?;
                trace!(key = %key, ttl_ms = commit.ttl.as_millis() as u64, "Creating record");
                vacant.insert(Record::new(commit.state, commit.ttl, now));
                commit.decision
            }
        };

        // The sweep locks every shard, so it must run after the entry guard is dropped.
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.purge_expired();
        }
        Ok(decision)
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        let now = self.clock.now_millis();
        if let Some(mut record) = self.records.get_mut(key) {
            if record.is_live(now) {
                record.expires_at = now.saturating_add(ttl.as_millis() as u64);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        debug!(records = self.records.len(), "Memory store closed");
        Ok(())
    }
}
