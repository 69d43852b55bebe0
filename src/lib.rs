//! Floodgate - Atomic Admission Control
//!
//! This crate decides, per traffic key and policy, whether to admit an event right now.
//! Limiter state lives in a shared [`store::AtomicStore`], and every decision is one
//! atomic read-compute-write transaction against it, so any number of limiter instances
//! can enforce the same policy without losing updates to each other.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use floodgate::clock::SystemClock;
//! use floodgate::ratelimit::{Policy, RateLimiter};
//! use floodgate::store::MemoryStore;
//!
//! # tokio_test::block_on(async {
//! let limiter = RateLimiter::new(
//!     Policy::sliding_window("search", 2, Duration::from_secs(60))?,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(SystemClock::new()),
//! )?;
//!
//! assert!(limiter.allow_one("10.0.0.1").await?.admitted);
//! assert!(limiter.allow("10.0.0.1", 1).await?.admitted);
//! assert!(!limiter.allow_one("10.0.0.1").await?.admitted);
//! # Ok::<(), floodgate::error::FloodgateError>(())
//! # }).unwrap();
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod store;
