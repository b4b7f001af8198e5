//! Shared counter store abstraction.
//!
//! The rate limiter never keeps counters in-process. All state lives in a
//! [`CounterStore`], which is expected to be shared by every instance of the
//! service so that a quota holds across the whole fleet.

mod memory;
mod redis;
#[cfg(test)]
pub(crate) mod testing;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for counter store implementations.
///
/// Implementations report transport failures as
/// [`TollgateError::StoreUnavailable`](crate::error::TollgateError::StoreUnavailable).
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the raw value of `key`, or `None` if it is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Create or overwrite `key` with `value`, expiring after `expiry`.
    async fn set(&self, key: &str, value: u64, expiry: Duration) -> Result<()>;

    /// Atomically increment `key` by one and return the new value.
    ///
    /// The expiry of an existing key is left untouched. A missing key is
    /// created with value 1 and no expiry.
    async fn incr(&self, key: &str) -> Result<u64>;

    /// Set the expiry of an existing key.
    async fn expire(&self, key: &str, expiry: Duration) -> Result<()>;

    /// Atomically increment `key` and, if this created it, set its expiry.
    async fn incr_with_expiry(&self, key: &str, expiry: Duration) -> Result<u64>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()>;
}
