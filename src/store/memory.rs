//! In-process counter store.
//!
//! Useful for tests and single-node development. Counters are not shared
//! between processes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::CounterStore;
use crate::error::{Result, TollgateError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// A [`CounterStore`] held in memory, with expiry driven by tokio's clock.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `key` with an arbitrary value and no expiry.
    pub fn insert_raw(&self, key: &str, value: impl Into<String>) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry.
    ///
    /// Reads evict the key they touch; this sweeps keys that are never read
    /// again.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, e| e.is_live(now));
    }

    /// Remaining time before `key` expires, if it has an expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at - now)
    }

    fn increment(&self, key: &str, expiry: Option<Duration>) -> Result<u64> {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });

        if !entry.is_live(now) {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }

        let current: u64 = entry.value.parse().map_err(|_| {
            TollgateError::StoreDataCorrupt(format!("value at {key} is not an integer"))
        })?;
        let next = current.checked_add(1).ok_or_else(|| {
            TollgateError::StoreDataCorrupt(format!("increment would overflow {key}"))
        })?;
        entry.value = next.to_string();

        if next == 1 {
            if let Some(expiry) = expiry {
                entry.expires_at = Some(now + expiry);
            }
        }

        Ok(next)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        if self.entries.remove_if(key, |_, e| !e.is_live(now)).is_some() {
            return Ok(None);
        }
        Ok(self.entries.get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: u64, expiry: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + expiry),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<u64> {
        self.increment(key, None)
    }

    async fn expire(&self, key: &str, expiry: Duration) -> Result<()> {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.is_live(now) {
                entry.expires_at = Some(now + expiry);
            }
        }
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, expiry: Duration) -> Result<u64> {
        self.increment(key, Some(expiry))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
