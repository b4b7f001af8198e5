//! Store doubles for unit tests.

use std::time::Duration;

use async_trait::async_trait;

use super::{CounterStore, MemoryStore};
use crate::error::{Result, TollgateError};

fn refused() -> TollgateError {
    TollgateError::StoreUnavailable("connection refused".into())
}

/// A store whose every operation fails as if the server were down.
pub(crate) struct DownStore;

#[async_trait]
impl CounterStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(refused())
    }

    async fn set(&self, _key: &str, _value: u64, _expiry: Duration) -> Result<()> {
        Err(refused())
    }

    async fn incr(&self, _key: &str) -> Result<u64> {
        Err(refused())
    }

    async fn expire(&self, _key: &str, _expiry: Duration) -> Result<()> {
        Err(refused())
    }

    async fn incr_with_expiry(&self, _key: &str, _expiry: Duration) -> Result<u64> {
        Err(refused())
    }

    async fn ping(&self) -> Result<()> {
        Err(refused())
    }
}

/// Store operations that [`FlakyStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Set,
    Incr,
    Expire,
}

/// A [`MemoryStore`] whose `failing` operation drops the connection while
/// every other operation succeeds.
pub(crate) struct FlakyStore {
    pub(crate) inner: MemoryStore,
    failing: Op,
}

impl FlakyStore {
    pub(crate) fn failing(op: Op) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: op,
        }
    }

    fn check(&self, op: Op) -> Result<()> {
        if self.failing == op {
            Err(refused())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CounterStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: u64, expiry: Duration) -> Result<()> {
        self.check(Op::Set)?;
        self.inner.set(key, value, expiry).await
    }

    async fn incr(&self, key: &str) -> Result<u64> {
        self.check(Op::Incr)?;
        self.inner.incr(key).await
    }

    async fn expire(&self, key: &str, expiry: Duration) -> Result<()> {
        self.check(Op::Expire)?;
        self.inner.expire(key, expiry).await
    }

    async fn incr_with_expiry(&self, key: &str, expiry: Duration) -> Result<u64> {
        self.check(Op::Incr)?;
        self.inner.incr_with_expiry(key, expiry).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}
