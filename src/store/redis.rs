//! Redis-backed counter store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ErrorKind, RedisError, RedisResult, Script};
use tracing::{debug, info, warn};

use super::CounterStore;
use crate::config::StoreConfig;
use crate::error::{Result, TollgateError};

/// Increment a key and start its expiry if the increment created it.
const INCR_WITH_EXPIRY: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// A [`CounterStore`] backed by a shared Redis server.
///
/// Holds one multiplexed connection for the life of the process; clones of
/// the underlying manager share it.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    operation_timeout: Duration,
    incr_script: Script,
}

impl RedisStore {
    /// Connect to the Redis server described by `config` and verify it with `PING`.
    ///
    /// The URL carries the address, credentials, database index and protocol,
    /// e.g. `redis://:password@localhost:6379/0?protocol=resp3`.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| TollgateError::Config(format!("failed to parse Redis URL: {e}")))?;

        let conn = tokio::time::timeout(config.connect_timeout(), ConnectionManager::new(client))
            .await
            .map_err(|_| {
                TollgateError::StoreUnavailable(format!(
                    "timed out after {:?} connecting to Redis",
                    config.connect_timeout()
                ))
            })?
            .map_err(|e| {
                TollgateError::StoreUnavailable(format!("failed to connect to Redis: {e}"))
            })?;

        let store = Self {
            conn,
            operation_timeout: config.operation_timeout(),
            incr_script: Script::new(INCR_WITH_EXPIRY),
        };
        store.ping().await?;

        info!(timeout = ?config.operation_timeout(), "Connected to Redis counter store");
        Ok(store)
    }

    /// Run one store round-trip under the operation timeout.
    async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(op, error = %e, "Redis command failed");
                Err(map_redis_error(e))
            }
            Err(_) => {
                warn!(op, timeout = ?self.operation_timeout, "Redis command timed out");
                Err(TollgateError::StoreUnavailable(format!(
                    "{op} timed out after {:?}",
                    self.operation_timeout
                )))
            }
        }
    }
}

/// Replies that mean the key holds something other than a counter are
/// `StoreDataCorrupt`; everything else is treated as the store being unusable.
fn map_redis_error(e: RedisError) -> TollgateError {
    if is_bad_counter(&e) {
        TollgateError::StoreDataCorrupt(e.to_string())
    } else {
        TollgateError::StoreUnavailable(e.to_string())
    }
}

fn is_bad_counter(e: &RedisError) -> bool {
    match e.kind() {
        ErrorKind::TypeError => true,
        // INCR on a non-integer string: `ERR value is not an integer or out of range`
        ErrorKind::ResponseError => e.detail().is_some_and(|d| d.contains("not an integer")),
        _ => e.code() == Some("WRONGTYPE"),
    }
}

fn millis(expiry: Duration) -> u64 {
    expiry.as_millis().try_into().unwrap_or(u64::MAX)
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.run("GET", conn.get(key)).await
    }

    async fn set(&self, key: &str, value: u64, expiry: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("PX").arg(millis(expiry));
        self.run("SET", cmd.query_async(&mut conn)).await
    }

    async fn incr(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("INCR", conn.incr(key, 1u64)).await
    }

    async fn expire(&self, key: &str, expiry: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("PEXPIRE");
        cmd.arg(key).arg(millis(expiry));
        let _: i64 = self.run("PEXPIRE", cmd.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn incr_with_expiry(&self, key: &str, expiry: Duration) -> Result<u64> {
        let mut conn = self.conn.clone();
        debug!(key, "Running atomic increment script");
        self.run(
            "EVALSHA",
            self.incr_script
                .key(key)
                .arg(millis(expiry))
                .invoke_async(&mut conn),
        )
        .await
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let cmd = redis::cmd("PING");
        let _: String = self.run("PING", cmd.query_async(&mut conn)).await?;
        Ok(())
    }
}
