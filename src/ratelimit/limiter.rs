//! Core rate limiter implementation.

use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use super::key::CounterKey;
use super::spec::LimitSpec;
use crate::config::Enforcement;
use crate::error::{Result, TollgateError};
use crate::store::CounterStore;

/// Outcome of a rate limit check that reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request is within quota; `count` is the counter after admitting it.
    Allowed { count: u64 },
    /// The quota for the current window is used up.
    QuotaExceeded { count: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Allow/deny outcome of one check, with the failure reason if the check
/// itself failed.
#[derive(Debug)]
pub struct Verdict {
    pub allowed: bool,
    pub error: Option<TollgateError>,
}

impl From<Result<Decision>> for Verdict {
    fn from(result: Result<Decision>) -> Self {
        match result {
            Ok(decision) => Verdict {
                allowed: decision.is_allowed(),
                error: None,
            },
            Err(e) => Verdict {
                allowed: false,
                error: Some(e),
            },
        }
    }
}

/// Fixed-window rate limiter over a shared [`CounterStore`].
///
/// Holds no counters of its own, so any number of instances pointed at the
/// same store enforce the same quotas. Cloning is cheap.
pub struct RateLimiter<S: CounterStore> {
    store: Arc<S>,
    enforcement: Enforcement,
}

impl<S: CounterStore> Clone for RateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            enforcement: self.enforcement,
        }
    }
}

impl<S: CounterStore> RateLimiter<S> {
    /// Create a rate limiter using the approximate (read-then-write) protocol.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_enforcement(store, Enforcement::default())
    }

    /// Create a rate limiter with an explicit enforcement mode.
    pub fn with_enforcement(store: Arc<S>, enforcement: Enforcement) -> Self {
        Self { store, enforcement }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn enforcement(&self) -> Enforcement {
        self.enforcement
    }

    /// Build the counter key for a request and check it.
    pub async fn check_request(
        &self,
        route: &str,
        caller: &str,
        spec: &LimitSpec,
    ) -> Result<Decision> {
        let key = CounterKey::new(route, caller, spec);
        self.check(&key, spec).await
    }

    /// Check the rate limit for `key`, counting this request if admitted.
    ///
    /// An `Err` means the store could not be consulted; it is never used for
    /// a plain quota denial.
    pub async fn check(&self, key: &CounterKey, spec: &LimitSpec) -> Result<Decision> {
        debug!(key = %key, limit = %spec, "Checking rate limit");

        if spec.quota() == 0 {
            info!(key = %key, "Rate limit reached");
            return Ok(Decision::QuotaExceeded { count: 0 });
        }

        let result = match self.enforcement {
            Enforcement::Approximate => self.check_approximate(key, spec).await,
            Enforcement::Strict => self.check_strict(key, spec).await,
        };

        match &result {
            Ok(Decision::QuotaExceeded { count }) => {
                info!(key = %key, count = *count, "Rate limit reached");
            }
            Ok(Decision::Allowed { count }) => {
                trace!(key = %key, count = *count, "Request admitted");
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Rate limit check failed");
            }
        }

        result
    }

    /// GET, then SET on a fresh window or INCR while under quota.
    ///
    /// Racing requests on one key can all observe `count < quota` before any
    /// of them increments, so a window may admit more than `quota` requests.
    async fn check_approximate(&self, key: &CounterKey, spec: &LimitSpec) -> Result<Decision> {
        let window = spec.window().duration();

        let Some(raw) = self.store.get(key.as_str()).await? else {
            self.store.set(key.as_str(), 1, window).await?;
            return Ok(Decision::Allowed { count: 1 });
        };

        let count: u64 = raw.parse().map_err(|_| {
            TollgateError::StoreDataCorrupt(format!("counter {key} holds {raw:?}"))
        })?;

        if count >= spec.quota() {
            return Ok(Decision::QuotaExceeded { count });
        }

        let count = self.store.incr(key.as_str()).await?;
        if count == 1 {
            // The window expired between GET and INCR; INCR recreated the key without a TTL.
            self.store.expire(key.as_str(), window).await?;
        }

        Ok(Decision::Allowed { count })
    }

    /// Atomic increment-and-start-window, then compare.
    async fn check_strict(&self, key: &CounterKey, spec: &LimitSpec) -> Result<Decision> {
        let count = self
            .store
            .incr_with_expiry(key.as_str(), spec.window().duration())
            .await?;

        if count <= spec.quota() {
            Ok(Decision::Allowed { count })
        } else {
            Ok(Decision::QuotaExceeded { count })
        }
    }
}
