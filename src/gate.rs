//! HTTP middleware that puts a rate limit in front of axum handlers.
//!
//! ```rust,ignore
//! let gate = Gate::new(limiter.clone(), "5/minute")?;
//! let app = Router::new()
//!     .route("/slow", get(slow))
//!     .route_layer(middleware::from_fn_with_state(gate, enforce::<RedisStore>));
//! ```

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{error, warn};

use crate::config::FailurePolicy;
use crate::error::Result;
use crate::ratelimit::{Decision, LimitSpec, RateLimiter};
use crate::store::CounterStore;

/// Caller identity used when the server was not started with peer addresses.
const UNKNOWN_CALLER: &str = "unknown";

/// A rate limit bound to a group of routes.
///
/// The limit string is validated when the gate is built, so an invalid
/// limit stops route registration instead of failing requests.
pub struct Gate<S: CounterStore> {
    limiter: RateLimiter<S>,
    spec: LimitSpec,
    failure_policy: FailurePolicy,
}

impl<S: CounterStore> Clone for Gate<S> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            spec: self.spec,
            failure_policy: self.failure_policy,
        }
    }
}

impl<S: CounterStore> Gate<S> {
    /// Create a gate enforcing `limit` (e.g. `100/hour`).
    pub fn new(limiter: RateLimiter<S>, limit: &str) -> Result<Self> {
        Ok(Self {
            limiter,
            spec: LimitSpec::parse(limit)?,
            failure_policy: FailurePolicy::default(),
        })
    }

    /// Choose what happens to requests when the counter store fails.
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn spec(&self) -> &LimitSpec {
        &self.spec
    }
}

/// Middleware for [`axum::middleware::from_fn_with_state`].
///
/// Route identity is the matched route pattern and caller identity is the
/// peer IP from [`ConnectInfo`]. The inner handler runs only when the
/// limiter admits the request, or when the store fails under
/// [`FailurePolicy::Open`].
pub async fn enforce<S: CounterStore + 'static>(
    State(gate): State<Gate<S>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let caller = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CALLER.to_string());

    match gate.limiter.check_request(&route, &caller, &gate.spec).await {
        Ok(Decision::Allowed { .. }) => next.run(request).await,
        Ok(Decision::QuotaExceeded { .. }) => {
            rejection(StatusCode::TOO_MANY_REQUESTS, "rate limit reached")
        }
        Err(e) => match gate.failure_policy {
            FailurePolicy::Closed => {
                error!(route = %route, caller = %caller, error = %e, "Rate limit check failed, rejecting request");
                rejection(StatusCode::INTERNAL_SERVER_ERROR, "something went wrong")
            }
            FailurePolicy::Open => {
                warn!(route = %route, caller = %caller, error = %e, "Rate limit check failed, admitting request");
                next.run(request).await
            }
        },
    }
}

fn rejection(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
