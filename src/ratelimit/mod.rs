//! Rate limiting logic: limit parsing, counter keys and the decision engine.

mod key;
mod limiter;
mod spec;

pub use key::CounterKey;
pub use limiter::{Decision, RateLimiter, Verdict};
pub use spec::{LimitSpec, TimeWindow};
