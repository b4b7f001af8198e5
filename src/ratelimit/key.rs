//! Counter key generation.

use std::fmt;

use super::spec::LimitSpec;

/// A key that uniquely identifies one rate limit counter.
///
/// The key is composed of the route pattern, the caller address and the
/// limit, so two limits on the same route are counted independently.
/// Delimiters inside the route or caller are not escaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey(String);

impl CounterKey {
    /// Build the key for a route, caller and limit.
    pub fn new(route: &str, caller: &str, spec: &LimitSpec) -> Self {
        Self(format!(
            "path:{};ip:{};quota:{};duration:{}s",
            route,
            caller,
            spec.quota(),
            spec.window().duration().as_secs()
        ))
    }

    /// The key as stored in the counter store.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
