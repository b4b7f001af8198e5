//! Limit string parsing.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TollgateError};

/// Time window for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    /// Per-second rate limiting
    Second,
    /// Per-minute rate limiting
    Minute,
    /// Per-hour rate limiting
    Hour,
}

impl TimeWindow {
    /// Get the duration of this time window.
    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::Second => Duration::from_secs(1),
            TimeWindow::Minute => Duration::from_secs(60),
            TimeWindow::Hour => Duration::from_secs(3600),
        }
    }

    /// The unit token used in limit strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Second => "second",
            TimeWindow::Minute => "minute",
            TimeWindow::Hour => "hour",
        }
    }

    /// Parse a unit token. Case-sensitive, singular only.
    pub fn from_unit(unit: &str) -> Option<Self> {
        match unit {
            "second" => Some(TimeWindow::Second),
            "minute" => Some(TimeWindow::Minute),
            "hour" => Some(TimeWindow::Hour),
            _ => None,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `<quota>/<unit>` limit.
///
/// A quota of zero is accepted and denies every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LimitSpec {
    quota: u64,
    window: TimeWindow,
}

impl LimitSpec {
    /// Create a limit directly from its parts.
    pub fn new(quota: u64, window: TimeWindow) -> Self {
        Self { quota, window }
    }

    /// Parse a limit string such as `5/minute`.
    ///
    /// No whitespace is trimmed and the quota must be plain ASCII digits.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || TollgateError::InvalidSpec(spec.to_string());

        let mut fields = spec.split('/');
        let (quota, unit) = match (fields.next(), fields.next(), fields.next()) {
            (Some(quota), Some(unit), None) => (quota, unit),
            _ => return Err(invalid()),
        };

        if quota.is_empty() || !quota.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let quota = quota.parse::<u64>().map_err(|_| invalid())?;
        let window = TimeWindow::from_unit(unit).ok_or_else(invalid)?;

        Ok(Self { quota, window })
    }

    /// Maximum admitted requests per window.
    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// The window this quota applies to.
    pub fn window(&self) -> TimeWindow {
        self.window
    }
}

impl FromStr for LimitSpec {
    type Err = TollgateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for LimitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.quota, self.window)
    }
}

impl Serialize for LimitSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LimitSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        LimitSpec::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_window_duration() {
        assert_eq!(TimeWindow::Second.duration(), Duration::from_secs(1));
        assert_eq!(TimeWindow::Minute.duration(), Duration::from_secs(60));
        assert_eq!(TimeWindow::Hour.duration(), Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_valid_limits() {
        let cases = [
            ("10/second", 10, TimeWindow::Second),
            ("5/minute", 5, TimeWindow::Minute),
            ("100/hour", 100, TimeWindow::Hour),
            ("0/hour", 0, TimeWindow::Hour),
            ("007/second", 7, TimeWindow::Second),
        ];

        for (input, quota, window) in cases {
            let spec = LimitSpec::parse(input).unwrap();
            assert_eq!(spec.quota(), quota, "{input}");
            assert_eq!(spec.window(), window, "{input}");
        }
    }

    #[test]
    fn test_parse_invalid_limits() {
        let cases = [
            "10",
            "abc/second",
            "10/day",
            "10/Second",
            "10/seconds",
            "10/minute/extra",
            "/minute",
            "10/",
            "",
            " 10/second",
            "10/second ",
            "-1/second",
            "+5/second",
            "1.5/second",
            "99999999999999999999999/second",
        ];

        for input in cases {
            match LimitSpec::parse(input) {
                Err(TollgateError::InvalidSpec(original)) => assert_eq!(original, input),
                other => panic!("expected InvalidSpec for {input:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_display_matches_source() {
        let spec: LimitSpec = "2/minute".parse().unwrap();
        assert_eq!(spec.to_string(), "2/minute");
    }

    #[test]
    fn test_deserialize_from_string() {
        let spec: LimitSpec = serde_yaml::from_str("\"100/second\"").unwrap();
        assert_eq!(spec, LimitSpec::new(100, TimeWindow::Second));

        let err = serde_yaml::from_str::<LimitSpec>("\"100/day\"").unwrap_err();
        assert!(err.to_string().contains("invalid limit string"));
    }
}
