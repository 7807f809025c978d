use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_FEED_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";
pub const DEFAULT_TABLE_NAME: &str = "earthquake_minute";

/// Destination table identity. Validated at construction because the name is
/// interpolated into DDL and DML statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> Result<Self, ConfigError> {
        let mut chars = name.chars();
        let head_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if head_ok && tail_ok {
            Ok(Self(name.to_string()))
        } else {
            Err(ConfigError::InvalidTableName {
                name: name.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upstream feed endpoint and filter settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub endpoint: String,
    pub min_magnitude: Option<f64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_FEED_URL.to_string(),
            min_magnitude: None,
        }
    }
}

/// Destination database path and table.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: String,
    pub table: TableName,
}

/// Poll cadence. The lookback window is deliberately wider than the poll
/// interval so upstream publication latency and short outages do not lose
/// events; the store's dedup absorbs the overlap.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub lookback: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, lookback: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidDuration {
                message: "poll interval must be nonzero".to_string(),
            });
        }
        if lookback.is_zero() {
            return Err(ConfigError::InvalidDuration {
                message: "lookback must be nonzero".to_string(),
            });
        }
        Ok(Self { interval, lookback })
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            lookback: Duration::from_secs(300),
        }
    }
}

/// Startup connectivity gate: how long to wait for the destination store.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay: Duration::from_secs(5),
        }
    }
}
