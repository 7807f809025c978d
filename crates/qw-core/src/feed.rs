use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::event::Event;

/// Half-open UTC interval `[start, end)` requested per fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FeedWindow {
    pub fn ending_at(end: DateTime<Utc>, lookback: Duration) -> Self {
        Self {
            start: end - lookback,
            end,
        }
    }
}

/// One time-windowed batch fetch against the upstream feed.
///
/// An empty `Vec` is a valid outcome (no events in the window) and is
/// distinct from a fetch failure. Implementations perform no retry; the
/// poll loop decides recovery.
#[async_trait]
pub trait FeedSource {
    async fn fetch(&self, window: &FeedWindow) -> Result<Vec<Event>, FetchError>;
}
