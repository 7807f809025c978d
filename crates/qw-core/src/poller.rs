use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::PollConfig;
use crate::error::QuakewatchError;
use crate::feed::{FeedSource, FeedWindow};
use crate::store::EventStore;

/// Drives fetch-then-persist cycles on a fixed interval.
///
/// Cycles never overlap: one runs to completion (or failure) before the next
/// tick fires. A cycle error is logged and absorbed at this boundary so the
/// loop survives indefinitely; only cancellation ends it.
pub struct Poller<F, S> {
    feed: F,
    store: S,
    config: PollConfig,
}

impl<F, S> Poller<F, S>
where
    F: FeedSource,
    S: EventStore,
{
    pub fn new(feed: F, store: S, config: PollConfig) -> Self {
        if config.lookback < config.interval {
            warn!(
                lookback_secs = config.lookback.as_secs(),
                interval_secs = config.interval.as_secs(),
                "lookback narrower than poll interval; events may be missed"
            );
        }
        Self {
            feed,
            store,
            config,
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("shutdown requested, stopping poller");
                    return;
                }
                _ = interval.tick() => {}
            }
            if let Err(err) = self.cycle().await {
                error!(error = %err, "cycle failed");
            }
        }
    }

    /// One fetch-then-persist pass. Shared by the steady-state loop and the
    /// one-shot subcommand.
    pub async fn cycle(&self) -> Result<(), QuakewatchError> {
        let window = FeedWindow::ending_at(Utc::now(), self.config.lookback);
        let events = self.feed.fetch(&window).await?;
        if events.is_empty() {
            info!(fetched = 0, "no events in window");
            return Ok(());
        }
        let inserted = self.store.append(&events)?;
        info!(
            fetched = events.len(),
            inserted,
            deduped = events.len() - inserted,
            "cycle complete"
        );
        Ok(())
    }
}
