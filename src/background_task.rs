use std::sync::Arc;

use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::{clock::Clock, limiter::rate_limiter::RateLimitStore};

/// Periodically drops rate-limit records whose window has elapsed.
pub async fn start_purge_task<S>(store: S, clock: Arc<dyn Clock>, every: Duration)
where
    S: RateLimitStore,
{
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; nothing to purge yet.
    interval.tick().await;

    loop {
        interval.tick().await;

        match store.purge_expired(clock.now_ms()).await {
            Ok(0) => {}
            Ok(count) => tracing::debug!("Purged {} expired rate limit records", count),
            Err(e) => tracing::error!("Rate limit purge failed: {}", e),
        }
    }
}
