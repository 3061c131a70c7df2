use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::cache::ReloadCache;

/// Background task that empties the reload cache once per interval.
///
/// The first invalidation happens one full interval after start. A
/// cancelled token ends the loop without a final invalidation.
#[derive(Debug, Clone)]
pub struct CacheInvalidationScheduler {
    cache: Arc<ReloadCache>,
    interval: Duration,
}

impl CacheInvalidationScheduler {
    pub fn new(cache: Arc<ReloadCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Reload cache scheduler started"
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Reload cache scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {
                    let dropped = self.cache.invalidate_all();
                    info!(
                        dropped,
                        generation = self.cache.generation(),
                        "Reload cache invalidated"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(3600);

    fn scheduler() -> (Arc<ReloadCache>, CacheInvalidationScheduler) {
        let cache = Arc::new(ReloadCache::new("/nonexistent"));
        let scheduler = CacheInvalidationScheduler::new(cache.clone(), INTERVAL);
        (cache, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn first_invalidation_waits_a_full_interval() {
        let (cache, scheduler) = scheduler();
        let token = CancellationToken::new();
        let handle = scheduler.spawn(token.clone());

        tokio::time::sleep(INTERVAL - Duration::from_secs(1)).await;
        assert_eq!(cache.generation(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cache.generation(), 1);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(cache.generation(), 2);

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_without_final_invalidation() {
        let (cache, scheduler) = scheduler();
        let token = CancellationToken::new();
        let handle = scheduler.spawn(token.clone());

        tokio::time::sleep(INTERVAL / 2).await;
        token.cancel();
        handle.await.unwrap();
        assert_eq!(cache.generation(), 0);

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(cache.generation(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_token_exits_immediately() {
        let (cache, scheduler) = scheduler();
        let token = CancellationToken::new();
        token.cancel();

        scheduler.run(token).await;
        assert_eq!(cache.generation(), 0);
    }
}
