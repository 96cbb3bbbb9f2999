use chrono::{DateTime, Utc};
use cron::Schedule;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::services::shop_sync::ShopSynchronizer;

/// Cron-driven trigger for the shop synchronizer. Runs are awaited in the
/// loop, so a slow run delays the next trigger instead of overlapping it.
pub struct ShopSyncScheduler {
    schedule: Schedule,
    synchronizer: Arc<ShopSynchronizer>,
}

impl ShopSyncScheduler {
    pub fn new(schedule: Schedule, synchronizer: Arc<ShopSynchronizer>) -> Self {
        Self {
            schedule,
            synchronizer,
        }
    }

    /// Time left until the next trigger after `now`, or `None` if the
    /// expression has no upcoming instant.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        let next = self.schedule.after(&now).next()?;
        Some((next - now).to_std().unwrap_or(Duration::ZERO))
    }

    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("Shop sync scheduler started");

        loop {
            let Some(delay) = self.next_delay(Utc::now()) else {
                tracing::warn!("Cron expression has no upcoming trigger, scheduler stopping");
                break;
            };
            tracing::debug!(delay_secs = delay.as_secs(), "Next shop synchronization scheduled");

            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(delay) => {}
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.synchronizer.retrieve_updated_shops() => {}
            }
        }

        tracing::info!("Shop sync scheduler stopped");
    }
}
