//! Scheduled maintenance: the retry sweep and the retention sweep.
//!
//! Real-time dispatch covers the happy path; these two passes pick up the
//! rest. The retry sweep re-enqueues recent failures that still have budget
//! (including rows whose task was lost between the store write and the
//! enqueue). The retention sweep deletes failed rows old enough to be noise.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::clock::Clock;
use crate::domain::IdGenerator;
use crate::error::HeraldError;
use crate::queue::{TaskEnvelope, TaskQueue};
use crate::store::NotificationStore;

pub struct Sweeper {
    store: Arc<dyn NotificationStore>,
    queue: Arc<dyn TaskQueue>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,

    /// Failed rows younger than this are re-enqueued.
    retry_window: Duration,

    /// Failed rows older than this are deleted.
    purge_after: Duration,

    /// Cadence of the background loop.
    interval: Duration,
}

impl Sweeper {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        queue: Arc<dyn TaskQueue>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        retry_window: Duration,
        purge_after: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            ids,
            clock,
            retry_window,
            purge_after,
            interval,
        }
    }

    fn cutoff(&self, now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
        now - chrono::Duration::seconds(window.as_secs() as i64)
    }

    /// Re-enqueue every failed notification that still has retry budget and
    /// was created within the retry window. Returns how many were re-queued.
    pub async fn retry_failed_notifications(&self) -> Result<usize, HeraldError> {
        let cutoff = self.cutoff(self.clock.now(), self.retry_window);
        let retryable = self.store.list_retryable(cutoff).await?;

        let mut requeued = 0;
        for record in retryable {
            let envelope =
                TaskEnvelope::new(self.ids.task_id(), record.id, record.channel);
            match self.queue.enqueue(envelope).await {
                Ok(()) => requeued += 1,
                Err(e) => error!(notification = %record.id, "re-enqueue failed: {e}"),
            }
        }

        info!(requeued, "retried failed notifications");
        Ok(requeued)
    }

    /// Delete failed notifications older than the retention window. Returns
    /// how many rows were removed.
    pub async fn cleanup_failed_notifications(&self) -> Result<usize, HeraldError> {
        let cutoff = self.cutoff(self.clock.now(), self.purge_after);
        let removed = self.store.purge_failed_before(cutoff).await?;
        info!(removed, "cleaned up stale failed notifications");
        Ok(removed)
    }

    /// Run both sweeps on the configured interval until shutdown.
    pub fn spawn(self: Arc<Self>) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // The first tick fires immediately; skip it so startup does not
            // race the initial dispatch burst.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.retry_failed_notifications().await {
                            error!("retry sweep failed: {e}");
                        }
                        if let Err(e) = self.cleanup_failed_notifications().await {
                            error!("retention sweep failed: {e}");
                        }
                    }
                }
            }
        });

        SweeperHandle { shutdown_tx, join }
    }
}

/// Handle to the background sweep loop.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown_and_join(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::domain::{
        Channel, ChannelDetail, CustomerId, NotificationId, NotificationRecord, SmsDetail,
        UlidGenerator,
    };
    use crate::queue::{ChannelLimits, InMemoryTaskQueue, RetryPolicy, TaskQueue};
    use crate::store::{InMemoryNotificationStore, NotificationStore};
    use chrono::TimeZone;
    use ulid::Ulid;

    const HOUR: Duration = Duration::from_secs(60 * 60);
    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap()
    }

    struct Fixture {
        store: Arc<InMemoryNotificationStore>,
        queue: Arc<InMemoryTaskQueue>,
        sweeper: Sweeper,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryNotificationStore::new());
        let queue = Arc::new(InMemoryTaskQueue::new(
            RetryPolicy::default(),
            ChannelLimits::default(),
        ));
        let clock = Arc::new(FixedClock::new(now()));
        let sweeper = Sweeper::new(
            store.clone(),
            queue.clone(),
            Arc::new(UlidGenerator::new(*clock)),
            clock,
            DAY,
            7 * DAY,
            Duration::from_secs(900),
        );
        Fixture {
            store,
            queue,
            sweeper,
        }
    }

    async fn seed_failed(
        store: &InMemoryNotificationStore,
        created_at: DateTime<Utc>,
        failures: u32,
    ) -> NotificationId {
        let id = NotificationId::from_ulid(Ulid::new());
        let record = NotificationRecord::new(
            id,
            Channel::Sms,
            CustomerId::from_ulid(Ulid::new()),
            None,
            "Order Confirmation",
            "body",
            3,
            created_at,
        );
        store
            .insert(record, ChannelDetail::Sms(SmsDetail::new("+254700000001")))
            .await
            .unwrap();
        for _ in 0..failures {
            store.record_failure(id, "timeout", created_at).await.unwrap();
        }
        id
    }

    #[tokio::test]
    async fn retry_sweep_requeues_only_recent_retryable_failures() {
        let f = fixture();

        // 2 h old, one failure: eligible.
        let eligible = seed_failed(&f.store, now() - chrono::Duration::hours(2), 1).await;
        // 30 h old: outside the 24 h window.
        seed_failed(&f.store, now() - chrono::Duration::hours(30), 1).await;
        // Recent but budget exhausted.
        seed_failed(&f.store, now() - chrono::Duration::hours(1), 3).await;

        let requeued = f.sweeper.retry_failed_notifications().await.unwrap();
        assert_eq!(requeued, 1);

        let counts = f.queue.counts_by_state().await;
        assert_eq!(counts.queued, 1);

        let lease = tokio::time::timeout(Duration::from_millis(100), f.queue.lease())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lease.envelope().notification_id, eligible);
    }

    #[tokio::test]
    async fn retry_sweep_boundary_is_inclusive_at_the_window_edge() {
        let f = fixture();
        // Exactly 24 h old: still eligible (created_at >= cutoff).
        seed_failed(&f.store, now() - chrono::Duration::hours(24), 1).await;

        let requeued = f.sweeper.retry_failed_notifications().await.unwrap();
        assert_eq!(requeued, 1);
    }

    #[tokio::test]
    async fn retention_sweep_keeps_six_day_old_and_removes_eight_day_old() {
        let f = fixture();

        let six_days = seed_failed(&f.store, now() - chrono::Duration::days(6), 3).await;
        let eight_days = seed_failed(&f.store, now() - chrono::Duration::days(8), 3).await;

        let removed = f.sweeper.cleanup_failed_notifications().await.unwrap();
        assert_eq!(removed, 1);

        assert!(f.store.get(six_days).await.unwrap().is_some());
        assert!(f.store.get(eight_days).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retention_sweep_never_touches_sent_rows() {
        let f = fixture();

        let id = NotificationId::from_ulid(Ulid::new());
        let record = NotificationRecord::new(
            id,
            Channel::Sms,
            CustomerId::from_ulid(Ulid::new()),
            None,
            "s",
            "b",
            3,
            now() - chrono::Duration::days(30),
        );
        f.store
            .insert(record, ChannelDetail::Sms(SmsDetail::new("+254700000001")))
            .await
            .unwrap();
        f.store
            .mark_sent(
                id,
                &crate::adapter::ProviderReceipt::default(),
                now() - chrono::Duration::days(30),
            )
            .await
            .unwrap();

        let removed = f.sweeper.cleanup_failed_notifications().await.unwrap();
        assert_eq!(removed, 0);
        assert!(f.store.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn background_loop_shuts_down_cleanly() {
        let f = fixture();
        let handle = Arc::new(f.sweeper).spawn();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn hour_and_day_constants_line_up() {
        // Guards the cutoff arithmetic against unit slips.
        let f = fixture();
        assert_eq!(
            f.sweeper.cutoff(now(), DAY),
            now() - chrono::Duration::hours(24)
        );
        assert_eq!(
            f.sweeper.cutoff(now(), HOUR),
            now() - chrono::Duration::minutes(60)
        );
    }
}
