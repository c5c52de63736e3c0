//! Worker pool: executes queued send tasks.
//!
//! Workers share nothing but the queue and the store. Each leased task runs
//! the same contract: reload the row, honor the idempotency guard, call the
//! adapter, write the outcome back, and report a `TaskOutcome` value the
//! queue turns into ack / retry / discard.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::adapter::AdapterRegistry;
use crate::clock::Clock;
use crate::domain::TaskOutcome;
use crate::queue::{TaskEnvelope, TaskQueue};
use crate::store::{NotificationStore, SentTransition};

/// Executes one send task end to end.
pub struct SendProcessor {
    store: Arc<dyn NotificationStore>,
    adapters: Arc<AdapterRegistry>,
    clock: Arc<dyn Clock>,
}

impl SendProcessor {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        adapters: Arc<AdapterRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            adapters,
            clock,
        }
    }

    /// Processing contract for `send(notification_id)`:
    ///
    /// 1. Reload the row. A vanished row is fatal for the task, not retried.
    /// 2. Already sent/delivered: succeed without touching the adapter.
    /// 3. Send via the channel adapter.
    /// 4. Success: conditional transition to sent (a concurrent winner makes
    ///    this a no-op success). Failure: record it, then retry while budget
    ///    and classification allow.
    pub async fn process(&self, envelope: &TaskEnvelope) -> TaskOutcome {
        let id = envelope.notification_id;

        let record = match self.store.get(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                error!(notification = %id, "notification vanished before processing");
                return TaskOutcome::discard("notification not found");
            }
            Err(e) => return TaskOutcome::retry(format!("store read failed: {e}")),
        };

        if record.status.is_sent() {
            info!(notification = %id, "already sent, skipping");
            return TaskOutcome::Success;
        }

        let Some(adapter) = self.adapters.get(envelope.channel) else {
            error!(notification = %id, channel = %envelope.channel, "no adapter for channel");
            return TaskOutcome::discard(format!("no adapter for channel {}", envelope.channel));
        };

        let destination = match self.store.detail(id).await {
            Ok(Some(detail)) => detail.destination().to_string(),
            Ok(None) => {
                error!(notification = %id, "notification has no channel detail");
                return TaskOutcome::discard("missing channel detail");
            }
            Err(e) => return TaskOutcome::retry(format!("store read failed: {e}")),
        };

        match adapter
            .send(&destination, Some(&record.subject), &record.body)
            .await
        {
            Ok(receipt) => {
                match self.store.mark_sent(id, &receipt, self.clock.now()).await {
                    Ok(SentTransition::Updated) => {
                        info!(notification = %id, channel = %envelope.channel, "sent");
                    }
                    Ok(SentTransition::AlreadySent) => {
                        info!(notification = %id, "concurrent worker won the sent transition");
                    }
                    Err(e) => return TaskOutcome::retry(format!("store write failed: {e}")),
                }
                TaskOutcome::Success
            }
            Err(send_err) => {
                let updated = match self
                    .store
                    .record_failure(id, &send_err.message, self.clock.now())
                    .await
                {
                    Ok(updated) => updated,
                    Err(e) => return TaskOutcome::retry(format!("store write failed: {e}")),
                };

                if send_err.is_permanent() {
                    warn!(
                        notification = %id,
                        error = %send_err,
                        "permanent channel failure, not retrying"
                    );
                    TaskOutcome::discard(send_err.message)
                } else if updated.can_retry() {
                    warn!(
                        notification = %id,
                        retry_count = updated.retry_count,
                        max_retries = updated.max_retries,
                        error = %send_err,
                        "send failed, will retry"
                    );
                    TaskOutcome::retry(send_err.message)
                } else {
                    error!(
                        notification = %id,
                        retry_count = updated.retry_count,
                        error = %send_err,
                        "retry budget exhausted"
                    );
                    TaskOutcome::discard(send_err.message)
                }
            }
        }
    }
}

/// Worker group handle.
/// - `request_shutdown` stops the group taking new leases.
/// - `shutdown_and_join` additionally waits for in-flight sends to finish.
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers over the queue.
    pub fn spawn(n: usize, queue: Arc<dyn TaskQueue>, processor: Arc<SendProcessor>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let q = Arc::clone(&queue);
            let p = Arc::clone(&processor);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, q, p, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    /// Request shutdown for all workers. In-flight sends are not cancelled;
    /// the group just stops taking new leases.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn TaskQueue>,
    processor: Arc<SendProcessor>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease() suspends until work arrives, so race it against shutdown.
        let lease = tokio::select! {
            _ = shutdown_rx.changed() => {
                continue;
            }
            lease = queue.lease() => lease,
        };

        let Some(lease) = lease else {
            tokio::task::yield_now().await;
            continue;
        };

        let envelope = *lease.envelope();
        let outcome = processor.process(&envelope).await;

        let report = match outcome {
            TaskOutcome::Success => lease.ack().await,
            TaskOutcome::Retry { reason } => lease.fail(reason).await,
            TaskOutcome::Discard { reason } => lease.discard(reason).await,
        };
        if let Err(e) = report {
            error!(worker_id, task = %envelope.task_id, "outcome report failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ChannelAdapter, ProviderReceipt, SendError};
    use crate::clock::FixedClock;
    use crate::domain::{
        Channel, ChannelDetail, CustomerId, NotificationId, NotificationRecord,
        NotificationStatus, SmsDetail, TaskId,
    };
    use crate::queue::{ChannelLimits, InMemoryTaskQueue, RetryPolicy, TaskState};
    use crate::store::InMemoryNotificationStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use ulid::Ulid;

    /// Adapter that pops one scripted result per call and counts calls.
    struct ScriptedAdapter {
        channel: Channel,
        script: Mutex<VecDeque<Result<ProviderReceipt, SendError>>>,
        calls: AtomicU32,
    }

    impl ScriptedAdapter {
        fn new(channel: Channel, script: Vec<Result<ProviderReceipt, SendError>>) -> Self {
            Self {
                channel,
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn always_failing(channel: Channel) -> Self {
            Self::new(channel, vec![])
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl ChannelAdapter for ScriptedAdapter {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send(
            &self,
            _to: &str,
            _subject: Option<&str>,
            _body: &str,
        ) -> Result<ProviderReceipt, SendError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SendError::transient("scripted timeout")))
        }
    }

    struct Fixture {
        store: Arc<InMemoryNotificationStore>,
        adapter: Arc<ScriptedAdapter>,
        processor: SendProcessor,
    }

    fn fixture(adapter: ScriptedAdapter) -> Fixture {
        let store = Arc::new(InMemoryNotificationStore::new());
        let adapter = Arc::new(adapter);
        let mut registry = AdapterRegistry::new();
        registry.register(adapter.clone()).unwrap();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        ));
        let processor = SendProcessor::new(store.clone(), Arc::new(registry), clock);
        Fixture {
            store,
            adapter,
            processor,
        }
    }

    async fn seed_sms(fixture: &Fixture) -> TaskEnvelope {
        let id = NotificationId::from_ulid(Ulid::new());
        let record = NotificationRecord::new(
            id,
            Channel::Sms,
            CustomerId::from_ulid(Ulid::new()),
            None,
            "Order Confirmation",
            "Order #ORD-20250101-0001 confirmed!",
            3,
            Utc.with_ymd_and_hms(2025, 1, 1, 11, 0, 0).unwrap(),
        );
        fixture
            .store
            .insert(record, ChannelDetail::Sms(SmsDetail::new("+254700000001")))
            .await
            .unwrap();
        TaskEnvelope::new(TaskId::from_ulid(Ulid::new()), id, Channel::Sms)
    }

    #[tokio::test]
    async fn successful_send_marks_sent() {
        let f = fixture(ScriptedAdapter::new(
            Channel::Sms,
            vec![Ok(ProviderReceipt {
                provider_message_id: Some("ATXid_1".into()),
                cost: Some("KES 0.8000".into()),
                units: None,
                template: None,
            })],
        ));
        let envelope = seed_sms(&f).await;

        let outcome = f.processor.process(&envelope).await;
        assert!(outcome.is_success());

        let row = f.store.get(envelope.notification_id).await.unwrap().unwrap();
        assert_eq!(row.status, NotificationStatus::Sent);
        assert!(row.sent_at.is_some());
        assert_eq!(row.retry_count, 0);
        assert_eq!(f.adapter.calls(), 1);
    }

    #[tokio::test]
    async fn already_sent_rows_do_not_hit_the_adapter_again() {
        let f = fixture(ScriptedAdapter::new(
            Channel::Sms,
            vec![Ok(ProviderReceipt::default())],
        ));
        let envelope = seed_sms(&f).await;

        assert!(f.processor.process(&envelope).await.is_success());
        let first_sent_at = f
            .store
            .get(envelope.notification_id)
            .await
            .unwrap()
            .unwrap()
            .sent_at;

        // Redelivery of the same task id: success with no second call and no
        // sent_at movement.
        assert!(f.processor.process(&envelope).await.is_success());
        assert_eq!(f.adapter.calls(), 1);
        let row = f.store.get(envelope.notification_id).await.unwrap().unwrap();
        assert_eq!(row.sent_at, first_sent_at);
    }

    #[tokio::test]
    async fn transient_failure_requests_retry_and_records_it() {
        let f = fixture(ScriptedAdapter::always_failing(Channel::Sms));
        let envelope = seed_sms(&f).await;

        let outcome = f.processor.process(&envelope).await;
        assert!(matches!(outcome, TaskOutcome::Retry { .. }));

        let row = f.store.get(envelope.notification_id).await.unwrap().unwrap();
        assert_eq!(row.status, NotificationStatus::Failed);
        assert_eq!(row.retry_count, 1);
        assert_eq!(row.error_message.as_deref(), Some("scripted timeout"));
    }

    #[tokio::test]
    async fn permanent_failure_discards_immediately() {
        let f = fixture(ScriptedAdapter::new(
            Channel::Sms,
            vec![Err(SendError::permanent("InvalidPhoneNumber: 403"))],
        ));
        let envelope = seed_sms(&f).await;

        let outcome = f.processor.process(&envelope).await;
        assert!(matches!(outcome, TaskOutcome::Discard { .. }));

        let row = f.store.get(envelope.notification_id).await.unwrap().unwrap();
        assert_eq!(row.status, NotificationStatus::Failed);
        assert_eq!(row.retry_count, 1);
        assert_eq!(f.adapter.calls(), 1);
    }

    #[tokio::test]
    async fn third_failed_attempt_exhausts_the_budget() {
        let f = fixture(ScriptedAdapter::always_failing(Channel::Sms));
        let envelope = seed_sms(&f).await;

        assert!(matches!(
            f.processor.process(&envelope).await,
            TaskOutcome::Retry { .. }
        ));
        assert!(matches!(
            f.processor.process(&envelope).await,
            TaskOutcome::Retry { .. }
        ));
        // Third attempt: budget spent, task must die.
        assert!(matches!(
            f.processor.process(&envelope).await,
            TaskOutcome::Discard { .. }
        ));

        let row = f.store.get(envelope.notification_id).await.unwrap().unwrap();
        assert_eq!(row.status, NotificationStatus::Failed);
        assert_eq!(row.retry_count, 3);
        assert_eq!(f.adapter.calls(), 3);
    }

    #[tokio::test]
    async fn vanished_notification_is_discarded() {
        let f = fixture(ScriptedAdapter::always_failing(Channel::Sms));
        let envelope = TaskEnvelope::new(
            TaskId::from_ulid(Ulid::new()),
            NotificationId::from_ulid(Ulid::new()),
            Channel::Sms,
        );

        let outcome = f.processor.process(&envelope).await;
        assert!(matches!(outcome, TaskOutcome::Discard { .. }));
        assert_eq!(f.adapter.calls(), 0);
    }

    #[tokio::test]
    async fn worker_group_drives_a_task_from_queue_to_sent() {
        let f = fixture(ScriptedAdapter::new(
            Channel::Sms,
            vec![Ok(ProviderReceipt::default())],
        ));
        let envelope = seed_sms(&f).await;

        let queue = Arc::new(InMemoryTaskQueue::new(
            RetryPolicy::new(Duration::from_millis(10), 1.0),
            ChannelLimits::default(),
        ));
        queue.enqueue(envelope).await.unwrap();

        let workers = WorkerGroup::spawn(
            2,
            queue.clone(),
            Arc::new(SendProcessor::new(
                f.store.clone(),
                {
                    let mut registry = AdapterRegistry::new();
                    registry.register(f.adapter.clone()).unwrap();
                    Arc::new(registry)
                },
                Arc::new(FixedClock::new(
                    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
                )),
            )),
        );

        // Poll until the worker finishes the task.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if queue.task_state(envelope.task_id).await == Some(TaskState::Succeeded) {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "task never completed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let row = f.store.get(envelope.notification_id).await.unwrap().unwrap();
        assert_eq!(row.status, NotificationStatus::Sent);

        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn failing_task_retries_through_the_queue_until_dead() {
        let f = fixture(ScriptedAdapter::always_failing(Channel::Sms));
        let envelope = seed_sms(&f).await;

        let queue = Arc::new(InMemoryTaskQueue::new(
            RetryPolicy::new(Duration::from_millis(10), 1.0),
            ChannelLimits::default(),
        ));
        queue.enqueue(envelope).await.unwrap();

        let processor = Arc::new(SendProcessor::new(
            f.store.clone(),
            {
                let mut registry = AdapterRegistry::new();
                registry.register(f.adapter.clone()).unwrap();
                Arc::new(registry)
            },
            Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
            )),
        ));
        let workers = WorkerGroup::spawn(1, queue.clone(), processor);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if queue.task_state(envelope.task_id).await == Some(TaskState::Dead) {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "task never died");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let row = f.store.get(envelope.notification_id).await.unwrap().unwrap();
        assert_eq!(row.status, NotificationStatus::Failed);
        assert_eq!(row.retry_count, 3);
        assert_eq!(f.adapter.calls(), 3);

        workers.shutdown_and_join().await;
    }
}
