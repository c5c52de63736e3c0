//! In-memory queue implementation.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use super::rate_limit::RateLimiter;
use super::{QueueCounts, RetryPolicy, TaskEnvelope, TaskLease, TaskQueue, TaskRecord, TaskState};
use crate::domain::{Channel, TaskId};
use crate::error::HeraldError;

/// Per-minute send caps for the channel classes that have provider quotas.
#[derive(Debug, Clone, Copy)]
pub struct ChannelLimits {
    pub sms_per_minute: u32,
    pub email_per_minute: u32,
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            sms_per_minute: 10,
            email_per_minute: 30,
        }
    }
}

/// Scheduled task entry for the delay queue.
///
/// Reverse ordering so `BinaryHeap` acts as a min-heap (earliest first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScheduledTask {
    next_run_at: Instant,
    task_id: TaskId,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.next_run_at.cmp(&self.next_run_at)
    }
}

struct QueueState {
    /// All task records (single source of truth for tasks).
    records: HashMap<TaskId, TaskRecord>,

    /// Ready queue (TaskIds only).
    ready: VecDeque<TaskId>,

    /// Delay queue: retry backoff and quota waits.
    scheduled: BinaryHeap<ScheduledTask>,

    /// Throughput limiters, one per capped channel.
    limiters: HashMap<Channel, RateLimiter>,

    retry_policy: RetryPolicy,
}

impl QueueState {
    fn new(retry_policy: RetryPolicy, limits: ChannelLimits) -> Self {
        let mut limiters = HashMap::new();
        limiters.insert(Channel::Sms, RateLimiter::per_minute(limits.sms_per_minute));
        limiters.insert(
            Channel::Email,
            RateLimiter::per_minute(limits.email_per_minute),
        );
        Self {
            records: HashMap::new(),
            ready: VecDeque::new(),
            scheduled: BinaryHeap::new(),
            limiters,
            retry_policy,
        }
    }

    /// Move tasks from scheduled to ready once their time has come.
    fn promote_scheduled(&mut self) {
        let now = Instant::now();
        while let Some(entry) = self.scheduled.peek() {
            if entry.next_run_at > now {
                break; // Heap is sorted, nothing later is due either.
            }
            let entry = self.scheduled.pop().expect("peeked entry exists");
            if let Some(record) = self.records.get_mut(&entry.task_id)
                && matches!(record.state, TaskState::RetryScheduled | TaskState::Queued)
            {
                record.requeue();
                self.ready.push_back(entry.task_id);
            }
        }
    }

    fn counts_by_state(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for record in self.records.values() {
            match record.state {
                TaskState::Queued => counts.queued += 1,
                TaskState::Running => counts.running += 1,
                TaskState::Succeeded => counts.succeeded += 1,
                TaskState::RetryScheduled => counts.retry_scheduled += 1,
                TaskState::Dead => counts.dead += 1,
            }
        }
        counts
    }
}

/// In-memory queue implementation.
pub struct InMemoryTaskQueue {
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

impl InMemoryTaskQueue {
    pub fn new(retry_policy: RetryPolicy, limits: ChannelLimits) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::new(retry_policy, limits))),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Current state of one task, if it is known to the queue.
    pub async fn task_state(&self, task_id: TaskId) -> Option<TaskState> {
        let state = self.state.lock().await;
        state.records.get(&task_id).map(|r| r.state)
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<(), HeraldError> {
        let task_id = envelope.task_id;
        {
            let mut state = self.state.lock().await;
            if state.records.contains_key(&task_id) {
                return Err(HeraldError::Queue(format!(
                    "task {task_id} already enqueued"
                )));
            }
            state.records.insert(task_id, TaskRecord::new(envelope));
            state.ready.push_back(task_id);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn lease(&self) -> Option<Box<dyn TaskLease>> {
        loop {
            let next_wake = {
                let mut state = self.state.lock().await;
                state.promote_scheduled();

                // Walk the ready queue: a quota-capped task is parked in the
                // scheduled set and the next candidate (possibly another
                // channel) is considered, so one saturated channel never
                // starves the rest.
                while let Some(task_id) = state.ready.pop_front() {
                    let Some(record) = state.records.get(&task_id) else {
                        continue;
                    };
                    let channel = record.envelope.channel;

                    let now = Instant::now();
                    let denied_until = state
                        .limiters
                        .get_mut(&channel)
                        .and_then(|limiter| limiter.try_acquire(now).err());

                    if let Some(retry_at) = denied_until {
                        let record = state
                            .records
                            .get_mut(&task_id)
                            .expect("record looked up above");
                        record.delay_for_quota(retry_at);
                        state.scheduled.push(ScheduledTask {
                            next_run_at: retry_at,
                            task_id,
                        });
                        continue;
                    }

                    let record = state
                        .records
                        .get_mut(&task_id)
                        .expect("record looked up above");
                    record.start_attempt();
                    let lease = InMemoryLease {
                        task_id,
                        envelope: record.envelope,
                        queue: Arc::clone(&self.state),
                        notify: Arc::clone(&self.notify),
                    };
                    return Some(Box::new(lease));
                }

                state.scheduled.peek().map(|entry| entry.next_run_at)
            };

            // Wait for new work OR the next scheduled wake-up.
            if let Some(wake_time) = next_wake {
                tokio::select! {
                    _ = self.notify.notified() => {},
                    _ = tokio::time::sleep_until(wake_time.into()) => {},
                }
            } else {
                self.notify.notified().await;
            }
        }
    }

    async fn counts_by_state(&self) -> QueueCounts {
        let state = self.state.lock().await;
        state.counts_by_state()
    }
}

/// Lease implementation for `InMemoryTaskQueue`.
struct InMemoryLease {
    task_id: TaskId,
    envelope: TaskEnvelope,
    queue: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
}

#[async_trait]
impl TaskLease for InMemoryLease {
    fn envelope(&self) -> &TaskEnvelope {
        &self.envelope
    }

    async fn ack(self: Box<Self>) -> Result<(), HeraldError> {
        let mut state = self.queue.lock().await;
        if let Some(record) = state.records.get_mut(&self.task_id) {
            record.mark_succeeded();
        }
        Ok(())
    }

    async fn fail(self: Box<Self>, error: String) -> Result<(), HeraldError> {
        {
            let mut state = self.queue.lock().await;
            let Some(record) = state.records.get(&self.task_id) else {
                return Ok(());
            };

            let delay = state.retry_policy.next_delay(record.attempts);
            let next_run_at = Instant::now() + delay;

            let record = state
                .records
                .get_mut(&self.task_id)
                .expect("record looked up above");
            record.schedule_retry(next_run_at, error);
            state.scheduled.push(ScheduledTask {
                next_run_at,
                task_id: self.task_id,
            });
        } // Lock released before waking sleepers.

        self.notify.notify_one();
        Ok(())
    }

    async fn discard(self: Box<Self>, error: String) -> Result<(), HeraldError> {
        let mut state = self.queue.lock().await;
        if let Some(record) = state.records.get_mut(&self.task_id) {
            record.mark_dead(error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NotificationId;
    use std::time::Duration;
    use ulid::Ulid;

    fn envelope(channel: Channel) -> TaskEnvelope {
        TaskEnvelope::new(
            TaskId::from_ulid(Ulid::new()),
            NotificationId::from_ulid(Ulid::new()),
            channel,
        )
    }

    fn quick_retry_queue() -> InMemoryTaskQueue {
        InMemoryTaskQueue::new(
            RetryPolicy::new(Duration::from_millis(10), 1.0),
            ChannelLimits::default(),
        )
    }

    async fn lease_within(
        queue: &InMemoryTaskQueue,
        timeout: Duration,
    ) -> Option<Box<dyn TaskLease>> {
        tokio::time::timeout(timeout, queue.lease()).await.ok()?
    }

    #[tokio::test]
    async fn enqueue_and_counts() {
        let queue = quick_retry_queue();
        queue.enqueue(envelope(Channel::Sms)).await.unwrap();

        let counts = queue.counts_by_state().await;
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.running, 0);
    }

    #[tokio::test]
    async fn duplicate_task_id_is_rejected() {
        let queue = quick_retry_queue();
        let env = envelope(Channel::Sms);
        queue.enqueue(env).await.unwrap();
        assert!(queue.enqueue(env).await.is_err());
    }

    #[tokio::test]
    async fn lease_transitions_to_running() {
        let queue = quick_retry_queue();
        let env = envelope(Channel::Email);
        queue.enqueue(env).await.unwrap();

        let lease = lease_within(&queue, Duration::from_millis(100))
            .await
            .expect("ready task leases immediately");
        assert_eq!(lease.envelope().channel, Channel::Email);
        assert_eq!(lease.envelope().notification_id, env.notification_id);

        let counts = queue.counts_by_state().await;
        assert_eq!(counts.queued, 0);
        assert_eq!(counts.running, 1);
    }

    #[tokio::test]
    async fn ack_marks_succeeded() {
        let queue = quick_retry_queue();
        queue.enqueue(envelope(Channel::Sms)).await.unwrap();

        let lease = queue.lease().await.unwrap();
        lease.ack().await.unwrap();

        let counts = queue.counts_by_state().await;
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.running, 0);
    }

    #[tokio::test]
    async fn fail_schedules_a_retry_that_becomes_leasable() {
        let queue = quick_retry_queue();
        let env = envelope(Channel::Sms);
        queue.enqueue(env).await.unwrap();

        let lease = queue.lease().await.unwrap();
        lease.fail("provider timeout".to_string()).await.unwrap();

        assert_eq!(queue.counts_by_state().await.retry_scheduled, 1);

        // After the 10 ms backoff the task is leasable again.
        let lease = lease_within(&queue, Duration::from_millis(500))
            .await
            .expect("retry promotes back to ready");
        assert_eq!(lease.envelope().task_id, env.task_id);

        let state = queue.task_state(env.task_id).await.unwrap();
        assert_eq!(state, TaskState::Running);
    }

    #[tokio::test]
    async fn discard_marks_dead_and_never_reschedules() {
        let queue = quick_retry_queue();
        let env = envelope(Channel::Sms);
        queue.enqueue(env).await.unwrap();

        let lease = queue.lease().await.unwrap();
        lease.discard("invalid destination".to_string()).await.unwrap();

        assert_eq!(queue.task_state(env.task_id).await, Some(TaskState::Dead));
        assert!(lease_within(&queue, Duration::from_millis(100)).await.is_none());
    }

    #[tokio::test]
    async fn over_quota_tasks_wait_in_queue_instead_of_failing() {
        let queue = InMemoryTaskQueue::new(
            RetryPolicy::default(),
            ChannelLimits {
                sms_per_minute: 1,
                email_per_minute: 30,
            },
        );
        queue.enqueue(envelope(Channel::Sms)).await.unwrap();
        queue.enqueue(envelope(Channel::Sms)).await.unwrap();

        let first = lease_within(&queue, Duration::from_millis(100)).await;
        assert!(first.is_some());

        // Second SMS is over quota: parked, not failed, not leasable yet.
        assert!(lease_within(&queue, Duration::from_millis(100)).await.is_none());
        let counts = queue.counts_by_state().await;
        assert_eq!(counts.dead, 0);
        assert_eq!(counts.running, 1);
        assert_eq!(counts.queued, 1);
    }

    #[tokio::test]
    async fn quota_on_one_channel_does_not_starve_the_other() {
        let queue = InMemoryTaskQueue::new(
            RetryPolicy::default(),
            ChannelLimits {
                sms_per_minute: 1,
                email_per_minute: 30,
            },
        );
        queue.enqueue(envelope(Channel::Sms)).await.unwrap();
        queue.enqueue(envelope(Channel::Sms)).await.unwrap();
        queue.enqueue(envelope(Channel::Email)).await.unwrap();

        let a = lease_within(&queue, Duration::from_millis(100)).await.unwrap();
        assert_eq!(a.envelope().channel, Channel::Sms);

        // SMS quota is spent; the email task must still lease.
        let b = lease_within(&queue, Duration::from_millis(100)).await.unwrap();
        assert_eq!(b.envelope().channel, Channel::Email);
    }

    #[tokio::test]
    async fn quota_waits_do_not_count_as_attempts() {
        let queue = InMemoryTaskQueue::new(
            RetryPolicy::default(),
            ChannelLimits {
                sms_per_minute: 1,
                email_per_minute: 30,
            },
        );
        let first = envelope(Channel::Sms);
        let parked = envelope(Channel::Sms);
        queue.enqueue(first).await.unwrap();
        queue.enqueue(parked).await.unwrap();

        let lease = queue.lease().await.unwrap();
        lease.ack().await.unwrap();
        let _ = lease_within(&queue, Duration::from_millis(50)).await;

        let state = queue.state.lock().await;
        assert_eq!(state.records.get(&parked.task_id).unwrap().attempts, 0);
    }
}
