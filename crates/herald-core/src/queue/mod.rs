//! Task queue: state management, retry scheduling, rate limiting, and the
//! in-memory implementation.

mod memory;
mod rate_limit;
mod record;
mod retry;
mod state;

pub use memory::{ChannelLimits, InMemoryTaskQueue};
pub use rate_limit::RateLimiter;
pub use record::TaskRecord;
pub use retry::RetryPolicy;
pub use state::TaskState;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Channel, NotificationId, TaskId};
use crate::error::HeraldError;

/// One unit of queued work: deliver one notification.
///
/// The envelope carries ids only, never the rendered message — the worker
/// reloads the row, so a task that outlives a process restart still sends
/// exactly what was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub task_id: TaskId,
    pub notification_id: NotificationId,
    pub channel: Channel,
}

impl TaskEnvelope {
    pub fn new(task_id: TaskId, notification_id: NotificationId, channel: Channel) -> Self {
        Self {
            task_id,
            notification_id,
            channel,
        }
    }
}

/// A leased task. The worker owns the lease and must finish it with exactly
/// one of `ack`, `fail`, or `discard`.
///
/// Design intent:
/// - The queue manages state transitions (Queued -> Running -> ...).
/// - The worker executes side effects and reports the result as a value;
///   `fail` schedules a retry per policy, `discard` terminates the task.
#[async_trait]
pub trait TaskLease: Send {
    fn envelope(&self) -> &TaskEnvelope;

    /// Mark success.
    async fn ack(self: Box<Self>) -> Result<(), HeraldError>;

    /// Recoverable failure: the queue schedules a retry after backoff.
    async fn fail(self: Box<Self>, error: String) -> Result<(), HeraldError>;

    /// Unrecoverable failure: the task dies immediately.
    async fn discard(self: Box<Self>, error: String) -> Result<(), HeraldError>;
}

/// Queue port. The in-memory implementation below is the development/test
/// backend; this trait is the seam for a durable broker later.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a send task.
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<(), HeraldError>;

    /// Lease one ready task, waiting until one is available.
    async fn lease(&self) -> Option<Box<dyn TaskLease>>;

    /// Observability counters.
    async fn counts_by_state(&self) -> QueueCounts;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub queued: usize,
    pub running: usize,
    pub succeeded: usize,
    pub retry_scheduled: usize,
    pub dead: usize,
}
