//! Task state machine.

use serde::{Deserialize, Serialize};

/// State of one queued send task.
///
/// Transitions:
/// - Queued -> Running -> Succeeded
/// - Queued -> Running -> RetryScheduled -> Queued (loop while the worker
///   keeps reporting `Retry`)
/// - Queued -> Running -> Dead (worker reported `Discard`)
///
/// A task delayed by a channel rate limit stays `Queued` while parked in the
/// scheduled set; quota waits are not attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    /// Ready to run immediately.
    Queued,

    /// Leased by a worker.
    Running,

    /// Completed successfully.
    Succeeded,

    /// Waiting out the retry backoff.
    RetryScheduled,

    /// Terminated without success.
    Dead,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Dead)
    }

    pub fn is_runnable(self) -> bool {
        matches!(self, TaskState::Queued)
    }
}
