//! Worker-facing task outcome.
//!
//! A send handler reports what happened as a value; the queue runtime decides
//! re-scheduling from it. No retry-by-exception: `Retry` schedules another
//! attempt after the backoff, `Discard` terminates the task.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// Delivery succeeded (or was already done — idempotent success).
    Success,

    /// Recoverable failure; the queue schedules a retry after the backoff.
    Retry { reason: String },

    /// Unrecoverable: bad destination, vanished record, exhausted budget.
    /// The task dies; the notification row keeps the error for the audit
    /// trail.
    Discard { reason: String },
}

impl TaskOutcome {
    pub fn retry(reason: impl Into<String>) -> Self {
        TaskOutcome::Retry {
            reason: reason.into(),
        }
    }

    pub fn discard(reason: impl Into<String>) -> Self {
        TaskOutcome::Discard {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}
