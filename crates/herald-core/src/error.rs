use thiserror::Error;

use crate::domain::{Channel, NotificationId};

#[derive(Debug, Error)]
pub enum HeraldError {
    #[error("notification not found: {0}")]
    NotificationNotFound(NotificationId),

    #[error("no adapter registered for channel {0}")]
    AdapterMissing(Channel),

    #[error("adapter already registered for channel {0}")]
    DuplicateAdapter(Channel),

    #[error("store error: {0}")]
    Store(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("{0}")]
    Other(String),
}
