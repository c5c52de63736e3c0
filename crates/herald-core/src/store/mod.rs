//! Notification record store.
//!
//! The store is the only shared mutable state between workers; every
//! coordination question ("was this already sent?", "is this retryable?") is
//! answered here. The `mark_sent` transition is conditional so two workers
//! racing on the same task id settle on a single `sent_at`.

mod memory;

pub use memory::InMemoryNotificationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::adapter::ProviderReceipt;
use crate::domain::{ChannelDetail, NotificationId, NotificationRecord};
use crate::error::HeraldError;

/// Result of the conditional sent transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentTransition {
    /// This caller performed the transition.
    Updated,

    /// Another worker already delivered; nothing was mutated.
    AlreadySent,
}

/// Audit counters over the whole notification table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total: usize,
    pub sms: usize,
    pub email: usize,
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
    pub delivered: usize,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a new `Pending` row together with its channel detail.
    async fn insert(
        &self,
        record: NotificationRecord,
        detail: ChannelDetail,
    ) -> Result<(), HeraldError>;

    async fn get(&self, id: NotificationId) -> Result<Option<NotificationRecord>, HeraldError>;

    /// Destination and provider metadata for the row's channel.
    async fn detail(&self, id: NotificationId) -> Result<Option<ChannelDetail>, HeraldError>;

    /// Conditional transition to `Sent`: only applies when the row is not
    /// already sent/delivered, and merges the provider receipt into the
    /// channel detail. Errors if the row vanished.
    async fn mark_sent(
        &self,
        id: NotificationId,
        receipt: &ProviderReceipt,
        now: DateTime<Utc>,
    ) -> Result<SentTransition, HeraldError>;

    /// Record a failed attempt (status, error message, retry budget) and
    /// return the updated row so the caller can decide on a retry.
    async fn record_failure(
        &self,
        id: NotificationId,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<NotificationRecord, HeraldError>;

    /// Provider delivery receipt arrived for an already-sent row.
    async fn mark_delivered(
        &self,
        id: NotificationId,
        now: DateTime<Utc>,
    ) -> Result<(), HeraldError>;

    /// Failed rows that still have retry budget and were created at or after
    /// `cutoff`.
    async fn list_retryable(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>, HeraldError>;

    /// Delete failed rows created before `cutoff`; returns how many went.
    async fn purge_failed_before(&self, cutoff: DateTime<Utc>) -> Result<usize, HeraldError>;

    async fn stats(&self) -> Result<NotificationStats, HeraldError>;
}
