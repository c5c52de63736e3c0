//! In-memory store implementation.
//!
//! All rows behind one async mutex; each trait method is one critical
//! section, which is what makes `mark_sent` an atomic check-and-set.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{NotificationStats, NotificationStore, SentTransition};
use crate::adapter::ProviderReceipt;
use crate::domain::{
    Channel, ChannelDetail, NotificationId, NotificationRecord, NotificationStatus,
};
use crate::error::HeraldError;

#[derive(Default)]
struct StoreState {
    rows: HashMap<NotificationId, NotificationRecord>,
    details: HashMap<NotificationId, ChannelDetail>,
}

#[derive(Default)]
pub struct InMemoryNotificationStore {
    state: Mutex<StoreState>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row, newest first (test and demo introspection).
    pub async fn all(&self) -> Vec<NotificationRecord> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state.rows.values().cloned().collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(
        &self,
        record: NotificationRecord,
        detail: ChannelDetail,
    ) -> Result<(), HeraldError> {
        let mut state = self.state.lock().await;
        state.details.insert(record.id, detail);
        state.rows.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: NotificationId) -> Result<Option<NotificationRecord>, HeraldError> {
        let state = self.state.lock().await;
        Ok(state.rows.get(&id).cloned())
    }

    async fn detail(&self, id: NotificationId) -> Result<Option<ChannelDetail>, HeraldError> {
        let state = self.state.lock().await;
        Ok(state.details.get(&id).cloned())
    }

    async fn mark_sent(
        &self,
        id: NotificationId,
        receipt: &ProviderReceipt,
        now: DateTime<Utc>,
    ) -> Result<SentTransition, HeraldError> {
        let mut state = self.state.lock().await;
        let row = state
            .rows
            .get_mut(&id)
            .ok_or(HeraldError::NotificationNotFound(id))?;

        if row.status.is_sent() {
            return Ok(SentTransition::AlreadySent);
        }
        row.mark_sent(now);

        match state.details.get_mut(&id) {
            Some(ChannelDetail::Sms(d)) => {
                d.provider_message_id = receipt.provider_message_id.clone();
                d.cost = receipt.cost.clone();
                d.units = receipt.units;
            }
            Some(ChannelDetail::Email(d)) => {
                d.provider_message_id = receipt.provider_message_id.clone();
                d.template = receipt.template.clone();
            }
            None => {}
        }
        Ok(SentTransition::Updated)
    }

    async fn record_failure(
        &self,
        id: NotificationId,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<NotificationRecord, HeraldError> {
        let mut state = self.state.lock().await;
        let row = state
            .rows
            .get_mut(&id)
            .ok_or(HeraldError::NotificationNotFound(id))?;
        row.record_failure(error, now);
        Ok(row.clone())
    }

    async fn mark_delivered(
        &self,
        id: NotificationId,
        now: DateTime<Utc>,
    ) -> Result<(), HeraldError> {
        let mut state = self.state.lock().await;
        let row = state
            .rows
            .get_mut(&id)
            .ok_or(HeraldError::NotificationNotFound(id))?;
        row.mark_delivered(now);
        Ok(())
    }

    async fn list_retryable(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<NotificationRecord>, HeraldError> {
        let state = self.state.lock().await;
        let mut rows: Vec<_> = state
            .rows
            .values()
            .filter(|r| r.can_retry() && r.created_at >= cutoff)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn purge_failed_before(&self, cutoff: DateTime<Utc>) -> Result<usize, HeraldError> {
        let mut state = self.state.lock().await;
        let doomed: Vec<NotificationId> = state
            .rows
            .values()
            .filter(|r| r.status == NotificationStatus::Failed && r.created_at < cutoff)
            .map(|r| r.id)
            .collect();
        for id in &doomed {
            state.rows.remove(id);
            state.details.remove(id);
        }
        Ok(doomed.len())
    }

    async fn stats(&self) -> Result<NotificationStats, HeraldError> {
        let state = self.state.lock().await;
        let mut stats = NotificationStats {
            total: state.rows.len(),
            ..Default::default()
        };
        for row in state.rows.values() {
            match row.channel {
                Channel::Sms => stats.sms += 1,
                Channel::Email => stats.email += 1,
                Channel::Push => {}
            }
            match row.status {
                NotificationStatus::Pending => stats.pending += 1,
                NotificationStatus::Sent => stats.sent += 1,
                NotificationStatus::Failed => stats.failed += 1,
                NotificationStatus::Delivered => stats.delivered += 1,
            }
        }
        Ok(stats)
    }
}
