//! Admin fan-out: one logical message, every active administrator.
//!
//! Fan-out is synchronous (callers get the aggregated result back) and
//! isolated per recipient: one bouncing admin mailbox never blocks the rest.
//! The roster is resolved at call time, so deactivating an admin takes effect
//! on the very next broadcast.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::adapter::ChannelAdapter;
use crate::clock::Clock;
use crate::domain::{
    AdminDirectory, ChannelDetail, EmailDetail, IdGenerator, NotificationRecord, Order,
};
use crate::error::HeraldError;
use crate::message::admin::{AlertSeverity, DailyReport, daily_report, new_order_alert, system_alert};
use crate::message::MessageContent;
use crate::store::NotificationStore;

/// Per-admin outcome inside a broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSendResult {
    pub email: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregated broadcast outcome. `success` means at least one admin was
/// reached, not all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastReport {
    pub success: bool,
    pub total_admins: usize,
    pub success_count: usize,
    pub results: Vec<AdminSendResult>,
}

pub struct AdminFanout {
    directory: Arc<dyn AdminDirectory>,
    email: Arc<dyn ChannelAdapter>,
    store: Arc<dyn NotificationStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    max_retries: u32,
}

impl AdminFanout {
    pub fn new(
        directory: Arc<dyn AdminDirectory>,
        email: Arc<dyn ChannelAdapter>,
        store: Arc<dyn NotificationStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        max_retries: u32,
    ) -> Self {
        Self {
            directory,
            email,
            store,
            ids,
            clock,
            max_retries,
        }
    }

    /// Broadcast one message to every currently-active admin.
    ///
    /// Creates exactly one notification row per admin, regardless of send
    /// outcome, so the audit trail covers failed admin alerts too.
    pub async fn broadcast(
        &self,
        content: &MessageContent,
        order: Option<&Order>,
    ) -> Result<BroadcastReport, HeraldError> {
        let admins = self.directory.active_admins().await?;
        if admins.is_empty() {
            warn!("no active admins to notify");
            return Ok(BroadcastReport {
                success: false,
                total_admins: 0,
                success_count: 0,
                results: Vec::new(),
            });
        }

        let total_admins = admins.len();
        let mut results = Vec::with_capacity(total_admins);
        let mut success_count = 0;

        for admin in &admins {
            let id = self.ids.notification_id();
            let now = self.clock.now();
            let record = NotificationRecord::new(
                id,
                crate::domain::Channel::Email,
                admin.id,
                order.map(|o| o.id),
                content.subject.clone(),
                content.body.clone(),
                self.max_retries,
                now,
            );
            self.store
                .insert(record, ChannelDetail::Email(EmailDetail::new(&admin.email)))
                .await?;

            match self
                .email
                .send(&admin.email, Some(&content.subject), &content.body)
                .await
            {
                Ok(receipt) => {
                    self.store.mark_sent(id, &receipt, self.clock.now()).await?;
                    success_count += 1;
                    info!(admin = %admin.email, "admin notification sent");
                    results.push(AdminSendResult {
                        email: admin.email.clone(),
                        success: true,
                        error: None,
                    });
                }
                Err(e) => {
                    self.store
                        .record_failure(id, &e.message, self.clock.now())
                        .await?;
                    error!(admin = %admin.email, error = %e, "admin notification failed");
                    results.push(AdminSendResult {
                        email: admin.email.clone(),
                        success: false,
                        error: Some(e.message),
                    });
                }
            }
        }

        Ok(BroadcastReport {
            success: success_count > 0,
            total_admins,
            success_count,
            results,
        })
    }

    /// New-order alert with the full order summary.
    pub async fn broadcast_new_order(&self, order: &Order) -> Result<BroadcastReport, HeraldError> {
        self.broadcast(&new_order_alert(order), Some(order)).await
    }

    /// Ad-hoc system alert.
    pub async fn broadcast_system_alert(
        &self,
        severity: AlertSeverity,
        message: &str,
        details: Option<&serde_json::Value>,
    ) -> Result<BroadcastReport, HeraldError> {
        let content = system_alert(severity, message, details, self.clock.now());
        self.broadcast(&content, None).await
    }

    /// Daily digest report.
    pub async fn broadcast_daily_report(
        &self,
        report: &DailyReport,
    ) -> Result<BroadcastReport, HeraldError> {
        let content = daily_report(report, self.clock.now());
        self.broadcast(&content, None).await
    }
}
