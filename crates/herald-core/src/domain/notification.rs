//! Notification records and per-channel detail rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::channel::Channel;
use super::ids::{CustomerId, NotificationId, OrderId};

/// Delivery state of one notification.
///
/// Transitions:
/// - Pending -> Sent (worker, after a provider accept)
/// - Pending -> Failed -> Pending-equivalent retries happen at the task
///   layer; the row itself moves Failed -> Sent on a later successful attempt
/// - Sent -> Delivered (provider receipt, when available)
///
/// Sent and Delivered are terminal for the send path; Failed is terminal once
/// the retry budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Delivered,
}

impl NotificationStatus {
    /// The message has already reached the provider; sending again would
    /// duplicate delivery.
    pub fn is_sent(self) -> bool {
        matches!(self, NotificationStatus::Sent | NotificationStatus::Delivered)
    }
}

/// One record of an attempt to deliver one message over one channel to one
/// recipient.
///
/// Design:
/// - Created as `Pending` by the dispatcher before anything touches the
///   network, so a crash between the row write and the enqueue is recoverable
///   by the retry sweep.
/// - Mutated only through the store operations; state transitions live here
///   as methods so every mutation stamps `updated_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub channel: Channel,
    pub recipient: CustomerId,
    pub order_id: Option<OrderId>,
    pub subject: String,
    pub body: String,
    pub status: NotificationStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,

    /// Failed attempts so far. Invariant: `retry_count <= max_retries`.
    pub retry_count: u32,
    pub max_retries: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NotificationId,
        channel: Channel,
        recipient: CustomerId,
        order_id: Option<OrderId>,
        subject: impl Into<String>,
        body: impl Into<String>,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            channel,
            recipient,
            order_id,
            subject: subject.into(),
            body: body.into(),
            status: NotificationStatus::Pending,
            sent_at: None,
            delivered_at: None,
            error_message: None,
            retry_count: 0,
            max_retries,
            created_at: now,
            updated_at: now,
        }
    }

    /// A failed row is retryable until its budget is spent.
    pub fn can_retry(&self) -> bool {
        self.status == NotificationStatus::Failed && self.retry_count < self.max_retries
    }

    /// Mark the row sent. Only the first caller wins; the store guards this
    /// with a conditional update.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.status = NotificationStatus::Sent;
        self.sent_at = Some(now);
        self.error_message = None;
        self.updated_at = now;
    }

    /// Record one failed attempt: flips to `Failed`, stores the error, and
    /// spends one unit of retry budget (never past `max_retries`).
    pub fn record_failure(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = NotificationStatus::Failed;
        self.error_message = Some(error.into());
        self.retry_count = (self.retry_count + 1).min(self.max_retries);
        self.updated_at = now;
    }

    /// Provider delivery receipt arrived.
    pub fn mark_delivered(&mut self, now: DateTime<Utc>) {
        self.status = NotificationStatus::Delivered;
        self.delivered_at = Some(now);
        self.updated_at = now;
    }
}

/// SMS-specific metadata, owned 1:1 by a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsDetail {
    pub phone_number: String,
    pub provider_message_id: Option<String>,
    pub cost: Option<String>,
    pub units: Option<u32>,
}

impl SmsDetail {
    pub fn new(phone_number: impl Into<String>) -> Self {
        Self {
            phone_number: phone_number.into(),
            provider_message_id: None,
            cost: None,
            units: None,
        }
    }
}

/// Email-specific metadata, owned 1:1 by a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDetail {
    pub email_address: String,
    pub provider_message_id: Option<String>,
    pub template: Option<String>,
}

impl EmailDetail {
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            email_address: email_address.into(),
            provider_message_id: None,
            template: None,
        }
    }
}

/// Channel detail written alongside its parent notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelDetail {
    Sms(SmsDetail),
    Email(EmailDetail),
}

impl ChannelDetail {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelDetail::Sms(_) => Channel::Sms,
            ChannelDetail::Email(_) => Channel::Email,
        }
    }

    /// Destination address the worker hands to the adapter.
    pub fn destination(&self) -> &str {
        match self {
            ChannelDetail::Sms(d) => &d.phone_number,
            ChannelDetail::Email(d) => &d.email_address,
        }
    }
}
