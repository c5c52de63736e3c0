//! Notification dispatcher.
//!
//! Translates order events into pending notification rows plus queued send
//! tasks. The ordering is the durability guarantee: the row is persisted
//! before the task is enqueued, so a crash between the two leaves a pending
//! row the retry sweep can recover, and a crash after the enqueue is covered
//! by the queue's own bookkeeping.
//!
//! Dispatch never blocks on delivery and never reports downstream channel
//! failures to the caller; those are visible only through the notification
//! audit trail. The one synchronous path is the admin alert on order
//! creation, which runs on the caller's request at the cost of its latency.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::domain::{
    Channel, ChannelDetail, Customer, EmailDetail, IdGenerator, NotificationId,
    NotificationRecord, Order, OrderEvent, OrderId, OrderStatus, SmsDetail, TaskId,
};
use crate::error::HeraldError;
use crate::fanout::{AdminFanout, BroadcastReport};
use crate::message::MessageContent;
use crate::message::customer;
use crate::queue::{TaskEnvelope, TaskQueue};
use crate::store::NotificationStore;

/// Which channels a dispatch call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSelection {
    pub sms: bool,
    pub email: bool,
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self {
            sms: true,
            email: true,
        }
    }
}

impl ChannelSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn sms_only() -> Self {
        Self {
            sms: true,
            email: false,
        }
    }

    pub fn email_only() -> Self {
        Self {
            sms: false,
            email: true,
        }
    }
}

/// One notification successfully queued for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedNotification {
    pub notification_id: NotificationId,
    pub task_id: TaskId,
    pub channel: Channel,
}

/// Correlation handle returned by every dispatch operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchReceipt {
    /// Row + task per channel that was actually dispatched.
    pub queued: Vec<QueuedNotification>,

    /// Channels requested but silently skipped (no usable address).
    pub skipped: Vec<Channel>,

    /// Aggregated admin fan-out result, present on order-creation dispatch.
    pub admin_broadcast: Option<BroadcastReport>,
}

pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    queue: Arc<dyn TaskQueue>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    fanout: Arc<AdminFanout>,
    max_retries: u32,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        queue: Arc<dyn TaskQueue>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        fanout: Arc<AdminFanout>,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            queue,
            ids,
            clock,
            fanout,
            max_retries,
        }
    }

    /// Order confirmation to the customer, plus the synchronous admin alert.
    pub async fn dispatch_order_confirmation(
        &self,
        order: &Order,
        channels: ChannelSelection,
    ) -> Result<DispatchReceipt, HeraldError> {
        let mut receipt = self
            .dispatch_to_customer(
                &order.customer,
                Some(order.id),
                channels,
                customer::order_confirmation_sms(order),
                customer::order_confirmation_email(order),
            )
            .await?;
        info!(order = %order.order_number, queued = receipt.queued.len(), "order confirmation dispatched");

        // Admin alerting is deliberately synchronous on this path: operators
        // hear about new orders without queueing latency.
        match self.fanout.broadcast_new_order(order).await {
            Ok(report) => receipt.admin_broadcast = Some(report),
            Err(e) => warn!(order = %order.order_number, "admin broadcast failed: {e}"),
        }

        Ok(receipt)
    }

    /// Status-change notice to the customer.
    pub async fn dispatch_status_update(
        &self,
        order: &Order,
        old_status: OrderStatus,
        new_status: OrderStatus,
        channels: ChannelSelection,
    ) -> Result<DispatchReceipt, HeraldError> {
        let receipt = self
            .dispatch_to_customer(
                &order.customer,
                Some(order.id),
                channels,
                customer::status_update_sms(order, old_status, new_status),
                customer::status_update_email(order, old_status, new_status),
            )
            .await?;
        info!(
            order = %order.order_number,
            from = old_status.title(),
            to = new_status.title(),
            "status update dispatched"
        );
        Ok(receipt)
    }

    /// Delivery notice to the customer.
    pub async fn dispatch_delivery_notice(
        &self,
        order: &Order,
        channels: ChannelSelection,
    ) -> Result<DispatchReceipt, HeraldError> {
        let receipt = self
            .dispatch_to_customer(
                &order.customer,
                Some(order.id),
                channels,
                customer::delivery_notice_sms(order),
                customer::delivery_notice_email(order, self.clock.now()),
            )
            .await?;
        info!(order = %order.order_number, "delivery notice dispatched");
        Ok(receipt)
    }

    /// Free-form message to one recipient.
    pub async fn dispatch_custom_message(
        &self,
        recipient: &Customer,
        subject: &str,
        body: &str,
        channels: ChannelSelection,
    ) -> Result<DispatchReceipt, HeraldError> {
        let subject = if subject.is_empty() {
            "Notification"
        } else {
            subject
        };
        let content = MessageContent::new(subject, body);
        self.dispatch_to_customer(recipient, None, channels, content.clone(), content)
            .await
    }

    /// Entry point for the order event stream.
    ///
    /// `Created` dispatches the confirmation (with admin alert); a status
    /// change dispatches the update notice, plus a delivery notice when the
    /// order just reached `Delivered`.
    pub async fn handle_event(
        &self,
        event: &OrderEvent,
    ) -> Result<Vec<DispatchReceipt>, HeraldError> {
        match event {
            OrderEvent::Created { order } => Ok(vec![
                self.dispatch_order_confirmation(order, ChannelSelection::default())
                    .await?,
            ]),
            OrderEvent::StatusChanged {
                order,
                old_status,
                new_status,
            } => {
                let mut receipts = vec![
                    self.dispatch_status_update(
                        order,
                        *old_status,
                        *new_status,
                        ChannelSelection::default(),
                    )
                    .await?,
                ];
                if *new_status == OrderStatus::Delivered {
                    receipts.push(
                        self.dispatch_delivery_notice(order, ChannelSelection::default())
                            .await?,
                    );
                }
                Ok(receipts)
            }
        }
    }

    /// Row-first-then-enqueue for every requested channel with a usable
    /// address. Unaddressable channels are skipped, never recorded as failed.
    async fn dispatch_to_customer(
        &self,
        recipient: &Customer,
        order_id: Option<OrderId>,
        channels: ChannelSelection,
        sms_content: MessageContent,
        email_content: MessageContent,
    ) -> Result<DispatchReceipt, HeraldError> {
        let mut receipt = DispatchReceipt::default();

        if channels.sms {
            match &recipient.phone {
                Some(phone) => {
                    let queued = self
                        .queue_one(
                            Channel::Sms,
                            recipient,
                            order_id,
                            ChannelDetail::Sms(SmsDetail::new(phone)),
                            &sms_content,
                        )
                        .await?;
                    receipt.queued.push(queued);
                }
                None => {
                    debug!(recipient = %recipient.id, "no phone number, skipping sms");
                    receipt.skipped.push(Channel::Sms);
                }
            }
        }

        if channels.email {
            match &recipient.email {
                Some(email) => {
                    let queued = self
                        .queue_one(
                            Channel::Email,
                            recipient,
                            order_id,
                            ChannelDetail::Email(EmailDetail::new(email)),
                            &email_content,
                        )
                        .await?;
                    receipt.queued.push(queued);
                }
                None => {
                    debug!(recipient = %recipient.id, "no email address, skipping email");
                    receipt.skipped.push(Channel::Email);
                }
            }
        }

        Ok(receipt)
    }

    async fn queue_one(
        &self,
        channel: Channel,
        recipient: &Customer,
        order_id: Option<OrderId>,
        detail: ChannelDetail,
        content: &MessageContent,
    ) -> Result<QueuedNotification, HeraldError> {
        let notification_id = self.ids.notification_id();
        let now = self.clock.now();
        let record = NotificationRecord::new(
            notification_id,
            channel,
            recipient.id,
            order_id,
            content.subject.clone(),
            content.body.clone(),
            self.max_retries,
            now,
        );

        // Row before task: the durability anchor for the whole pipeline.
        self.store.insert(record, detail).await?;

        let task_id = self.ids.task_id();
        self.queue
            .enqueue(TaskEnvelope::new(task_id, notification_id, channel))
            .await?;

        Ok(QueuedNotification {
            notification_id,
            task_id,
            channel,
        })
    }
}
