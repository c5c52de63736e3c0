//! End-to-end demo of the notification pipeline.
//!
//! Wires the pipeline with in-process stub transports (the SMS gateway fails
//! twice before accepting, to show the retry path), submits an order-created
//! event followed by a shipped -> delivered transition, then waits for the
//! workers to drain the queue and prints the audit trail.
//!
//! ```bash
//! RUST_LOG=info cargo run -p herald-cli
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::info;

use herald_core::adapter::{
    EmailAdapter, EmailTransport, OutboundEmail, SendError, SmsAdapter, SmsResponse, SmsTransport,
    sms::{SmsMessageData, SmsRecipient},
};
use herald_core::PipelineBuilder;
use herald_core::clock::SystemClock;
use herald_core::config::HeraldConfig;
use herald_core::domain::{
    AdminContact, Customer, CustomerId, FixedAdminDirectory, Order, OrderEvent, OrderId,
    OrderItem, OrderStatus,
};
use ulid::Ulid;

/// Gateway stub that rejects the first N submissions, then accepts.
struct FlakySmsTransport {
    remaining_failures: AtomicU32,
}

impl FlakySmsTransport {
    fn new(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl SmsTransport for FlakySmsTransport {
    async fn submit(
        &self,
        to: &str,
        _message: &str,
        _sender_id: Option<&str>,
    ) -> Result<SmsResponse, SendError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(SendError::transient(format!(
                "gateway unavailable (left={left})"
            )));
        }
        Ok(SmsResponse {
            message_data: SmsMessageData {
                message: "Sent to 1/1 Total Cost: KES 0.8000".to_string(),
                recipients: vec![SmsRecipient {
                    number: to.to_string(),
                    status: "Success".to_string(),
                    status_code: Some(101),
                    message_id: Some(format!("ATXid_{}", Ulid::new())),
                    cost: Some("KES 0.8000".to_string()),
                }],
            },
        })
    }
}

/// Email stub that accepts everything.
struct AcceptingEmailTransport;

#[async_trait]
impl EmailTransport for AcceptingEmailTransport {
    async fn deliver(&self, mail: &OutboundEmail) -> Result<Option<String>, SendError> {
        info!(to = %mail.to, subject = %mail.subject, "email accepted by stub");
        Ok(Some(format!("em_{}", Ulid::new())))
    }
}

fn sample_order() -> Order {
    Order {
        id: OrderId::from(Ulid::new()),
        order_number: "ORD-20250101-0001".to_string(),
        status: OrderStatus::Pending,
        total_amount: 120.5,
        created_at: chrono::Utc::now(),
        customer: Customer {
            id: CustomerId::from(Ulid::new()),
            full_name: "Jane Wanjiku".to_string(),
            email: Some("jane@example.com".to_string()),
            phone: Some("+254700000001".to_string()),
            address: "12 Riverside Drive, Nairobi".to_string(),
        },
        items: vec![
            OrderItem {
                product_name: "Ceramic mug".to_string(),
                quantity: 2,
                unit_price: 10.25,
            },
            OrderItem {
                product_name: "French press".to_string(),
                quantity: 1,
                unit_price: 100.0,
            },
        ],
        shipping_address: "12 Riverside Drive, Nairobi".to_string(),
        billing_address: "12 Riverside Drive, Nairobi".to_string(),
        payment_method: "mpesa".to_string(),
        is_paid: true,
        notes: "Leave at reception".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    // Short backoff so the demo's retry path resolves in seconds.
    let mut config = HeraldConfig::new();
    config.retry.backoff = Duration::from_secs(2);
    config.workers = 2;

    let pipeline = PipelineBuilder::new(config)
        .with_adapter(Arc::new(SmsAdapter::new(
            Arc::new(FlakySmsTransport::new(2)),
            Some("SHOPLINE".to_string()),
        )))?
        .with_adapter(Arc::new(EmailAdapter::new(
            Arc::new(AcceptingEmailTransport),
            "orders@example.com",
        )))?
        .with_admin_directory(Arc::new(FixedAdminDirectory::new(vec![
            AdminContact {
                id: CustomerId::from(Ulid::new()),
                email: "ops@example.com".to_string(),
            },
            AdminContact {
                id: CustomerId::from(Ulid::new()),
                email: "lead@example.com".to_string(),
            },
        ])))
        .with_clock(Arc::new(SystemClock))
        .build()?;

    let workers = pipeline.spawn_workers();
    let sweeper = pipeline.spawn_sweeper();

    // Order placed: customer confirmation (async) + admin alert (sync).
    let order = sample_order();
    let receipts = pipeline
        .dispatcher()
        .handle_event(&OrderEvent::Created {
            order: order.clone(),
        })
        .await?;
    if let Some(broadcast) = &receipts[0].admin_broadcast {
        info!(
            total = broadcast.total_admins,
            reached = broadcast.success_count,
            "admin alert delivered"
        );
    }

    // Later: the order arrives.
    let mut delivered = order.clone();
    delivered.status = OrderStatus::Delivered;
    pipeline
        .dispatcher()
        .handle_event(&OrderEvent::StatusChanged {
            order: delivered,
            old_status: OrderStatus::Shipped,
            new_status: OrderStatus::Delivered,
        })
        .await?;

    // Wait for the workers to drain everything (the flaky SMS gateway makes
    // one notification take two retries).
    loop {
        let counts = pipeline.queue().counts_by_state().await;
        let in_flight = counts.queued + counts.running + counts.retry_scheduled;
        let finished = counts.succeeded + counts.dead;
        if in_flight == 0 && finished > 0 {
            break;
        }
        sleep(Duration::from_millis(200)).await;
    }

    let stats = pipeline.store().stats().await?;
    println!(
        "notification audit trail:\n{}",
        serde_json::to_string_pretty(&stats)?
    );
    println!(
        "queue counts: {:?}",
        pipeline.queue().counts_by_state().await
    );

    sweeper.shutdown_and_join().await;
    workers.shutdown_and_join().await;
    Ok(())
}
