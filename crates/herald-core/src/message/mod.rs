//! Message rendering.
//!
//! Builders for every customer- and admin-facing message body. Rendering is
//! pure string work: the dispatcher persists the result on the notification
//! row, so whatever a worker later sends is exactly what was rendered at
//! dispatch time.

pub mod admin;
pub mod customer;

use serde::{Deserialize, Serialize};

use crate::domain::Order;

/// A rendered subject/body pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub subject: String,
    pub body: String,
}

impl MessageContent {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Line-item listing shared by customer and admin bodies.
fn format_order_items(order: &Order, currency: &str) -> String {
    let mut out = String::new();
    for item in &order.items {
        out.push_str(&format!(
            "- {} x{} @ {currency}{:.2} = {currency}{:.2}\n",
            item.product_name,
            item.quantity,
            item.unit_price,
            item.subtotal(),
        ));
    }
    out
}
