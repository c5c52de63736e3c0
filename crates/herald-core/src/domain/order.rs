//! Read-only views of the order domain.
//!
//! The pipeline never owns these: the persistence layer hands over a fully
//! populated `Order` with each event, and nothing here is written back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CustomerId, OrderId};

/// Order lifecycle status. Transition legality is enforced upstream; the
/// pipeline only reads the value for message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Capitalized form used in customer-facing message bodies.
    pub fn title(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Processing => "Processing",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunded => "Refunded",
        }
    }
}

/// Contactable customer. Either address may be missing; dispatch silently
/// skips channels the customer cannot receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: String,
}

impl Customer {
    /// First name for salutations, falling back to the full name.
    pub fn first_name(&self) -> &str {
        self.full_name
            .split_whitespace()
            .next()
            .unwrap_or(&self.full_name)
    }
}

/// One line item within an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl OrderItem {
    pub fn subtotal(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

/// The order view the pipeline consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub shipping_address: String,
    pub billing_address: String,
    pub payment_method: String,
    pub is_paid: bool,
    pub notes: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_titles_are_capitalized() {
        assert_eq!(OrderStatus::Confirmed.title(), "Confirmed");
        assert_eq!(OrderStatus::Delivered.title(), "Delivered");
    }

    #[test]
    fn first_name_falls_back_to_full_name() {
        let mut c = Customer {
            id: CustomerId::from_ulid(ulid::Ulid::new()),
            full_name: "Jane Wanjiku".into(),
            email: None,
            phone: None,
            address: String::new(),
        };
        assert_eq!(c.first_name(), "Jane");

        c.full_name = "Cher".into();
        assert_eq!(c.first_name(), "Cher");
    }

    #[test]
    fn item_subtotal() {
        let item = OrderItem {
            product_name: "Widget".into(),
            quantity: 3,
            unit_price: 25.0,
        };
        assert_eq!(item.subtotal(), 75.0);
    }
}
