//! Admin-facing message bodies: new-order alerts, system alerts, and the
//! daily report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{MessageContent, format_order_items};
use crate::domain::Order;

const SIGNATURE: &str = "Best regards,\nHerald";

/// Severity tag for ad-hoc system alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertSeverity::Info => "INFO",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Counters rendered into the daily report body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyReport {
    pub total_orders: u64,
    pub new_orders: u64,
    pub completed_orders: u64,
    pub pending_orders: u64,
    pub total_revenue: f64,
    pub total_customers: u64,
    pub new_customers: u64,
    pub total_products: u64,
    pub low_stock_items: u64,
    pub notifications_sent: u64,
    pub failed_notifications: u64,
}

pub fn new_order_alert(order: &Order) -> MessageContent {
    let subject = format!("New Order Received - #{}", order.order_number);
    let customer = &order.customer;
    let body = format!(
        "Dear Administrator,\n\n\
         A new order has been placed with the following details:\n\n\
         Order Information:\n\
         - Order Number: {number}\n\
         - Customer: {name}\n\
         - Customer Email: {email}\n\
         - Customer Phone: {phone}\n\
         - Order Date: {date}\n\
         - Order Status: {status}\n\
         - Total Amount: Ksh {total:.2}\n\n\
         Order Items:\n{items}\n\
         Customer Information:\n\
         - Name: {name}\n\
         - Email: {email}\n\
         - Phone: {phone}\n\
         - Address: {address}\n\n\
         Shipping Address:\n{shipping}\n\n\
         Billing Address:\n{billing}\n\n\
         Payment Information:\n\
         - Payment Method: {payment_method}\n\
         - Payment Status: {payment_status}\n\n\
         Notes: {notes}\n\n\
         Please process this order accordingly.\n\n\
         {SIGNATURE}",
        number = order.order_number,
        name = customer.full_name,
        email = customer.email.as_deref().unwrap_or("-"),
        phone = customer.phone.as_deref().unwrap_or("-"),
        date = order.created_at.format("%B %d, %Y at %I:%M %p"),
        status = order.status.title(),
        total = order.total_amount,
        items = format_order_items(order, "Ksh "),
        address = customer.address,
        shipping = order.shipping_address,
        billing = order.billing_address,
        payment_method = order.payment_method,
        payment_status = if order.is_paid { "Paid" } else { "Pending" },
        notes = order.notes,
    );
    MessageContent::new(subject, body)
}

pub fn system_alert(
    severity: AlertSeverity,
    message: &str,
    details: Option<&serde_json::Value>,
    now: DateTime<Utc>,
) -> MessageContent {
    let subject = format!("System Alert - {severity}");
    let details_block = match details {
        Some(d) => format!("\nDetails: {d}\n"),
        None => String::new(),
    };
    let body = format!(
        "Dear Administrator,\n\n\
         System Alert: {severity}\n\n\
         Message: {message}\n\n\
         Time: {time}\n\
         {details_block}\n\
         Please review and take appropriate action.\n\n\
         {SIGNATURE}",
        time = now.format("%B %d, %Y at %I:%M %p"),
    );
    MessageContent::new(subject, body)
}

pub fn daily_report(report: &DailyReport, now: DateTime<Utc>) -> MessageContent {
    let date = now.format("%B %d, %Y");
    let subject = format!("Daily Report - {date}");
    let body = format!(
        "Dear Administrator,\n\n\
         Daily System Report for {date}\n\n\
         Orders Summary:\n\
         - Total Orders: {total_orders}\n\
         - New Orders: {new_orders}\n\
         - Completed Orders: {completed_orders}\n\
         - Pending Orders: {pending_orders}\n\
         - Total Revenue: Ksh {total_revenue:.2}\n\n\
         Customers Summary:\n\
         - Total Customers: {total_customers}\n\
         - New Customers: {new_customers}\n\n\
         Products Summary:\n\
         - Total Products: {total_products}\n\
         - Low Stock Items: {low_stock_items}\n\n\
         System Health:\n\
         - Notifications Sent: {notifications_sent}\n\
         - Failed Notifications: {failed_notifications}\n\n\
         {SIGNATURE}",
        total_orders = report.total_orders,
        new_orders = report.new_orders,
        completed_orders = report.completed_orders,
        pending_orders = report.pending_orders,
        total_revenue = report.total_revenue,
        total_customers = report.total_customers,
        new_customers = report.new_customers,
        total_products = report.total_products,
        low_stock_items = report.low_stock_items,
        notifications_sent = report.notifications_sent,
        failed_notifications = report.failed_notifications,
    );
    MessageContent::new(subject, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::tests::sample_order;
    use chrono::TimeZone;

    #[test]
    fn new_order_alert_includes_payment_and_addresses() {
        let order = sample_order();
        let msg = new_order_alert(&order);
        assert_eq!(msg.subject, "New Order Received - #ORD-20250101-0001");
        assert!(msg.body.contains("Customer: Jane Wanjiku"));
        assert!(msg.body.contains("Payment Status: Paid"));
        assert!(msg.body.contains("Ksh 120.50"));
        assert!(msg.body.contains("Billing Address:"));
        assert!(msg.body.contains("Notes: Leave at reception"));
    }

    #[test]
    fn unpaid_orders_show_pending_payment() {
        let mut order = sample_order();
        order.is_paid = false;
        assert!(new_order_alert(&order).body.contains("Payment Status: Pending"));
    }

    #[test]
    fn system_alert_renders_severity_and_optional_details() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let with = system_alert(
            AlertSeverity::Error,
            "queue depth exceeded threshold",
            Some(&serde_json::json!({"depth": 5000})),
            now,
        );
        assert_eq!(with.subject, "System Alert - ERROR");
        assert!(with.body.contains("queue depth exceeded threshold"));
        assert!(with.body.contains("5000"));

        let without = system_alert(AlertSeverity::Info, "nightly backup done", None, now);
        assert!(!without.body.contains("Details:"));
    }

    #[test]
    fn daily_report_renders_all_counters() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let report = DailyReport {
            total_orders: 42,
            failed_notifications: 3,
            total_revenue: 1234.5,
            ..Default::default()
        };
        let msg = daily_report(&report, now);
        assert_eq!(msg.subject, "Daily Report - March 01, 2025");
        assert!(msg.body.contains("Total Orders: 42"));
        assert!(msg.body.contains("Failed Notifications: 3"));
        assert!(msg.body.contains("Ksh 1234.50"));
    }
}
