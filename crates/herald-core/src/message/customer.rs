//! Customer-facing message bodies.
//!
//! SMS bodies stay short (segment costs); email bodies carry the full order
//! summary. Subjects are shared between the notification row and the outgoing
//! mail.

use chrono::{DateTime, Utc};

use super::{MessageContent, format_order_items};
use crate::domain::{Order, OrderStatus};

const SIGNATURE: &str = "Best regards,\nThe Orders Team";

pub fn order_confirmation_sms(order: &Order) -> MessageContent {
    MessageContent::new(
        "Order Confirmation",
        format!(
            "Order #{} confirmed!\nTotal: ${:.2}\nStatus: {}\nThank you for your order!",
            order.order_number,
            order.total_amount,
            order.status.title(),
        ),
    )
}

pub fn order_confirmation_email(order: &Order) -> MessageContent {
    let subject = format!("Order Confirmation - #{}", order.order_number);
    let body = format!(
        "Dear {first_name},\n\n\
         Thank you for your order! Your order has been confirmed.\n\n\
         Order Details:\n\
         - Order Number: {number}\n\
         - Total Amount: ${total:.2}\n\
         - Status: {status}\n\
         - Date: {date}\n\n\
         Order Items:\n{items}\n\
         Shipping Address:\n{shipping}\n\n\
         We will keep you updated on your order status.\n\n\
         Thank you for shopping with us!\n\n\
         {SIGNATURE}",
        first_name = order.customer.first_name(),
        number = order.order_number,
        total = order.total_amount,
        status = order.status.title(),
        date = order.created_at.format("%B %d, %Y"),
        items = format_order_items(order, "$"),
        shipping = order.shipping_address,
    );
    MessageContent::new(subject, body)
}

pub fn status_update_sms(
    order: &Order,
    old_status: OrderStatus,
    new_status: OrderStatus,
) -> MessageContent {
    MessageContent::new(
        "Order Status Update",
        format!(
            "Order #{} status updated!\nFrom: {}\nTo: {}\nTrack your order at our website.",
            order.order_number,
            old_status.title(),
            new_status.title(),
        ),
    )
}

pub fn status_update_email(
    order: &Order,
    old_status: OrderStatus,
    new_status: OrderStatus,
) -> MessageContent {
    let subject = format!("Order Status Update - #{}", order.order_number);
    let body = format!(
        "Dear {first_name},\n\n\
         Your order status has been updated.\n\n\
         Order Details:\n\
         - Order Number: {number}\n\
         - Previous Status: {old}\n\
         - New Status: {new}\n\
         - Total Amount: ${total:.2}\n\n\
         You can track your order at our website.\n\n\
         Thank you for your patience!\n\n\
         {SIGNATURE}",
        first_name = order.customer.first_name(),
        number = order.order_number,
        old = old_status.title(),
        new = new_status.title(),
        total = order.total_amount,
    );
    MessageContent::new(subject, body)
}

pub fn delivery_notice_sms(order: &Order) -> MessageContent {
    MessageContent::new(
        "Order Delivered",
        format!(
            "Your order #{} has been delivered!\nTotal: ${:.2}\nThank you for shopping with us!",
            order.order_number, order.total_amount,
        ),
    )
}

pub fn delivery_notice_email(order: &Order, delivered_on: DateTime<Utc>) -> MessageContent {
    let subject = format!("Order Delivered - #{}", order.order_number);
    let body = format!(
        "Dear {first_name},\n\n\
         Great news! Your order has been delivered.\n\n\
         Order Details:\n\
         - Order Number: {number}\n\
         - Total Amount: ${total:.2}\n\
         - Delivery Date: {date}\n\n\
         We hope you enjoy your purchase! If you have any questions or \
         concerns, please don't hesitate to contact us.\n\n\
         Thank you for shopping with us!\n\n\
         {SIGNATURE}",
        first_name = order.customer.first_name(),
        number = order.order_number,
        total = order.total_amount,
        date = delivered_on.format("%B %d, %Y"),
    );
    MessageContent::new(subject, body)
}
