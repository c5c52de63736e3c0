//! Order events consumed by the dispatcher.
//!
//! The persistence layer emits these explicitly after a successful write.
//! Transition legality is already enforced there; the pipeline reacts without
//! re-validating.

use serde::{Deserialize, Serialize};

use super::order::{Order, OrderStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
    Created {
        order: Order,
    },
    StatusChanged {
        order: Order,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
}

impl OrderEvent {
    pub fn order(&self) -> &Order {
        match self {
            OrderEvent::Created { order } => order,
            OrderEvent::StatusChanged { order, .. } => order,
        }
    }
}
