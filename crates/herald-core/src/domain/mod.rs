//! Domain model: ids, channels, notification records, order views, events.

pub mod admin;
pub mod channel;
pub mod events;
pub mod ids;
pub mod notification;
pub mod order;
pub mod outcome;

pub use admin::{AdminContact, AdminDirectory, FixedAdminDirectory};
pub use channel::Channel;
pub use events::OrderEvent;
pub use ids::{CustomerId, IdGenerator, NotificationId, OrderId, TaskId, UlidGenerator};
pub use notification::{
    ChannelDetail, EmailDetail, NotificationRecord, NotificationStatus, SmsDetail,
};
pub use order::{Customer, Order, OrderItem, OrderStatus};
pub use outcome::TaskOutcome;
