//! herald-core
//!
//! Asynchronous order-notification pipeline: customer SMS/email delivery with
//! durable tracking and retries, plus synchronous admin fan-out.
//!
//! # Module map
//! - **domain**: ids, channels, notification records, order views, events
//! - **adapter**: uniform send boundary over SMS/email providers
//! - **store**: notification record store (port + in-memory implementation)
//! - **queue**: task queue with retry scheduling and per-channel rate limits
//! - **dispatch**: order events -> pending rows + queued send tasks
//! - **worker**: worker pool executing the send contract
//! - **fanout**: broadcast to all active admins with per-recipient isolation
//! - **sweep**: retry + retention maintenance passes
//! - **builder**: fail-fast wiring of the above
//! - **config**: every tunable in one validated structure
//!
//! Delivery is at-least-once: a task may run twice, and the idempotency
//! guard on the notification row (checked before the adapter is called,
//! enforced again by a conditional store update) keeps duplicates from
//! reaching the provider.

pub mod adapter;
pub mod builder;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod fanout;
pub mod message;
pub mod queue;
pub mod store;
pub mod sweep;
pub mod worker;

pub use builder::{BuildError, Pipeline, PipelineBuilder};
pub use config::HeraldConfig;
pub use error::HeraldError;
