//! Strongly-typed ULID identifiers.
//!
//! One generic `Id<K>` carries a ULID plus a zero-sized marker type, so a
//! `NotificationId` and a `TaskId` can never be mixed up at compile time
//! while sharing a single implementation. ULIDs sort by creation time, which
//! keeps audit listings in submission order without a separate sequence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

use crate::clock::Clock;

/// Marker trait for id kinds; supplies the `Display` prefix.
pub trait IdKind: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier. `K` is a compile-time marker only.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<K: IdKind> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<K>,
}

impl<K: IdKind> Id<K> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<K: IdKind> From<Ulid> for Id<K> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<K: IdKind> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", K::prefix(), self.ulid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NotificationKind {}

impl IdKind for NotificationKind {
    fn prefix() -> &'static str {
        "notif-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {}

impl IdKind for TaskKind {
    fn prefix() -> &'static str {
        "task-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OrderKind {}

impl IdKind for OrderKind {
    fn prefix() -> &'static str {
        "order-"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CustomerKind {}

impl IdKind for CustomerKind {
    fn prefix() -> &'static str {
        "cust-"
    }
}

/// Identifier of one delivery attempt record (recipient x channel x event).
pub type NotificationId = Id<NotificationKind>;

/// Identifier of one queued unit of work.
pub type TaskId = Id<TaskKind>;

/// Identifier of an order (owned by the persistence layer, read here).
pub type OrderId = Id<OrderKind>;

/// Identifier of a contactable customer or admin account.
pub type CustomerId = Id<CustomerKind>;

/// Generates new ids for pipeline-owned records.
///
/// Abstracted so tests can pair it with a `FixedClock` and get ids whose
/// timestamp component is deterministic.
pub trait IdGenerator: Send + Sync {
    fn notification_id(&self) -> NotificationId;

    fn task_id(&self) -> TaskId;
}

/// ULID generator deriving the timestamp component from a `Clock`.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn notification_id(&self) -> NotificationId {
        NotificationId::from(self.next())
    }

    fn task_id(&self) -> TaskId {
        TaskId::from(self.next())
    }
}
