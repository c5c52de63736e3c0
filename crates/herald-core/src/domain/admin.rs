//! Admin roster view.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ids::CustomerId;
use crate::error::HeraldError;

/// Contact entry for one currently-active administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminContact {
    pub id: CustomerId,
    pub email: String,
}

/// Resolves the set of active administrators.
///
/// Implementations must answer with the roster as of the call, never a cached
/// snapshot: an admin deactivated a second ago should not be notified, and
/// the fan-out re-resolves on every broadcast.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn active_admins(&self) -> Result<Vec<AdminContact>, HeraldError>;
}

/// Directory over a fixed in-memory roster, for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct FixedAdminDirectory {
    admins: Vec<AdminContact>,
}

impl FixedAdminDirectory {
    pub fn new(admins: Vec<AdminContact>) -> Self {
        Self { admins }
    }
}

#[async_trait]
impl AdminDirectory for FixedAdminDirectory {
    async fn active_admins(&self) -> Result<Vec<AdminContact>, HeraldError> {
        Ok(self.admins.clone())
    }
}
