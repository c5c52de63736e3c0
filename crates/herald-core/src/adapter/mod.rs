//! Channel adapters: uniform send boundary over third-party providers.
//!
//! An adapter is a pure request/response component. It never touches the
//! record store; the worker owns all state updates. Failures come back
//! classified so the queue can stop retrying destinations that will never
//! work.

pub mod email;
pub mod sms;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::Channel;
use crate::error::HeraldError;

pub use email::{EmailAdapter, EmailTemplate, EmailTransport, HttpEmailTransport, OutboundEmail};
pub use sms::{HttpSmsTransport, SmsAdapter, SmsResponse, SmsTransport};

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Timeout, connection trouble, provider 5xx. Retry may succeed.
    Transient,

    /// Rejected destination or request. Retrying burns budget for nothing.
    Permanent,
}

/// A classified send failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct SendError {
    pub kind: FailureKind,
    pub message: String,
}

impl SendError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.kind == FailureKind::Permanent
    }
}

/// Provider-side metadata returned by a successful send.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderReceipt {
    pub provider_message_id: Option<String>,
    pub cost: Option<String>,
    pub units: Option<u32>,
    pub template: Option<String>,
}

/// Uniform interface to send one message over one transport to one recipient.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(
        &self,
        to: &str,
        subject: Option<&str>,
        body: &str,
    ) -> Result<ProviderReceipt, SendError>;
}

/// Registry of adapters by channel.
///
/// Built during wiring (mutable), shared read-only afterwards — same shape as
/// the builder output, no locking at send time.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Channel, Arc<dyn ChannelAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) -> Result<(), HeraldError> {
        let channel = adapter.channel();
        if self.adapters.contains_key(&channel) {
            return Err(HeraldError::DuplicateAdapter(channel));
        }
        self.adapters.insert(channel, adapter);
        Ok(())
    }

    pub fn get(&self, channel: Channel) -> Option<&Arc<dyn ChannelAdapter>> {
        self.adapters.get(&channel)
    }

    pub fn registered_channels(&self) -> Vec<Channel> {
        self.adapters.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopAdapter(Channel);

    #[async_trait]
    impl ChannelAdapter for NoopAdapter {
        fn channel(&self) -> Channel {
            self.0
        }

        async fn send(
            &self,
            _to: &str,
            _subject: Option<&str>,
            _body: &str,
        ) -> Result<ProviderReceipt, SendError> {
            Ok(ProviderReceipt::default())
        }
    }

    #[test]
    fn registry_rejects_duplicate_channels() {
        let mut reg = AdapterRegistry::new();
        reg.register(Arc::new(NoopAdapter(Channel::Sms))).unwrap();

        let err = reg
            .register(Arc::new(NoopAdapter(Channel::Sms)))
            .unwrap_err();
        assert!(matches!(err, HeraldError::DuplicateAdapter(Channel::Sms)));
    }

    #[test]
    fn registry_lookup_by_channel() {
        let mut reg = AdapterRegistry::new();
        reg.register(Arc::new(NoopAdapter(Channel::Email))).unwrap();

        assert!(reg.get(Channel::Email).is_some());
        assert!(reg.get(Channel::Sms).is_none());
        assert_eq!(reg.registered_channels(), vec![Channel::Email]);
    }
}
