//! SMS adapter over an Africa's-Talking-shaped gateway.
//!
//! The gateway answers with a per-recipient status list; a response with zero
//! recipients, or a recipient whose status is not `Success`, is a failure.
//! Recipient-level rejections (invalid number, blacklisted user, bad sender
//! id) are permanent; gateway-side trouble is transient.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::{ChannelAdapter, ProviderReceipt, SendError};
use crate::domain::Channel;

/// Raw provider call, separated so tests and demos substitute stubs.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn submit(
        &self,
        to: &str,
        message: &str,
        sender_id: Option<&str>,
    ) -> Result<SmsResponse, SendError>;
}

/// Gateway response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsResponse {
    #[serde(rename = "SMSMessageData")]
    pub message_data: SmsMessageData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SmsMessageData {
    /// Gateway-level summary, e.g. "Sent to 1/1 Total Cost: KES 0.8000".
    pub message: String,

    #[serde(default)]
    pub recipients: Vec<SmsRecipient>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsRecipient {
    #[serde(default)]
    pub number: String,
    pub status: String,
    #[serde(default)]
    pub status_code: Option<i32>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
}

/// Recipient statuses that will never succeed on retry.
const PERMANENT_STATUSES: &[&str] = &[
    "InvalidPhoneNumber",
    "InvalidSenderId",
    "UnsupportedNumberType",
    "UserInBlacklist",
];

pub struct SmsAdapter {
    transport: Arc<dyn SmsTransport>,
    sender_id: Option<String>,
}

impl SmsAdapter {
    /// `sender_id` of `None` uses the provider's default sender.
    pub fn new(transport: Arc<dyn SmsTransport>, sender_id: Option<String>) -> Self {
        Self {
            transport,
            sender_id,
        }
    }

    fn interpret(response: &SmsResponse) -> Result<ProviderReceipt, SendError> {
        let data = &response.message_data;

        let Some(recipient) = data.recipients.first() else {
            // The gateway accepted the request but addressed nobody: the
            // destination was rejected outright.
            return Err(SendError::permanent(data.message.clone()));
        };

        if recipient.status == "Success" {
            return Ok(ProviderReceipt {
                provider_message_id: recipient.message_id.clone(),
                cost: recipient.cost.clone(),
                units: None,
                template: None,
            });
        }

        let message = match recipient.status_code {
            Some(code) => format!("{}: {code}", recipient.status),
            None => recipient.status.clone(),
        };
        if PERMANENT_STATUSES.contains(&recipient.status.as_str()) {
            Err(SendError::permanent(message))
        } else {
            Err(SendError::transient(message))
        }
    }
}

#[async_trait]
impl ChannelAdapter for SmsAdapter {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(
        &self,
        to: &str,
        _subject: Option<&str>,
        body: &str,
    ) -> Result<ProviderReceipt, SendError> {
        debug!(to, sender_id = ?self.sender_id, "submitting sms");
        let response = self
            .transport
            .submit(to, body, self.sender_id.as_deref())
            .await?;
        Self::interpret(&response)
    }
}

/// HTTP transport for the real gateway (form-encoded POST, api key header).
pub struct HttpSmsTransport {
    client: reqwest::Client,
    api_url: String,
    username: String,
    api_key: String,
}

impl HttpSmsTransport {
    pub fn new(api_url: impl Into<String>, username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            username: username.into(),
            api_key: api_key.into(),
        }
    }

    fn classify_http(err: reqwest::Error) -> SendError {
        if err.is_timeout() || err.is_connect() {
            return SendError::transient(err.to_string());
        }
        match err.status() {
            Some(status) if status.is_client_error() => SendError::permanent(err.to_string()),
            _ => SendError::transient(err.to_string()),
        }
    }
}

#[async_trait]
impl SmsTransport for HttpSmsTransport {
    async fn submit(
        &self,
        to: &str,
        message: &str,
        sender_id: Option<&str>,
    ) -> Result<SmsResponse, SendError> {
        let mut form = vec![
            ("username", self.username.as_str()),
            ("to", to),
            ("message", message),
        ];
        if let Some(from) = sender_id {
            form.push(("from", from));
        }

        let response = self
            .client
            .post(&self.api_url)
            .header("apiKey", &self.api_key)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(Self::classify_http)?
            .error_for_status()
            .map_err(Self::classify_http)?;

        response
            .json::<SmsResponse>()
            .await
            .map_err(|e| SendError::transient(format!("malformed gateway response: {e}")))
    }
}
