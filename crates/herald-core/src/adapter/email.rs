//! Email adapter.
//!
//! Sends a plain-text body with an HTML alternative. If no template is
//! wired (or the template declines the message), a minimal inline rendering
//! is generated so recipients with HTML-only clients still get a readable
//! message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::{ChannelAdapter, ProviderReceipt, SendError};
use crate::domain::Channel;

/// Fully-addressed outgoing mail handed to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

/// Raw provider call; returns the provider message id when one is issued.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn deliver(&self, mail: &OutboundEmail) -> Result<Option<String>, SendError>;
}

/// Optional HTML renderer. Returning `None` falls back to the inline
/// rendering.
pub trait EmailTemplate: Send + Sync {
    fn name(&self) -> &str;

    fn render(&self, subject: &str, body: &str) -> Option<String>;
}

pub struct EmailAdapter {
    transport: Arc<dyn EmailTransport>,
    from: String,
    template: Option<Arc<dyn EmailTemplate>>,
}

impl EmailAdapter {
    pub fn new(transport: Arc<dyn EmailTransport>, from: impl Into<String>) -> Self {
        Self {
            transport,
            from: from.into(),
            template: None,
        }
    }

    pub fn with_template(mut self, template: Arc<dyn EmailTemplate>) -> Self {
        self.template = Some(template);
        self
    }

    fn render_html(&self, subject: &str, body: &str) -> (String, String) {
        if let Some(template) = &self.template
            && let Some(html) = template.render(subject, body)
        {
            return (html, template.name().to_string());
        }
        (inline_html(subject, body), "inline".to_string())
    }
}

/// Fallback HTML rendering: escaped body inside a minimal document.
fn inline_html(subject: &str, body: &str) -> String {
    format!(
        "<html>\n<body>\n<h2>{}</h2>\n<p>{}</p>\n</body>\n</html>",
        escape(subject),
        escape(body).replace('\n', "<br>\n"),
    )
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(
        &self,
        to: &str,
        subject: Option<&str>,
        body: &str,
    ) -> Result<ProviderReceipt, SendError> {
        let subject = subject.unwrap_or("Notification");
        let (html, template) = self.render_html(subject, body);

        let mail = OutboundEmail {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            text: body.to_string(),
            html: Some(html),
        };

        debug!(to, subject, template, "submitting email");
        let provider_message_id = self.transport.deliver(&mail).await?;
        Ok(ProviderReceipt {
            provider_message_id,
            cost: None,
            units: None,
            template: Some(template),
        })
    }
}

/// HTTP transport for a JSON email API (bearer-token POST).
pub struct HttpEmailTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct EmailApiResponse {
    id: Option<String>,
}

impl HttpEmailTransport {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
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
impl EmailTransport for HttpEmailTransport {
    async fn deliver(&self, mail: &OutboundEmail) -> Result<Option<String>, SendError> {
        let payload = serde_json::json!({
            "from": mail.from,
            "to": [mail.to],
            "subject": mail.subject,
            "text": mail.text,
            "html": mail.html,
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(Self::classify_http)?
            .error_for_status()
            .map_err(Self::classify_http)?;

        let parsed = response
            .json::<EmailApiResponse>()
            .await
            .map_err(|e| SendError::transient(format!("malformed provider response: {e}")))?;
        Ok(parsed.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CapturingTransport {
        sent: Mutex<Vec<OutboundEmail>>,
        message_id: Option<String>,
    }

    impl CapturingTransport {
        fn new(message_id: Option<&str>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                message_id: message_id.map(String::from),
            }
        }
    }

    #[async_trait]
    impl EmailTransport for CapturingTransport {
        async fn deliver(&self, mail: &OutboundEmail) -> Result<Option<String>, SendError> {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(self.message_id.clone())
        }
    }

    struct UpperTemplate;

    impl EmailTemplate for UpperTemplate {
        fn name(&self) -> &str {
            "upper"
        }

        fn render(&self, subject: &str, _body: &str) -> Option<String> {
            Some(format!("<h1>{}</h1>", subject.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn sends_text_with_inline_html_fallback() {
        let transport = Arc::new(CapturingTransport::new(Some("em_1")));
        let adapter = EmailAdapter::new(transport.clone(), "orders@example.com");

        let receipt = adapter
            .send("jane@example.com", Some("Order Confirmation"), "Thanks <3\nSee you")
            .await
            .unwrap();

        assert_eq!(receipt.provider_message_id.as_deref(), Some("em_1"));
        assert_eq!(receipt.template.as_deref(), Some("inline"));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, "orders@example.com");
        assert_eq!(sent[0].subject, "Order Confirmation");
        let html = sent[0].html.as_deref().unwrap();
        assert!(html.contains("Thanks &lt;3<br>"));
    }

    #[tokio::test]
    async fn wired_template_takes_precedence_over_inline() {
        let transport = Arc::new(CapturingTransport::new(None));
        let adapter = EmailAdapter::new(transport.clone(), "orders@example.com")
            .with_template(Arc::new(UpperTemplate));

        let receipt = adapter
            .send("jane@example.com", Some("hello"), "body")
            .await
            .unwrap();

        assert_eq!(receipt.template.as_deref(), Some("upper"));
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].html.as_deref(), Some("<h1>HELLO</h1>"));
    }

    #[tokio::test]
    async fn missing_subject_gets_a_default() {
        let transport = Arc::new(CapturingTransport::new(None));
        let adapter = EmailAdapter::new(transport.clone(), "orders@example.com");

        adapter.send("jane@example.com", None, "body").await.unwrap();
        assert_eq!(transport.sent.lock().unwrap()[0].subject, "Notification");
    }
}
