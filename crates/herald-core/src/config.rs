//! Pipeline configuration.
//!
//! Every tunable lives in one validated structure instead of ad-hoc lookups
//! scattered across services. Defaults match the provider quotas and the
//! delivery retry contract; `validate()` rejects configurations that would
//! wedge the pipeline (zero workers, bad sender address, retention shorter
//! than the retry window).

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("max_retries must be at least 1")]
    NoRetries,

    #[error("retry backoff must be non-zero")]
    ZeroBackoff,

    #[error("{0} rate limit must be at least 1 per minute")]
    ZeroRateLimit(&'static str),

    #[error("email from_address '{0}' is not a plausible address")]
    BadFromAddress(String),

    #[error("failed-notification retention must not be shorter than the retry window")]
    RetentionShorterThanRetryWindow,
}

/// SMS provider settings.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    /// Provider API endpoint.
    pub api_url: String,
    pub username: String,
    pub api_key: String,

    /// Alphanumeric sender id. `None` falls back to the provider default.
    pub sender_id: Option<String>,

    /// Throughput cap (sends per minute). Default: 10.
    pub per_minute: u32,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.africastalking.com/version1/messaging".to_string(),
            username: "sandbox".to_string(),
            api_key: String::new(),
            sender_id: None,
            per_minute: 10,
        }
    }
}

/// Email provider settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Provider API endpoint.
    pub api_url: String,
    pub api_key: String,

    /// Sender address for all customer and admin mail.
    pub from_address: String,

    /// Throughput cap (sends per minute). Default: 30.
    pub per_minute: u32,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: String::new(),
            from_address: "orders@example.com".to_string(),
            per_minute: 30,
        }
    }
}

/// Retry contract for failed sends.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts total per notification. Default: 3.
    pub max_retries: u32,

    /// Delay before a re-attempt. Default: 60 s, fixed (multiplier 1.0).
    pub backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_secs(60),
            backoff_multiplier: 1.0,
        }
    }
}

/// Sweep windows for the background maintenance loop.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Failed rows younger than this are re-enqueued by the retry sweep.
    /// Default: 24 h.
    pub retry_window: Duration,

    /// Failed rows older than this are deleted. Default: 7 d.
    pub purge_after: Duration,

    /// How often the sweeper runs both passes. Default: 15 min.
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            retry_window: Duration::from_secs(24 * 60 * 60),
            purge_after: Duration::from_secs(7 * 24 * 60 * 60),
            sweep_interval: Duration::from_secs(15 * 60),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct HeraldConfig {
    pub sms: SmsConfig,
    pub email: EmailConfig,
    pub retry: RetryConfig,
    pub retention: RetentionConfig,

    /// Worker pool size. Default: 4.
    pub workers: usize,
}

impl HeraldConfig {
    /// Defaults for every tunable; callers override fields as needed.
    pub fn new() -> Self {
        Self {
            workers: 4,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.retry.max_retries == 0 {
            return Err(ConfigError::NoRetries);
        }
        if self.retry.backoff.is_zero() {
            return Err(ConfigError::ZeroBackoff);
        }
        if self.sms.per_minute == 0 {
            return Err(ConfigError::ZeroRateLimit("sms"));
        }
        if self.email.per_minute == 0 {
            return Err(ConfigError::ZeroRateLimit("email"));
        }
        if !self.email.from_address.contains('@') {
            return Err(ConfigError::BadFromAddress(self.email.from_address.clone()));
        }
        if self.retention.purge_after < self.retention.retry_window {
            return Err(ConfigError::RetentionShorterThanRetryWindow);
        }
        Ok(())
    }
}
