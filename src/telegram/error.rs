//! Telegram Bot API error types

use std::time::Duration;
use thiserror::Error;

/// Bot API error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TelegramError {
    pub kind: TelegramErrorKind,
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl TelegramError {
    pub fn new(kind: TelegramErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    #[must_use]
    pub fn with_retry_after(mut self, duration: Duration) -> Self {
        self.retry_after = Some(duration);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TelegramErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(TelegramErrorKind::RateLimit, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(TelegramErrorKind::Api, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TelegramErrorKind::Decode, message)
    }
}

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelegramErrorKind {
    /// Timeouts, refused connections, 5xx - retryable
    Network,
    /// 429 Too Many Requests - retryable after `retry_after`
    RateLimit,
    /// The API rejected the call (bad token, bad markup, chat not found)
    Api,
    /// Response body did not match the expected shape
    Decode,
}

impl TelegramErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Network | Self::RateLimit)
    }
}
