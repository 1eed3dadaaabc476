use crate::types::FailureKind;
use std::time::Duration;
use thiserror::Error;

/// Error surfaced by a provider invocation.
///
/// Provider clients map their transport and response failures onto these variants so
/// the selector can tell a rate-limit signal apart from a generic failure.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider refused the request because of its rate limit.
    /// `retry_after` overrides the configured rate-limit window when present.
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Classifies the error. HTTP 429 counts as a rate limit.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RateLimited { .. } | Self::Http { status: 429, .. } => FailureKind::RateLimit,
            Self::Timeout => FailureKind::Timeout,
            Self::Http { .. } => FailureKind::Http,
            Self::Connection(_) => FailureKind::Connection,
            Self::InvalidResponse(_) => FailureKind::InvalidResponse,
            Self::Other(_) => FailureKind::Other,
        }
    }

    /// Provider-supplied retry hint, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Configuration errors of the provider selector. Reported immediately, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("no providers registered")]
    NoProvidersRegistered,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("provider already registered: {0}")]
    DuplicateProvider(String),

    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
}
