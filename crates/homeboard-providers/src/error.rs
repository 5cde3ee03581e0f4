//! Error types for calendar source operations.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The category of a source error.
///
/// Used for log fields and for summarising failures in aggregate errors,
/// where the full error (and its boxed source) cannot be cloned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// No usable credential: missing, revoked, or interactive consent needed.
    AuthenticationFailed,
    /// Connection failure, DNS resolution, reset.
    NetworkError,
    /// The source did not answer within its time budget.
    Timeout,
    /// Upstream answered 429.
    RateLimited,
    /// Upstream answered 5xx or another unexpected status.
    ServerError,
    /// Upstream answered but the body could not be understood.
    InvalidResponse,
    /// Missing or invalid configuration.
    ConfigurationError,
    /// Unexpected local state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if a later attempt might succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::RateLimited | Self::ServerError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised while fetching from a calendar source.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// The source that raised it (e.g. "google", "school").
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// A source exceeded its deadline.
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ProviderErrorCode::Timeout,
            format!("no response within {}ms", after.as_millis()),
        )
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Tags the error with the name of the source that raised it.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Maps a transport-level reqwest failure to a source error.
#[cfg(any(feature = "google", feature = "school"))]
pub(crate) fn from_reqwest(context: &str, err: reqwest::Error) -> ProviderError {
    let provider_error = if err.is_timeout() {
        ProviderError::new(ProviderErrorCode::Timeout, format!("{context}: request timed out"))
    } else if err.is_connect() {
        ProviderError::network(format!("{context}: connection failed"))
    } else if err.is_decode() || err.is_body() {
        ProviderError::invalid_response(format!("{context}: could not read response body"))
    } else {
        ProviderError::network(format!("{context}: request failed"))
    };
    provider_error.with_source(err)
}

/// Maps a non-success HTTP status to a source error.
#[cfg(any(feature = "google", feature = "school"))]
pub(crate) fn from_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
    let snippet: String = body.chars().take(200).collect();
    match status.as_u16() {
        401 | 403 => ProviderError::authentication(format!("upstream rejected credentials ({status})")),
        429 => ProviderError::rate_limited(format!("rate limit exceeded ({status})")),
        _ => ProviderError::server(format!("upstream error ({status}): {snippet}")),
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
