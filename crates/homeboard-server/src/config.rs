//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use chrono::{FixedOffset, Offset, Utc};

use crate::error::{ServerError, ServerResult};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind: SocketAddr,

    /// The single origin allowed by CORS.
    pub allowed_origin: String,

    /// How long an aggregated response is served from memory.
    pub cache_ttl: Duration,

    /// How often expired cache entries are swept.
    pub cache_check_period: Duration,

    /// Upper bound on each source's fetch.
    pub upstream_timeout: Duration,

    /// Offset that defines the dashboard's local day.
    pub local_offset: FixedOffset,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
            allowed_origin: "http://localhost:5173".to_string(),
            cache_ttl: Duration::from_secs(60),
            cache_check_period: Duration::from_secs(600),
            upstream_timeout: Duration::from_secs(12),
            // -04:00, eastern daylight time
            local_offset: FixedOffset::west_opt(4 * 3600).unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl ServerConfig {
    /// Builder: set the bind address.
    pub fn with_bind(mut self, bind: SocketAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Builder: set the allowed CORS origin.
    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = origin.into();
        self
    }

    /// Builder: set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_cache_check_period(mut self, period: Duration) -> Self {
        self.cache_check_period = period;
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
        self.local_offset = offset;
        self
    }

    /// The allowed origin as a header value, rejecting anything that is
    /// not a bare `scheme://host[:port]`.
    pub fn origin_header(&self) -> ServerResult<HeaderValue> {
        let origin = self.allowed_origin.trim();
        let Some((scheme, rest)) = origin.split_once("://") else {
            return Err(ServerError::config(format!(
                "allowed_origin '{origin}' must look like http://host:port"
            )));
        };
        if !matches!(scheme, "http" | "https") || rest.is_empty() || rest.contains('/') {
            return Err(ServerError::config(format!(
                "allowed_origin '{origin}' must look like http://host:port"
            )));
        }
        HeaderValue::from_str(origin)
            .map_err(|e| ServerError::config(format!("allowed_origin '{origin}': {e}")))
    }

    /// Checks the configuration for values the server cannot run with.
    pub fn validate(&self) -> ServerResult<()> {
        self.origin_header()?;
        if self.cache_ttl.is_zero() {
            return Err(ServerError::config("cache_ttl must be greater than zero"));
        }
        if self.cache_check_period.is_zero() {
            return Err(ServerError::config(
                "cache_check_period must be greater than zero",
            ));
        }
        if self.upstream_timeout.is_zero() {
            return Err(ServerError::config(
                "upstream_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.to_string(), "127.0.0.1:3000");
        assert_eq!(config.allowed_origin, "http://localhost:5173");
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.cache_check_period, Duration::from_secs(600));
        assert_eq!(config.upstream_timeout, Duration::from_secs(12));
        assert_eq!(config.local_offset.local_minus_utc(), -4 * 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn custom_config() {
        let config = ServerConfig::default()
            .with_bind("0.0.0.0:8080".parse().unwrap())
            .with_allowed_origin("http://dashboard.lan:5173")
            .with_cache_ttl(Duration::from_secs(30))
            .with_cache_check_period(Duration::from_secs(120))
            .with_upstream_timeout(Duration::from_secs(5))
            .with_local_offset(FixedOffset::west_opt(5 * 3600).unwrap());

        assert_eq!(config.bind.port(), 8080);
        assert_eq!(
            config.origin_header().unwrap(),
            HeaderValue::from_static("http://dashboard.lan:5173")
        );
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert_eq!(config.local_offset.local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn rejects_bad_origins() {
        for origin in ["localhost:5173", "ftp://host", "http://", "http://host/path"] {
            let config = ServerConfig::default().with_allowed_origin(origin);
            assert!(config.validate().is_err(), "{origin} should be rejected");
        }
    }

    #[test]
    fn rejects_zero_durations() {
        assert!(
            ServerConfig::default()
                .with_cache_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            ServerConfig::default()
                .with_upstream_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
