//! Binding and running the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::aggregate::{AggregateError, Aggregator};
use crate::cache::ResponseCache;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::http::{AppState, router};
use crate::signals::ShutdownSignal;

/// A bound, not yet running server.
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Validates `config` and binds its address.
    pub async fn bind(config: ServerConfig, aggregator: Aggregator) -> ServerResult<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|e| ServerError::bind(config.bind, e))?;
        let cache: ResponseCache<AggregateError> = ResponseCache::new(config.cache_ttl);
        Ok(Self {
            listener,
            state: AppState::new(Arc::new(aggregator), cache),
            config,
        })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn cache(&self) -> &ResponseCache<AggregateError> {
        &self.state.cache
    }

    /// Serves until `shutdown` fires, sweeping the cache in the background.
    pub async fn run(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let origin = self.config.origin_header()?;
        let addr = self.local_addr()?;
        let sweeper = self.state.cache.spawn_sweeper(self.config.cache_check_period);

        info!(
            %addr,
            origin = %self.config.allowed_origin,
            sources = ?self.state.aggregator.source_names(),
            ttl_secs = self.config.cache_ttl.as_secs(),
            "homeboard listening"
        );

        let app = router(self.state, origin);
        let result = axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await;
        sweeper.abort();
        info!("server stopped");
        Ok(result?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalHandler;
    use crate::testing::{FakeSource, dentist, eastern, sources};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn aggregator() -> Aggregator {
        let fakes = [FakeSource::ok("google", vec![dentist()])];
        Aggregator::new(sources(&fakes), Duration::from_secs(1), eastern())
    }

    fn config() -> ServerConfig {
        ServerConfig::default().with_bind("127.0.0.1:0".parse().unwrap())
    }

    #[tokio::test]
    async fn bind_rejects_invalid_config() {
        let bad = config().with_allowed_origin("nope");
        assert!(matches!(
            Server::bind(bad, aggregator()).await,
            Err(ServerError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = Server::bind(config(), aggregator()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let second = Server::bind(config().with_bind(taken), aggregator()).await;
        assert!(matches!(second, Err(ServerError::Bind { addr, .. }) if addr == taken));
    }

    #[tokio::test]
    async fn serves_and_shuts_down_gracefully() {
        let server = Server::bind(config(), aggregator()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let signals = SignalHandler::new();
        let task = tokio::spawn(server.run(signals.shutdown()));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"GET /?start=2024-01-10&end=2024-01-17 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            )
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("Dentist"));

        signals.trigger_shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), task).await;
        assert!(result.unwrap().unwrap().is_ok());
    }
}
