//! HTTP proxy for the household dashboard.
//!
//! This crate provides the server that:
//! - fans a time window out to every calendar source ([`Aggregator`])
//! - caches serialized responses per window with a short TTL ([`ResponseCache`])
//! - serves `GET /?start=&end=` with CORS for one origin ([`router`])
//! - shuts down gracefully on SIGINT/SIGTERM ([`SignalHandler`])
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use homeboard_server::{Aggregator, Server, ServerConfig, SignalHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let aggregator = Aggregator::new(Vec::new(), config.upstream_timeout, config.local_offset);
//!     let signals = SignalHandler::new();
//!     signals.spawn_listener();
//!
//!     Server::bind(config, aggregator).await?.run(signals.shutdown()).await?;
//!     Ok(())
//! }
//! ```

mod aggregate;
mod cache;
mod config;
mod error;
mod http;
mod server;
mod signals;

#[cfg(test)]
mod testing;

pub use aggregate::{AggregateError, Aggregator, SourceFailure};
pub use cache::{CacheKey, Clock, FillAborted, ManualClock, ResponseCache, SystemClock};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use http::{AppState, router};
pub use server::Server;
pub use signals::{ShutdownHandle, ShutdownSignal, SignalHandler};
