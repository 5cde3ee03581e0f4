//! `homeboard serve`: builds the sources from config and runs the server
//! until SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;

use homeboard_providers::{CalendarSource, ErrorSource, ProviderError};
use homeboard_server::{Aggregator, Server, SignalHandler};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

pub async fn run(bind: Option<SocketAddr>, config: &AppConfig) -> CliResult<()> {
    let mut server_config = config.server.to_server_config().map_err(CliError::config)?;
    if let Some(bind) = bind {
        server_config = server_config.with_bind(bind);
    }

    let sources = build_sources(config);
    if sources.is_empty() {
        warn!("no calendar sources configured; every window will be empty");
    }
    for source in &sources {
        info!(name = source.name(), "source registered");
    }

    let aggregator = Aggregator::new(
        sources,
        server_config.upstream_timeout,
        server_config.local_offset,
    );
    let server = Server::bind(server_config, aggregator).await?;

    let signals = SignalHandler::new();
    signals.spawn_listener();
    server.run(signals.shutdown()).await?;
    Ok(())
}

/// One source per configured section, in the order google, school.
///
/// A section that cannot be turned into a source does not stop the server:
/// it is registered as an [`ErrorSource`] so every request logs why it is
/// missing while the other sources keep serving.
pub fn build_sources(config: &AppConfig) -> Vec<Arc<dyn CalendarSource>> {
    let mut sources: Vec<Arc<dyn CalendarSource>> = Vec::new();

    if let Some(ref google) = config.google {
        sources.push(google_source(google, config));
    }
    if let Some(ref school) = config.school {
        sources.push(school_source(school));
    }

    sources
}

fn unavailable(name: &str, error: ProviderError) -> Arc<dyn CalendarSource> {
    warn!(source = name, error = %error, "source unavailable");
    Arc::new(ErrorSource::new(name, error))
}

#[cfg(feature = "google")]
fn google_source(
    settings: &crate::config::GoogleSettings,
    config: &AppConfig,
) -> Arc<dyn CalendarSource> {
    use homeboard_providers::google::GoogleSource;

    let built = settings
        .to_provider_config(config)
        .map_err(ProviderError::configuration)
        .and_then(|google| GoogleSource::new(&google));
    match built {
        Ok(source) => Arc::new(source),
        Err(e) => unavailable("google", e),
    }
}

#[cfg(not(feature = "google"))]
fn google_source(
    _settings: &crate::config::GoogleSettings,
    _config: &AppConfig,
) -> Arc<dyn CalendarSource> {
    unavailable(
        "google",
        ProviderError::configuration("built without the google feature"),
    )
}

#[cfg(feature = "school")]
fn school_source(settings: &crate::config::SchoolSettings) -> Arc<dyn CalendarSource> {
    use homeboard_providers::school::SchoolSource;

    let built = settings
        .to_provider_config()
        .map_err(ProviderError::configuration)
        .and_then(|school| SchoolSource::new(&school));
    match built {
        Ok(source) => Arc::new(source),
        Err(e) => unavailable("school", e),
    }
}

#[cfg(not(feature = "school"))]
fn school_source(_settings: &crate::config::SchoolSettings) -> Arc<dyn CalendarSource> {
    unavailable(
        "school",
        ProviderError::configuration("built without the school feature"),
    )
}
