//! Fan-out over every configured calendar source.

use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use futures_util::future::join_all;
use homeboard_core::{DashboardEvent, TimeWindow};
use homeboard_providers::{
    CalendarSource, FetchOptions, NormalizeContext, ProviderError, ProviderErrorCode,
    normalize_events,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::FillAborted;

/// One source's failure, kept as plain data so the error can be cloned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub code: ProviderErrorCode,
    pub message: String,
}

impl SourceFailure {
    fn from_provider(source: &str, error: &ProviderError) -> Self {
        Self {
            source: source.to_string(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AggregateError {
    #[error("all {} calendar sources failed", failures.len())]
    AllSourcesFailed { failures: Vec<SourceFailure> },

    #[error("failed to encode events: {message}")]
    Encode { message: String },

    #[error(transparent)]
    FillAborted(#[from] FillAborted),
}

/// Fetches a window from every source concurrently and merges the results.
pub struct Aggregator {
    sources: Vec<Arc<dyn CalendarSource>>,
    timeout: Duration,
    local_offset: FixedOffset,
}

impl Aggregator {
    pub fn new(
        sources: Vec<Arc<dyn CalendarSource>>,
        timeout: Duration,
        local_offset: FixedOffset,
    ) -> Self {
        Self {
            sources,
            timeout,
            local_offset,
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Events for `window` in source order, then each source's own order.
    ///
    /// A source that errors or exceeds the timeout is logged and left out.
    /// Fails only when there was at least one source and none succeeded.
    pub async fn aggregate(&self, window: TimeWindow) -> Result<Vec<DashboardEvent>, AggregateError> {
        let options = FetchOptions::new(window.clone()).with_local_offset(self.local_offset);
        let context = NormalizeContext::new(window, self.local_offset);

        let fetches = self.sources.iter().map(|source| {
            let options = options.clone();
            async move {
                let name = source.name();
                let result = match tokio::time::timeout(self.timeout, source.fetch_events(options)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::timeout(self.timeout).with_provider(name)),
                };
                (name, result)
            }
        });
        let results = join_all(fetches).await;

        let mut events = Vec::new();
        let mut failures = Vec::new();
        for (name, result) in results {
            match result {
                Ok(fetched) => {
                    let normalized = normalize_events(&fetched.events, &context);
                    debug!(
                        source = %name,
                        fetched = fetched.len(),
                        kept = normalized.len(),
                        "source fetched"
                    );
                    events.extend(normalized);
                }
                Err(e) => {
                    warn!(source = %name, code = e.code().as_str(), error = %e, "source failed, omitting");
                    failures.push(SourceFailure::from_provider(name, &e));
                }
            }
        }

        if !self.sources.is_empty() && failures.len() == self.sources.len() {
            return Err(AggregateError::AllSourcesFailed { failures });
        }

        info!(
            sources = self.sources.len(),
            failed = failures.len(),
            events = events.len(),
            "aggregated window"
        );
        Ok(events)
    }

    /// [`aggregate`](Self::aggregate), serialized as the JSON response body.
    pub async fn aggregate_json(&self, window: TimeWindow) -> Result<String, AggregateError> {
        let events = self.aggregate(window).await?;
        serde_json::to_string(&events).map_err(|e| AggregateError::Encode {
            message: e.to_string(),
        })
    }
}
