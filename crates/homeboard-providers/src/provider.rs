//! The [`CalendarSource`] trait.
//!
//! A source turns a time window into a list of [`RawEvent`]s. It owns its
//! own transport and credentials; callers only see the trait.

use std::future::Future;
use std::pin::Pin;

use chrono::{FixedOffset, Offset, Utc};
use homeboard_core::TimeWindow;

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::RawEvent;

/// Events fetched from one source.
#[derive(Debug, Default)]
pub struct FetchResult {
    pub events: Vec<RawEvent>,
}

impl FetchResult {
    pub fn with_events(events: Vec<RawEvent>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// What to fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub window: TimeWindow,
    /// Offset used to turn the window into local calendar dates.
    pub local_offset: FixedOffset,
    /// Upper bound on events returned per source.
    pub max_results: Option<usize>,
}

impl FetchOptions {
    /// Options for `window`, with UTC as the local offset.
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            local_offset: Utc.fix(),
            max_results: None,
        }
    }

    pub fn with_local_offset(mut self, offset: FixedOffset) -> Self {
        self.local_offset = offset;
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}

/// A boxed future so [`CalendarSource`] stays object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A calendar backend the dashboard aggregates.
///
/// ```ignore
/// struct Holidays;
///
/// impl CalendarSource for Holidays {
///     fn name(&self) -> &str { "holidays" }
///
///     fn fetch_events(&self, options: FetchOptions) -> BoxFuture<'_, ProviderResult<FetchResult>> {
///         Box::pin(async move { Ok(FetchResult::with_events(lookup(&options.window))) })
///     }
/// }
/// ```
pub trait CalendarSource: Send + Sync {
    /// Short name used in logs and error tags.
    fn name(&self) -> &str;

    /// Fetches raw events for the window in `options`.
    ///
    /// Implementations handle pagination themselves. They need not apply a
    /// deadline; the aggregator bounds every call.
    fn fetch_events(&self, options: FetchOptions) -> BoxFuture<'_, ProviderResult<FetchResult>>;
}

/// A source that always fails.
///
/// Stands in for a source whose configuration could not be loaded, so the
/// failure shows up per request instead of stopping the server.
#[derive(Debug)]
pub struct ErrorSource {
    name: String,
    error: ProviderError,
}

impl ErrorSource {
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

impl CalendarSource for ErrorSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_events(&self, _options: FetchOptions) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        // ProviderError holds a boxed source and is not Clone
        let error =
            ProviderError::new(self.error.code(), self.error.message()).with_provider(&self.name);
        Box::pin(async move { Err(error) })
    }
}
