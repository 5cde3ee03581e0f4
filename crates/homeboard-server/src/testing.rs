//! Fake sources and fixtures shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use homeboard_core::TimeWindow;
use homeboard_providers::{
    BoxFuture, CalendarSource, FetchOptions, FetchResult, ProviderError, ProviderResult,
    RawCalendarEvent, RawEvent, RawEventTime, RawSchoolEvent,
};

#[derive(Clone)]
pub struct FakeSource {
    name: String,
    events: Vec<RawEvent>,
    error: Option<(homeboard_providers::ProviderErrorCode, String)>,
    delay: Option<Duration>,
    pub calls: Arc<AtomicUsize>,
    last_options: Arc<Mutex<Option<FetchOptions>>>,
}

impl FakeSource {
    pub fn ok(name: &str, events: Vec<RawEvent>) -> Self {
        Self {
            name: name.to_string(),
            events,
            error: None,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            last_options: Arc::new(Mutex::new(None)),
        }
    }

    pub fn failing(name: &str, error: ProviderError) -> Self {
        let mut source = Self::ok(name, Vec::new());
        source.error = Some((error.code(), error.message().to_string()));
        source
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn last_options(&self) -> Option<FetchOptions> {
        self.last_options.lock().unwrap().clone()
    }
}

impl CalendarSource for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_events(&self, options: FetchOptions) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options);
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.error {
                Some((code, message)) => {
                    Err(ProviderError::new(*code, message.clone()).with_provider(&self.name))
                }
                None => Ok(FetchResult::with_events(self.events.clone())),
            }
        })
    }
}

pub fn sources(fakes: &[FakeSource]) -> Vec<Arc<dyn CalendarSource>> {
    fakes
        .iter()
        .map(|f| Arc::new(f.clone()) as Arc<dyn CalendarSource>)
        .collect()
}

pub fn eastern() -> FixedOffset {
    FixedOffset::west_opt(4 * 3600).unwrap()
}

/// `[2024-01-10T04:00Z, 2024-01-17T04:00Z)`, one week of local days.
pub fn window() -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2024, 1, 10, 4, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 17, 4, 0, 0).unwrap(),
    )
}

pub fn dentist() -> RawEvent {
    RawCalendarEvent::new(
        "e1",
        "Dentist",
        RawEventTime::DateTime(DateTime::parse_from_rfc3339("2024-01-10T14:00:00-05:00").unwrap()),
    )
    .into()
}

pub fn school_day(name: &str, day: u32) -> RawEvent {
    RawSchoolEvent::new(name, NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
        .with_details("John: P.E.\nDorris: Music")
        .into()
}
