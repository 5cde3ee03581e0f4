//! [`CalendarSource`] for the school day-rotation feed.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarSource, FetchOptions, FetchResult};
use crate::raw_event::{RawEvent, RawSchoolEvent};

use super::client::SchoolCalendarClient;
use super::config::SchoolConfig;

pub struct SchoolSource {
    name: String,
    calendar_id: String,
    schedule: BTreeMap<String, String>,
    client: SchoolCalendarClient,
}

impl SchoolSource {
    pub fn new(config: &SchoolConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;
        Ok(Self {
            name: "school".to_string(),
            calendar_id: config.calendar_id.clone(),
            schedule: config.schedule.clone(),
            client: SchoolCalendarClient::new(&config.endpoint, config.timeout)?,
        })
    }

    async fn fetch(&self, options: FetchOptions) -> ProviderResult<FetchResult> {
        let start = options.window.start_day(options.local_offset);
        let end = options.window.end_day(options.local_offset);

        let days = self
            .client
            .list_days(&self.calendar_id, start, end)
            .await
            .map_err(|e| e.with_provider(&self.name))?;

        let mut events: Vec<RawEvent> = days
            .into_iter()
            .filter_map(|day| match self.schedule.get(&day.name) {
                Some(details) => Some(RawSchoolEvent::new(day.name, day.date).with_details(details).into()),
                None => {
                    trace!(name = %day.name, "school day not in schedule");
                    None
                }
            })
            .collect();
        if let Some(max) = options.max_results {
            events.truncate(max);
        }

        debug!(%start, %end, count = events.len(), "mapped school days");
        Ok(FetchResult::with_events(events))
    }
}

impl CalendarSource for SchoolSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_events(&self, options: FetchOptions) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        Box::pin(self.fetch(options))
    }
}
