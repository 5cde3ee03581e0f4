//! HTTP client for the school calendar feed.
//!
//! The feed takes a JSON POST with a calendar id and an inclusive range of
//! local dates, and answers with the named days in that range:
//!
//! ```text
//! > {"calendarId":"district-main","localStartDate":"2024-01-10","localEndDate":"2024-01-17"}
//! < {"events":[{"name":"Day 1","localStartDate":"2024-01-10"}]}
//! ```

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult, from_reqwest, from_status};

/// A named day returned by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolDay {
    pub name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct SchoolCalendarClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl SchoolCalendarClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("homeboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;
        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    /// Fetches the named days between two local dates, inclusive.
    pub async fn list_days(
        &self,
        calendar_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<SchoolDay>> {
        let request = DaysRequest {
            calendar_id,
            local_start_date: start,
            local_end_date: end,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| ProviderError::internal("failed to encode request").with_source(e))?;

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| from_reqwest("school calendar", e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| from_reqwest("school calendar", e))?;

        if !status.is_success() {
            return Err(from_status(status, &text));
        }

        let parsed: DaysResponse = serde_json::from_str(&text).map_err(|e| {
            ProviderError::invalid_response("school calendar returned unexpected JSON")
                .with_source(e)
        })?;

        let days: Vec<SchoolDay> = parsed
            .events
            .into_iter()
            .filter_map(|event| {
                let (Some(name), Some(raw_date)) = (event.name, event.local_start_date) else {
                    warn!("skipping school day without name or localStartDate");
                    return None;
                };
                match NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d") {
                    Ok(date) => Some(SchoolDay { name, date }),
                    Err(e) => {
                        warn!(%name, value = %raw_date, error = %e, "skipping school day with bad date");
                        None
                    }
                }
            })
            .collect();

        debug!(calendar_id, count = days.len(), "fetched school days");
        Ok(days)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DaysRequest<'a> {
    calendar_id: &'a str,
    local_start_date: NaiveDate,
    local_end_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct DaysResponse {
    #[serde(default)]
    events: Vec<ApiSchoolEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSchoolEvent {
    name: Option<String>,
    local_start_date: Option<String>,
}
