//! Google Calendar API v3 client.
//!
//! Only `events.list` is used. Responses are deserialized into private
//! `Api*` structs and narrowed into [`RawCalendarEvent`]s here, so nothing
//! Google-shaped leaks past this module.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use homeboard_core::ResponseStatus;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult, from_reqwest, from_status};
use crate::raw_event::{RawAttendee, RawCalendarEvent, RawEventTime};

/// Google caps `maxResults` at 2500; 250 is its default page size.
const PAGE_SIZE: usize = 250;

#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GoogleCalendarClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("homeboard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Lists single (expanded) events starting in `[time_min, time_max)`,
    /// ordered by start time, following `nextPageToken` until done or
    /// `max_results` is reached.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        max_results: Option<usize>,
    ) -> ProviderResult<Vec<RawCalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self
                .list_events_page(access_token, calendar_id, time_min, time_max, page_token.as_deref())
                .await?;

            events.extend(page.items.into_iter().filter_map(convert_event));

            if let Some(max) = max_results
                && events.len() >= max
            {
                events.truncate(max);
                break;
            }
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(calendar_id, count = events.len(), "fetched Google events");
        Ok(events)
    }

    async fn list_events_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        );

        let mut request = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", PAGE_SIZE.to_string()),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| from_reqwest("events.list", e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| from_reqwest("events.list", e))?;

        if !status.is_success() {
            return Err(from_status(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response("events.list returned unexpected JSON").with_source(e)
        })
    }
}

/// Narrows an API event. Cancelled instances are dropped; missing
/// required fields are left as `None` for the normalizer to reject.
fn convert_event(event: ApiEvent) -> Option<RawCalendarEvent> {
    if event.status.as_deref() == Some("cancelled") {
        return None;
    }

    let start = event.start.and_then(|time| convert_time(time, event.id.as_deref()));
    let attendees = event.attendees.map(|list| {
        list.into_iter()
            .map(|a| RawAttendee {
                email: a.email,
                is_self: a.is_self.unwrap_or(false),
                response_status: a
                    .response_status
                    .as_deref()
                    .map(ResponseStatus::from_google)
                    .unwrap_or_default(),
            })
            .collect()
    });

    Some(RawCalendarEvent {
        id: event.id,
        summary: event.summary,
        description: event.description,
        location: event.location,
        start,
        attendees,
    })
}

fn convert_time(time: ApiEventTime, id: Option<&str>) -> Option<RawEventTime> {
    if let Some(raw) = time.date_time {
        return match DateTime::parse_from_rfc3339(&raw) {
            Ok(dt) => Some(RawEventTime::DateTime(dt)),
            Err(e) => {
                warn!(id, value = %raw, error = %e, "unparsable event dateTime");
                None
            }
        };
    }
    let raw = time.date?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(RawEventTime::Date(date)),
        Err(e) => {
            warn!(id, value = %raw, error = %e, "unparsable event date");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    status: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<ApiEventTime>,
    attendees: Option<Vec<ApiAttendee>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAttendee {
    email: Option<String>,
    #[serde(rename = "self")]
    is_self: Option<bool>,
    response_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 1, 10, 4, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 17, 4, 0, 0).unwrap(),
        )
    }

    fn parse_one(json: &str) -> Option<RawCalendarEvent> {
        convert_event(serde_json::from_str(json).unwrap())
    }

    mod conversion {
        use super::*;

        #[test]
        fn timed_event_keeps_offset() {
            let event = parse_one(
                r#"{"id":"e1","summary":"Dentist","start":{"dateTime":"2024-01-10T14:00:00-05:00","timeZone":"America/New_York"}}"#,
            )
            .unwrap();
            match event.start.unwrap() {
                RawEventTime::DateTime(dt) => assert_eq!(dt.to_rfc3339(), "2024-01-10T14:00:00-05:00"),
                other => panic!("unexpected start {other:?}"),
            }
            assert!(event.attendees.is_none());
        }

        #[test]
        fn all_day_event() {
            let event =
                parse_one(r#"{"id":"h","summary":"Holiday","start":{"date":"2024-01-12"}}"#).unwrap();
            assert_eq!(
                event.start,
                Some(RawEventTime::Date(NaiveDate::from_ymd_opt(2024, 1, 12).unwrap()))
            );
        }

        #[test]
        fn attendees_and_self_flag() {
            let event = parse_one(
                r#"{"id":"m","summary":"Meeting","start":{"dateTime":"2024-01-10T10:00:00Z"},
                    "attendees":[
                        {"email":"boss@example.com","responseStatus":"accepted","organizer":true},
                        {"email":"me@example.com","self":true,"responseStatus":"declined"}
                    ]}"#,
            )
            .unwrap();
            let attendees = event.attendees.unwrap();
            assert_eq!(attendees.len(), 2);
            assert!(!attendees[0].is_self);
            assert!(attendees[1].is_self);
            assert_eq!(attendees[1].response_status, ResponseStatus::Declined);
        }

        #[test]
        fn cancelled_events_are_dropped() {
            assert!(parse_one(r#"{"id":"c","status":"cancelled"}"#).is_none());
        }

        #[test]
        fn bad_start_is_left_empty() {
            let event =
                parse_one(r#"{"id":"b","summary":"Bad","start":{"dateTime":"yesterday-ish"}}"#)
                    .unwrap();
            assert!(event.start.is_none());
        }
    }

    mod http {
        use super::*;
        use crate::error::ProviderErrorCode;

        #[tokio::test]
        async fn follows_pagination() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/calendars/primary/events"))
                .and(query_param("pageToken", "p2"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"{"items":[{"id":"b","summary":"Second","start":{"dateTime":"2024-01-11T09:00:00Z"}}]}"#,
                ))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/calendars/primary/events"))
                .and(header("authorization", "Bearer ya29.token"))
                .and(query_param("singleEvents", "true"))
                .and(query_param("orderBy", "startTime"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    r#"{"items":[{"id":"a","summary":"First","start":{"dateTime":"2024-01-10T09:00:00Z"}}],"nextPageToken":"p2"}"#,
                ))
                .expect(1)
                .mount(&server)
                .await;

            let client = GoogleCalendarClient::new(server.uri(), Duration::from_secs(5)).unwrap();
            let (min, max) = window();
            let events = client
                .list_events("ya29.token", "primary", min, max, None)
                .await
                .unwrap();

            let ids: Vec<_> = events.iter().filter_map(|e| e.id.as_deref()).collect();
            assert_eq!(ids, vec!["a", "b"]);
        }

        #[tokio::test]
        async fn encodes_calendar_id() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/calendars/family%40group.calendar.google.com/events"))
                .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"items":[]}"#))
                .expect(1)
                .mount(&server)
                .await;

            let client = GoogleCalendarClient::new(server.uri(), Duration::from_secs(5)).unwrap();
            let (min, max) = window();
            let events = client
                .list_events("t", "family@group.calendar.google.com", min, max, None)
                .await
                .unwrap();
            assert!(events.is_empty());
        }

        #[tokio::test]
        async fn unauthorized_is_auth_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;

            let client = GoogleCalendarClient::new(server.uri(), Duration::from_secs(5)).unwrap();
            let (min, max) = window();
            let err = client
                .list_events("stale", "primary", min, max, None)
                .await
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        }

        #[tokio::test]
        async fn garbage_body_is_invalid_response() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
                .mount(&server)
                .await;

            let client = GoogleCalendarClient::new(server.uri(), Duration::from_secs(5)).unwrap();
            let (min, max) = window();
            let err = client
                .list_events("t", "primary", min, max, None)
                .await
                .unwrap_err();
            assert_eq!(err.code(), ProviderErrorCode::InvalidResponse);
        }
    }
}
