//! [`CalendarSource`] for Google Calendar.

use std::sync::Arc;

use tracing::debug;

use crate::credentials::CredentialStore;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarSource, FetchOptions, FetchResult};
use crate::raw_event::RawEvent;

use super::client::GoogleCalendarClient;
use super::config::GoogleConfig;
use super::store::GoogleCredentialStore;

pub struct GoogleSource {
    name: String,
    calendar_ids: Vec<String>,
    client: GoogleCalendarClient,
    credentials: Arc<dyn CredentialStore>,
}

impl GoogleSource {
    /// Builds a source backed by the token file in `config`.
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        config.validate().map_err(ProviderError::configuration)?;
        let store = GoogleCredentialStore::new(config)?;
        Self::with_credential_store(config, Arc::new(store))
    }

    /// Builds a source with an explicit credential store.
    pub fn with_credential_store(
        config: &GoogleConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> ProviderResult<Self> {
        Ok(Self {
            name: "google".to_string(),
            calendar_ids: config.calendar_ids.clone(),
            client: GoogleCalendarClient::new(&config.api_base_url, config.timeout)?,
            credentials,
        })
    }

    async fn fetch(&self, options: FetchOptions) -> ProviderResult<FetchResult> {
        let credential = self
            .credentials
            .acquire()
            .await
            .map_err(|e| e.with_provider(&self.name))?;
        debug!(outcome = credential.outcome(), "acquired Google credential");
        let access_token = credential
            .into_access_token()
            .map_err(|e| e.with_provider(&self.name))?;

        let mut events = Vec::new();
        for calendar_id in &self.calendar_ids {
            let remaining = options.max_results.map(|max| max.saturating_sub(events.len()));
            if remaining == Some(0) {
                break;
            }
            let batch = self
                .client
                .list_events(
                    &access_token,
                    calendar_id,
                    options.window.start,
                    options.window.end,
                    remaining,
                )
                .await
                .map_err(|e| e.with_provider(&self.name))?;
            events.extend(batch.into_iter().map(RawEvent::Calendar));
        }

        Ok(FetchResult::with_events(events))
    }
}

impl CalendarSource for GoogleSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_events(&self, options: FetchOptions) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        Box::pin(self.fetch(options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentialStore;
    use crate::error::ProviderErrorCode;
    use crate::google::config::OAuthCredentials;
    use chrono::{TimeZone, Utc};
    use homeboard_core::TimeWindow;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> GoogleConfig {
        GoogleConfig::new(OAuthCredentials::new(
            "test-client.apps.googleusercontent.com",
            "test-secret",
        ))
        .with_api_base_url(base_url)
    }

    fn options() -> FetchOptions {
        FetchOptions::new(TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 10, 4, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 17, 4, 0, 0).unwrap(),
        ))
    }

    async fn calendar(server: &MockServer, id: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/calendars/{id}/events")))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn reads_calendars_in_order() {
        let server = MockServer::start().await;
        calendar(
            &server,
            "primary",
            r#"{"items":[{"id":"e1","summary":"Dentist","start":{"dateTime":"2024-01-10T14:00:00-05:00"}}]}"#,
        )
        .await;
        calendar(
            &server,
            "family",
            r#"{"items":[{"id":"f1","summary":"Recital","start":{"date":"2024-01-12"}}]}"#,
        )
        .await;

        let source = GoogleSource::with_credential_store(
            &config(server.uri()).with_calendar_ids(vec!["primary".into(), "family".into()]),
            Arc::new(StaticCredentialStore::new("ya29.test")),
        )
        .unwrap();

        let result = source.fetch_events(options()).await.unwrap();
        assert_eq!(result.len(), 2);
        match &result.events[1] {
            RawEvent::Calendar(event) => assert_eq!(event.id.as_deref(), Some("f1")),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn interactive_required_fails_the_source() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let source = GoogleSource::with_credential_store(
            &config(server.uri()),
            Arc::new(StaticCredentialStore::interactive_required("consent needed")),
        )
        .unwrap();

        let err = source.fetch_events(options()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::AuthenticationFailed);
        assert_eq!(err.provider(), Some("google"));
    }

    #[tokio::test]
    async fn upstream_error_is_tagged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("backend error"))
            .mount(&server)
            .await;

        let source = GoogleSource::with_credential_store(
            &config(server.uri()),
            Arc::new(StaticCredentialStore::new("ya29.test")),
        )
        .unwrap();

        let err = source.fetch_events(options()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ServerError);
        assert!(err.to_string().starts_with("[google]"));
    }

    #[test]
    fn rejects_invalid_config() {
        let bad = GoogleConfig::new(OAuthCredentials::new("nope", "secret"));
        assert!(GoogleSource::new(&bad).is_err());
    }
}
