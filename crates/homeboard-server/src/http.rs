//! The dashboard's HTTP surface: `GET /?start=&end=`.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use homeboard_core::{TimeWindow, parse_instant};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::aggregate::{AggregateError, Aggregator};
use crate::cache::{CacheKey, ResponseCache};

/// Shared state behind the router.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub cache: ResponseCache<AggregateError>,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>, cache: ResponseCache<AggregateError>) -> Self {
        Self { aggregator, cache }
    }
}

#[derive(Debug, Deserialize)]
struct WindowQuery {
    start: Option<String>,
    end: Option<String>,
}

/// Builds the router. Only `allowed_origin` may read responses cross-origin.
pub fn router(state: AppState, allowed_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/", get(events_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Response {
    let (Some(start), Some(end)) = (query.start, query.end) else {
        debug!("missing start or end");
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(window) = parse_window(&start, &end) else {
        debug!(%start, %end, "rejected window");
        return StatusCode::NOT_FOUND.into_response();
    };

    let key = CacheKey::new(start, end);
    let aggregator = Arc::clone(&state.aggregator);
    let result = state
        .cache
        .get_or_try_insert_with(key.clone(), move || async move {
            aggregator.aggregate_json(window).await
        })
        .await;

    match result {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            warn!(key = %key, error = %e, "no events available");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Parses both bounds; `None` when either is unparsable or `start > end`.
fn parse_window(start: &str, end: &str) -> Option<TimeWindow> {
    let start = parse_instant(start)?;
    let end = parse_instant(end)?;
    TimeWindow::try_new(start, end).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSource, dentist, eastern, school_day, sources};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use homeboard_providers::ProviderError;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tower::ServiceExt;

    const WEEK: &str = "/?start=2024-01-10T04:00:00.000Z&end=2024-01-17T04:00:00.000Z";

    fn app(fakes: &[FakeSource], cache: &ResponseCache<AggregateError>) -> Router {
        let aggregator = Aggregator::new(sources(fakes), Duration::from_millis(200), eastern());
        router(
            AppState::new(Arc::new(aggregator), cache.clone()),
            HeaderValue::from_static("http://localhost:5173"),
        )
    }

    fn cache() -> ResponseCache<AggregateError> {
        ResponseCache::new(Duration::from_secs(60))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    mod validation {
        use super::*;

        #[tokio::test]
        async fn missing_or_bad_params_are_not_found() {
            let google = FakeSource::ok("google", vec![dentist()]);
            let cache = cache();

            for uri in [
                "/",
                "/?start=2024-01-10T04:00:00.000Z",
                "/?end=2024-01-17T04:00:00.000Z",
                "/?start=tomorrow&end=2024-01-17T04:00:00.000Z",
                "/?start=2024-01-17T04:00:00.000Z&end=2024-01-10T04:00:00.000Z",
            ] {
                let (status, _, _) = get(app(&[google.clone()], &cache), uri).await;
                assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            }
            assert_eq!(google.calls.load(Ordering::SeqCst), 0);
            assert!(cache.is_empty());
        }

        #[test]
        fn accepts_rfc3339_and_plain_dates() {
            let window = parse_window("2024-01-10", "2024-01-17T00:00:00-04:00").unwrap();
            assert_eq!(window.start.to_rfc3339(), "2024-01-10T00:00:00+00:00");
            assert_eq!(window.end.to_rfc3339(), "2024-01-17T04:00:00+00:00");
            assert!(parse_window("2024-01-10", "2024-01-10").is_some());
        }
    }

    mod responses {
        use super::*;

        #[tokio::test]
        async fn serves_json_events() {
            let google = FakeSource::ok("google", vec![dentist()]);
            let (status, content_type, body) = get(app(&[google], &cache()), WEEK).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(content_type.as_deref(), Some("application/json"));
            let value: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(value[0]["summary"], "Dentist");
            assert_eq!(value[0]["start"]["dateTime"], "2024-01-10T14:00:00-05:00");
        }

        #[tokio::test]
        async fn repeated_query_is_served_from_cache() {
            let google = FakeSource::ok("google", vec![dentist()]);
            let cache = cache();

            let (_, _, first) = get(app(&[google.clone()], &cache), WEEK).await;
            let (_, _, second) = get(app(&[google.clone()], &cache), WEEK).await;

            assert_eq!(first, second);
            assert_eq!(google.calls.load(Ordering::SeqCst), 1);
        }

        #[tokio::test]
        async fn distinct_windows_fetch_separately() {
            let google = FakeSource::ok("google", vec![]);
            let cache = cache();

            get(app(&[google.clone()], &cache), WEEK).await;
            get(
                app(&[google.clone()], &cache),
                "/?start=2024-01-17T04:00:00.000Z&end=2024-01-24T04:00:00.000Z",
            )
            .await;

            assert_eq!(google.calls.load(Ordering::SeqCst), 2);
            assert_eq!(cache.len(), 2);
        }

        #[tokio::test]
        async fn one_failed_source_still_serves() {
            let google = FakeSource::failing("google", ProviderError::server("boom"));
            let school = FakeSource::ok("school", vec![school_day("Day 1", 10)]);
            let (status, _, body) = get(app(&[google, school], &cache()), WEEK).await;

            assert_eq!(status, StatusCode::OK);
            let value: serde_json::Value = serde_json::from_str(&body).unwrap();
            let events = value.as_array().unwrap();
            assert_eq!(events.len(), 1);
            assert_eq!(events[0]["id"], "2024-01-10T04:00:00.000Z-Day 1-2024-01-10");
            assert_eq!(events[0]["description"], "John: P.E.\nDorris: Music");
            assert_eq!(events[0]["allDay"], true);
        }

        #[tokio::test]
        async fn all_failed_is_unavailable_and_not_cached() {
            let google = FakeSource::failing("google", ProviderError::server("boom"));
            let school = FakeSource::failing("school", ProviderError::network("refused"));
            let cache = cache();

            let (status, _, _) = get(app(&[google.clone(), school], &cache), WEEK).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert!(cache.is_empty());

            // nothing cached, so the next request goes upstream again
            get(app(&[google.clone()], &cache), WEEK).await;
            assert_eq!(google.calls.load(Ordering::SeqCst), 2);
        }
    }

    #[tokio::test]
    async fn cors_allows_only_configured_origin() {
        let google = FakeSource::ok("google", vec![]);
        let cache = cache();

        let request = |origin: &'static str| {
            Request::builder()
                .uri(WEEK)
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app(&[google.clone()], &cache)
            .oneshot(request("http://localhost:5173"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:5173"))
        );

        let other = app(&[google], &cache)
            .oneshot(request("http://evil.example"))
            .await
            .unwrap();
        assert!(
            other
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
