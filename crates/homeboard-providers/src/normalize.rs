//! [`RawEvent`] to [`DashboardEvent`] conversion.
//!
//! The normalizer is where upstream quirks get resolved:
//! 1. Date-only starts become midnight at the dashboard's fixed offset.
//! 2. Events the user is not attending are dropped.
//! 3. Events outside the requested local days are dropped.
//! 4. Descriptions are trimmed and locations cut to their first line.
//!
//! Records missing an id, summary or start are rejected one at a time;
//! [`normalize_events`] logs and skips them so one bad record never
//! fails a whole source.

use chrono::{FixedOffset, SecondsFormat};
use homeboard_core::{DashboardEvent, EventStart, ResponseStatus, TimeWindow};
use thiserror::Error;
use tracing::{debug, warn};

use crate::raw_event::{RawAttendee, RawCalendarEvent, RawEvent, RawEventTime, RawSchoolEvent};

/// A raw record that cannot become a dashboard event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("event {} is missing required field `{field}`", id.as_deref().unwrap_or("<no id>"))]
    MissingField {
        field: &'static str,
        id: Option<String>,
    },
}

/// Inputs the normalizer needs besides the record itself.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    /// The requested window, used for day filtering and school ids.
    pub window: TimeWindow,
    /// The dashboard's notion of local time.
    pub local_offset: FixedOffset,
}

impl NormalizeContext {
    pub fn new(window: TimeWindow, local_offset: FixedOffset) -> Self {
        Self {
            window,
            local_offset,
        }
    }

    /// Whether an event starting at `start` lands on a requested local day.
    ///
    /// Anything on or after the window's first local day counts, as long as
    /// it starts before the window end.
    fn in_range(&self, start: &EventStart) -> bool {
        let day = homeboard_core::local_day(&start.date_time, self.local_offset);
        day >= self.window.start_day(self.local_offset) && start.date_time < self.window.end
    }
}

/// Converts one raw record.
///
/// Returns `Ok(None)` for well-formed records that are filtered out.
pub fn normalize_event(
    raw: &RawEvent,
    context: &NormalizeContext,
) -> Result<Option<DashboardEvent>, NormalizeError> {
    let event = match raw {
        RawEvent::Calendar(event) => match normalize_calendar(event, context)? {
            Some(event) => event,
            None => return Ok(None),
        },
        RawEvent::School(event) => normalize_school(event, context),
    };

    if !context.in_range(&event.start) {
        debug!(id = %event.id, "event outside requested days, skipping");
        return Ok(None);
    }
    Ok(Some(event))
}

/// Converts a batch, keeping upstream order and skipping bad records.
pub fn normalize_events(raws: &[RawEvent], context: &NormalizeContext) -> Vec<DashboardEvent> {
    raws.iter()
        .filter_map(|raw| match normalize_event(raw, context) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "skipping malformed event");
                None
            }
        })
        .collect()
}

fn normalize_calendar(
    raw: &RawCalendarEvent,
    context: &NormalizeContext,
) -> Result<Option<DashboardEvent>, NormalizeError> {
    let missing = |field| NormalizeError::MissingField {
        field,
        id: raw.id.clone(),
    };
    let id = raw.id.as_deref().ok_or_else(|| missing("id"))?;
    let summary = raw.summary.as_deref().ok_or_else(|| missing("summary"))?;
    let start = raw.start.as_ref().ok_or_else(|| missing("start"))?;

    if !is_attending(raw.attendees.as_deref()) {
        debug!(id, "not attending, skipping");
        return Ok(None);
    }

    let start = match start {
        RawEventTime::DateTime(dt) => EventStart::timed(*dt),
        RawEventTime::Date(date) => EventStart::all_day(*date, context.local_offset),
    };

    let mut event = DashboardEvent::new(id, summary, start);
    event.description = raw.description.as_deref().and_then(clean_description);
    event.location = raw.location.as_deref().and_then(first_line);
    Ok(Some(event))
}

fn normalize_school(raw: &RawSchoolEvent, context: &NormalizeContext) -> DashboardEvent {
    let id = school_event_id(&context.window, &raw.name, raw.local_start_date);
    let start = EventStart::all_day(raw.local_start_date, context.local_offset);
    let mut event = DashboardEvent::new(id, &raw.name, start);
    event.description = raw.details.as_deref().and_then(clean_description);
    event
}

/// Synthetic id for a school day: `<window start>-<name>-<date>`.
///
/// The window start is rendered the way browsers render `toISOString()`.
pub fn school_event_id(
    window: &TimeWindow,
    name: &str,
    date: chrono::NaiveDate,
) -> String {
    format!(
        "{}-{}-{}",
        window.start.to_rfc3339_opts(SecondsFormat::Millis, true),
        name,
        date.format("%Y-%m-%d")
    )
}

/// With no attendee list the user is the organizer. With a list, only an
/// accepted `self` entry counts; if several are marked `self`, the last wins.
fn is_attending(attendees: Option<&[RawAttendee]>) -> bool {
    match attendees {
        None => true,
        Some(list) => list
            .iter()
            .rfind(|a| a.is_self)
            .is_some_and(|me| me.response_status == ResponseStatus::Accepted),
    }
}

fn clean_description(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn first_line(raw: &str) -> Option<String> {
    let line = raw.lines().next().unwrap_or_default().trim();
    (!line.is_empty()).then(|| line.to_string())
}
