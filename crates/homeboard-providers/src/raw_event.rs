//! Raw events as narrowed from each upstream's JSON.
//!
//! Adapters deserialize upstream payloads into private API structs and
//! convert them into [`RawEvent`] at the boundary. Nothing here is
//! validated yet; that is the normalizer's job.

use chrono::{DateTime, FixedOffset, NaiveDate};
use homeboard_core::ResponseStatus;
use serde::{Deserialize, Serialize};

/// When a raw calendar event starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RawEventTime {
    /// A precise timestamp, keeping the upstream offset.
    DateTime(DateTime<FixedOffset>),
    /// An all-day event date.
    Date(NaiveDate),
}

impl RawEventTime {
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

/// An attendee entry on a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttendee {
    pub email: Option<String>,
    /// This entry is the account the calendar was fetched with.
    pub is_self: bool,
    pub response_status: ResponseStatus,
}

impl RawAttendee {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            is_self: false,
            response_status: ResponseStatus::Unknown,
        }
    }

    /// The authenticated user's own entry.
    pub fn me(response_status: ResponseStatus) -> Self {
        Self {
            email: None,
            is_self: true,
            response_status,
        }
    }

    pub fn with_status(mut self, status: ResponseStatus) -> Self {
        self.response_status = status;
        self
    }
}

/// An event from a general-purpose calendar (Google Calendar).
///
/// Required fields are optional here so a malformed upstream record
/// survives until normalization, where it is rejected individually.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCalendarEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<RawEventTime>,
    /// `None` means the upstream sent no attendee list at all.
    pub attendees: Option<Vec<RawAttendee>>,
}

impl RawCalendarEvent {
    pub fn new(id: impl Into<String>, summary: impl Into<String>, start: RawEventTime) -> Self {
        Self {
            id: Some(id.into()),
            summary: Some(summary.into()),
            start: Some(start),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_attendees(mut self, attendees: Vec<RawAttendee>) -> Self {
        self.attendees = Some(attendees);
        self
    }
}

/// A named day from the school calendar, e.g. "Day 1" of a rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSchoolEvent {
    pub name: String,
    pub local_start_date: NaiveDate,
    /// Schedule text looked up for `name` by the adapter.
    pub details: Option<String>,
}

impl RawSchoolEvent {
    pub fn new(name: impl Into<String>, local_start_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            local_start_date,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// A raw event from any source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawEvent {
    Calendar(RawCalendarEvent),
    School(RawSchoolEvent),
}

impl From<RawCalendarEvent> for RawEvent {
    fn from(event: RawCalendarEvent) -> Self {
        Self::Calendar(event)
    }
}

impl From<RawSchoolEvent> for RawEvent {
    fn from(event: RawSchoolEvent) -> Self {
        Self::School(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_event_builder() {
        let start = DateTime::parse_from_rfc3339("2024-01-10T14:00:00-05:00").unwrap();
        let event = RawCalendarEvent::new("e1", "Dentist", RawEventTime::DateTime(start))
            .with_location("12 Main St\nSuite 4")
            .with_attendees(vec![RawAttendee::me(ResponseStatus::Accepted)]);

        assert_eq!(event.id.as_deref(), Some("e1"));
        assert!(!event.start.as_ref().unwrap().is_all_day());
        assert_eq!(event.attendees.as_ref().unwrap().len(), 1);
        assert!(event.description.is_none());
    }

    #[test]
    fn attendee_constructors() {
        let me = RawAttendee::me(ResponseStatus::Declined);
        assert!(me.is_self);
        assert!(me.email.is_none());

        let other = RawAttendee::new("dorris@example.com").with_status(ResponseStatus::Accepted);
        assert!(!other.is_self);
        assert_eq!(other.response_status, ResponseStatus::Accepted);
    }

    #[test]
    fn school_event_into_raw_event() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let raw: RawEvent = RawSchoolEvent::new("Day 1", date).with_details("Gym").into();
        match raw {
            RawEvent::School(school) => {
                assert_eq!(school.name, "Day 1");
                assert_eq!(school.details.as_deref(), Some("Gym"));
            }
            RawEvent::Calendar(_) => panic!("expected a school event"),
        }
    }
}
