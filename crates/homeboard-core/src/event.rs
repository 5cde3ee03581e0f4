//! The normalized event shape served to the dashboard.
//!
//! Every source adapter ends up producing [`DashboardEvent`]s. The JSON
//! field names (`allDay`, `start.dateTime`) are what the dashboard
//! client reads, so the serde attributes here are part of the wire format.

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::time::{local_day, local_midnight};

/// An attendee's reply to an invitation, as reported by Google Calendar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseStatus {
    Accepted,
    Declined,
    Tentative,
    NeedsAction,
    /// Anything we do not recognise.
    #[default]
    #[serde(other)]
    Unknown,
}

impl ResponseStatus {
    /// Parses Google's `responseStatus` strings (`"needsAction"`, ...).
    pub fn from_google(raw: &str) -> Self {
        match raw {
            "accepted" => Self::Accepted,
            "declined" => Self::Declined,
            "tentative" => Self::Tentative,
            "needsAction" => Self::NeedsAction,
            _ => Self::Unknown,
        }
    }
}

/// When an event starts.
///
/// `date_time` is always present. All-day events also carry `date`, and
/// their `date_time` is midnight of that date at the dashboard's offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStart {
    pub date_time: DateTime<FixedOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl EventStart {
    /// A start with a precise timestamp.
    pub fn timed(date_time: DateTime<FixedOffset>) -> Self {
        Self {
            date_time,
            date: None,
        }
    }

    /// A date-only start, pinned to midnight at `offset`.
    pub fn all_day(date: NaiveDate, offset: FixedOffset) -> Self {
        Self {
            date_time: local_midnight(date, offset),
            date: Some(date),
        }
    }

    pub fn is_all_day(&self) -> bool {
        self.date.is_some()
    }
}

/// A calendar entry in the common schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardEvent {
    /// Unique per source and occurrence.
    pub id: String,
    pub summary: String,
    /// Trimmed, never blank; serialized as `null` when absent.
    pub description: Option<String>,
    /// First line of the source location only.
    pub location: Option<String>,
    pub start: EventStart,
    pub all_day: bool,
    /// Always true in served output; declined events are dropped upstream.
    pub attending: bool,
}

impl DashboardEvent {
    /// Creates an attending event with no description or location.
    ///
    /// `all_day` follows whether `start` carries a date.
    pub fn new(id: impl Into<String>, summary: impl Into<String>, start: EventStart) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            description: None,
            location: None,
            all_day: start.is_all_day(),
            start,
            attending: true,
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

    pub fn with_attending(mut self, attending: bool) -> Self {
        self.attending = attending;
        self
    }

    /// The local calendar day this event belongs to.
    pub fn local_day(&self, offset: FixedOffset) -> NaiveDate {
        local_day(&self.start.date_time, offset)
    }
}
