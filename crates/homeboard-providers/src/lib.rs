//! Calendar sources for homeboard.
//!
//! Every upstream implements [`CalendarSource`] and yields [`RawEvent`]s.
//! [`normalize_events`] turns those into the dashboard's event shape.
//!
//! # Features
//!
//! - `google` (default): Google Calendar with OAuth2 loopback consent.
//! - `school` (default): the school day-rotation feed.

pub mod credentials;
pub mod error;
pub mod normalize;
pub mod provider;
pub mod raw_event;

#[cfg(feature = "google")]
pub mod google;

#[cfg(feature = "school")]
pub mod school;

pub use credentials::{Credential, CredentialStore, StaticCredentialStore};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use normalize::{
    NormalizeContext, NormalizeError, normalize_event, normalize_events, school_event_id,
};
pub use provider::{BoxFuture, CalendarSource, ErrorSource, FetchOptions, FetchResult};
pub use raw_event::{RawAttendee, RawCalendarEvent, RawEvent, RawEventTime, RawSchoolEvent};
