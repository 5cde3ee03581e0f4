//! Time types for dashboard queries.
//!
//! This module provides [`TimeWindow`] for the `[start, end)` range a client
//! asks for, plus the fixed-offset helpers used to place events on a local
//! calendar day.
//!
//! The dashboard works with a single fixed UTC offset for "local time".
//! Date-only events are pinned to midnight at that offset, so across a
//! daylight-saving transition they land one hour off. That is a known
//! approximation.

use std::fmt;

use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a window's start is after its end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("window start {start} is after end {end}")]
pub struct InvalidWindow {
    /// Requested start.
    pub start: DateTime<Utc>,
    /// Requested end.
    pub end: DateTime<Utc>,
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`. Use [`TimeWindow::try_new`] for
    /// untrusted input.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Creates a new time window, rejecting `start > end`.
    pub fn try_new<Tz: TimeZone>(
        start: DateTime<Tz>,
        end: DateTime<Tz>,
    ) -> Result<Self, InvalidWindow> {
        let start = start.with_timezone(&Utc);
        let end = end.with_timezone(&Utc);
        if start > end {
            return Err(InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a time window from a start time and duration.
    pub fn from_duration(start: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    /// Returns the duration of this time window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Checks if a datetime falls within this window.
    ///
    /// Uses half-open interval semantics: `[start, end)`.
    pub fn contains<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        let dt = dt.with_timezone(&Utc);
        self.start <= dt && dt < self.end
    }

    /// The local calendar day the window starts on.
    pub fn start_day(&self, offset: FixedOffset) -> NaiveDate {
        local_day(&self.start, offset)
    }

    /// The local calendar day the window end falls on.
    pub fn end_day(&self, offset: FixedOffset) -> NaiveDate {
        local_day(&self.end, offset)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Midnight of `date` at the given offset.
pub fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, offset)
}

/// The calendar day `instant` falls on when viewed at `offset`.
///
/// This is the day bucket: the instant truncated to local midnight.
pub fn local_day<Tz: TimeZone>(instant: &DateTime<Tz>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Parses a client-supplied timestamp.
///
/// Accepts RFC 3339 (what `Date.prototype.toISOString` produces) and bare
/// `YYYY-MM-DD` dates, which are read as UTC midnight the same way a
/// JavaScript `Date` reads them.
pub fn parse_instant(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| local_midnight(date, Utc.fix()))
}

/// Errors from [`parse_offset`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid UTC offset {input:?}: expected Z or ±HH:MM")]
pub struct OffsetParseError {
    /// The rejected input.
    pub input: String,
}

/// Parses a UTC offset such as `-04:00`, `+0530` or `Z`.
pub fn parse_offset(raw: &str) -> Result<FixedOffset, OffsetParseError> {
    let err = || OffsetParseError {
        input: raw.to_string(),
    };
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(Utc.fix());
    }

    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'+') => (1, &trimmed[1..]),
        Some(b'-') => (-1, &trimmed[1..]),
        _ => return Err(err()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(err());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| err())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| err())?;
    if hours > 23 || minutes > 59 {
        return Err(err());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(err)
}
