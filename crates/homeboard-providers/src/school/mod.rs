//! School calendar source.
//!
//! The school publishes a day rotation ("Day 1", "Day 2", ...) rather than
//! events. Each configured day name maps to a block of schedule text, and
//! each matching day becomes one all-day dashboard event.

mod client;
mod config;
mod source;

pub use client::{SchoolCalendarClient, SchoolDay};
pub use config::SchoolConfig;
pub use source::SchoolSource;
