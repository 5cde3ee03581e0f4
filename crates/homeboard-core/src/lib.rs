//! Core types: dashboard events, time windows, local-day bucketing, tracing

pub mod event;
pub mod time;
pub mod tracing;

pub use event::{DashboardEvent, EventStart, ResponseStatus};
pub use time::{
    InvalidWindow, OffsetParseError, TimeWindow, local_day, local_midnight, parse_instant,
    parse_offset,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
