//! Core types: events, identity keys, ICS text escaping, timezones, tracing

pub mod escape;
pub mod event;
pub mod time;
pub mod tracing;

pub use escape::escape_text;
pub use event::{Event, EventIdentity, EventOverlay, Overlay, START_TIME_TOLERANCE_MS};
pub use time::{
    DEFAULT_TIMEZONE, localize, localize_date, parse_instant, parse_timezone,
    reinterpret_wall_clock,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
