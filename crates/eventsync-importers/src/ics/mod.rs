//! iCalendar (RFC 5545) decoding.
//!
//! Only what event ingestion needs: line unfolding, VEVENT scoping and the
//! property-to-field table. Text values keep their escaped ICS form.

mod datetime;
mod decoder;
mod fields;
mod property;

pub use datetime::parse_ics_datetime;
pub use decoder::{IcsDecoder, LogicalLines};
pub use fields::{EventDraft, PropertyKind};
pub use property::ContentLine;
