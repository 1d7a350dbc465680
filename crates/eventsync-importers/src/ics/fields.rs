//! Mapping from VEVENT properties to [`Event`] fields.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use eventsync_core::Event;
use tracing::debug;

use super::datetime::parse_ics_datetime;
use super::property::ContentLine;

/// VEVENT properties that populate an [`Event`] field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Uid,
    Summary,
    Description,
    Location,
    DtStart,
    DtEnd,
    Created,
    LastModified,
    Status,
    Transp,
    Sequence,
    RecurrenceId,
    RRule,
    RDate,
    ExDate,
}

impl PropertyKind {
    /// Looks up the handler for an upper-cased property name. Unknown names
    /// return `None` and are ignored by the decoder.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "UID" => Self::Uid,
            "SUMMARY" => Self::Summary,
            "DESCRIPTION" => Self::Description,
            "LOCATION" => Self::Location,
            "DTSTART" => Self::DtStart,
            "DTEND" => Self::DtEnd,
            "CREATED" => Self::Created,
            "LAST-MODIFIED" => Self::LastModified,
            "STATUS" => Self::Status,
            "TRANSP" => Self::Transp,
            "SEQUENCE" => Self::Sequence,
            "RECURRENCE-ID" => Self::RecurrenceId,
            "RRULE" => Self::RRule,
            "RDATE" => Self::RDate,
            "EXDATE" => Self::ExDate,
            _ => return None,
        };
        Some(kind)
    }
}

/// Fields collected for one VEVENT before it is closed.
///
/// Every field is optional here; presence decisions are made once, in
/// [`EventDraft::finish`].
#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    uid: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    status: Option<String>,
    transparency: Option<String>,
    sequence: Option<u32>,
    recurrence_id: Option<String>,
    rrule: Option<String>,
    rdate: Option<String>,
    exdate: Option<String>,
}

impl EventDraft {
    /// Applies one content line. Unknown properties are ignored and values
    /// that fail to parse leave the field unset.
    pub fn apply(&mut self, line: &ContentLine, default_tz: Tz) {
        let Some(kind) = PropertyKind::from_name(&line.name) else {
            return;
        };
        let text = || Some(line.value.clone());
        let instant = || {
            let parsed = parse_ics_datetime(&line.value, line.param("TZID"), default_tz);
            if parsed.is_none() {
                debug!(property = %line.name, value = %line.value, "Unparseable date-time, leaving unset");
            }
            parsed
        };

        match kind {
            PropertyKind::Uid => self.uid = text(),
            PropertyKind::Summary => self.summary = text(),
            PropertyKind::Description => self.description = text(),
            PropertyKind::Location => self.location = text(),
            PropertyKind::DtStart => self.start = instant(),
            PropertyKind::DtEnd => self.end = instant(),
            PropertyKind::Created => self.created = instant(),
            PropertyKind::LastModified => self.modified = instant(),
            PropertyKind::Status => self.status = text(),
            PropertyKind::Transp => self.transparency = text(),
            PropertyKind::Sequence => {
                self.sequence = line.value.parse().ok();
                if self.sequence.is_none() {
                    debug!(value = %line.value, "Unparseable SEQUENCE, using 0");
                }
            }
            PropertyKind::RecurrenceId => self.recurrence_id = text(),
            PropertyKind::RRule => self.rrule = text(),
            PropertyKind::RDate => self.rdate = text(),
            PropertyKind::ExDate => self.exdate = text(),
        }
    }

    /// Builds the event. Missing times become the zero instant and a missing
    /// sequence becomes 0.
    pub fn finish(self, organization: &str) -> Event {
        Event {
            uid: self.uid.unwrap_or_default(),
            recurrence_id: self.recurrence_id,
            organization: organization.to_string(),
            summary: self.summary,
            description: self.description,
            location: self.location,
            start_time: self.start.unwrap_or_default(),
            end_time: self.end.unwrap_or_default(),
            created: self.created,
            modified: self.modified,
            status: self.status,
            transparency: self.transparency,
            sequence: self.sequence.unwrap_or_default(),
            rrule: self.rrule,
            rdate: self.rdate,
            exdate: self.exdate,
            ..Event::default()
        }
    }
}
