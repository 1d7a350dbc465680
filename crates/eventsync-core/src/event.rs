//! Event types for ingested calendar data.
//!
//! This module provides the canonical, identity-keyed event model:
//! - [`Event`]: one calendar occurrence as seen from a source feed
//! - [`EventIdentity`]: the `(UID, RECURRENCE-ID)` key naming one occurrence
//! - [`EventOverlay`]: a locally-owned override of a single display field
//!
//! Fields fall in two groups. *Source-owned* fields are copied from the feed
//! on every accepted revision. *Locally-owned* fields (`rejected`,
//! `event_type`, `overlay`, `exdate_manual`) belong to moderators and are
//! never overwritten by ingestion, except for the `rejected` reset decided by
//! the reconciler.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Start times that drift by at most this much are not a significant change.
pub const START_TIME_TOLERANCE_MS: i64 = 60_000;

/// The identity key of an event within one organization.
///
/// An absent `RECURRENCE-ID` and an empty one name the same occurrence (the
/// series master), so the key stores the normalized empty string for both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventIdentity {
    /// Source-stable identifier.
    pub uid: String,
    /// Modified-instance identifier, empty for the series master.
    pub recurrence_id: String,
}

impl EventIdentity {
    /// Creates an identity, normalizing an absent recurrence ID to empty.
    pub fn new(uid: impl Into<String>, recurrence_id: Option<&str>) -> Self {
        Self {
            uid: uid.into(),
            recurrence_id: recurrence_id.unwrap_or_default().to_string(),
        }
    }

    /// Returns the recurrence ID, or `None` for the series master.
    pub fn recurrence_id(&self) -> Option<&str> {
        if self.recurrence_id.is_empty() {
            None
        } else {
            Some(&self.recurrence_id)
        }
    }

    /// Returns true if this identity names a series master record.
    pub fn is_master(&self) -> bool {
        self.recurrence_id.is_empty()
    }
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.recurrence_id.is_empty() {
            write!(f, "{}", self.uid)
        } else {
            write!(f, "{}:{}", self.uid, self.recurrence_id)
        }
    }
}

/// A moderator-supplied override for one display field.
///
/// Overlays are keyed by field name (e.g. `"location"`) inside [`Overlay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOverlay {
    /// The replacement value.
    pub value: String,
    /// How the value combines with the source value (e.g. `overwrite_empty`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_logic: Option<String>,
    /// Who set the overlay (e.g. `manual`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// When the overlay was set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Free-form justification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EventOverlay {
    /// Creates an overlay with just a value.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            merge_logic: None,
            source: None,
            timestamp: None,
            reason: None,
        }
    }
}

/// Field overlays keyed by field name.
pub type Overlay = BTreeMap<String, EventOverlay>;

/// One calendar occurrence as seen from a source.
///
/// Optional text is `None` when the source did not provide it. Timestamps are
/// absolute instants in UTC. Time fields a source failed to provide keep the
/// zero value (`DateTime::<Utc>::default()`, the Unix epoch).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Source-stable opaque identifier.
    pub uid: String,
    /// Modified-instance identifier; `None` and `Some("")` both mean master.
    #[serde(default)]
    pub recurrence_id: Option<String>,
    /// Grouping/ownership key, one per configured feed.
    pub organization: String,

    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,

    /// Source status, passed through verbatim.
    pub status: Option<String>,
    /// Source transparency, passed through verbatim.
    pub transparency: Option<String>,
    /// Source-assigned revision counter.
    #[serde(default)]
    pub sequence: u32,

    pub rrule: Option<String>,
    pub rdate: Option<String>,
    pub exdate: Option<String>,

    /// Locally-owned moderation flag.
    #[serde(default)]
    pub rejected: bool,
    /// Locally-owned categorization.
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    /// Locally-owned field overrides.
    #[serde(default)]
    pub overlay: Overlay,
    /// Locally-owned exception dates, comma separated.
    #[serde(default)]
    pub exdate_manual: Option<String>,
}

impl Event {
    /// Creates an event with the required fields set.
    pub fn new(
        uid: impl Into<String>,
        organization: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            uid: uid.into(),
            organization: organization.into(),
            start_time,
            end_time,
            ..Default::default()
        }
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the recurrence ID.
    pub fn with_recurrence_id(mut self, recurrence_id: impl Into<String>) -> Self {
        self.recurrence_id = Some(recurrence_id.into());
        self
    }

    /// Builder method to set the sequence.
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Builder method to set the status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Returns the identity key of this event.
    pub fn identity(&self) -> EventIdentity {
        EventIdentity::new(self.uid.clone(), self.recurrence_id.as_deref())
    }

    /// Returns the recurrence ID with the empty string folded into `None`.
    pub fn normalized_recurrence_id(&self) -> Option<&str> {
        self.recurrence_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Returns the duration of the event.
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Returns true if `incoming` changes user-visible content enough to
    /// require another moderation review.
    ///
    /// That is the case when the summary differs, the location differs, or
    /// the start time moved by more than a minute. Absent text compares equal
    /// to empty text.
    pub fn has_significant_change(&self, incoming: &Event) -> bool {
        if text_or_empty(&self.summary) != text_or_empty(&incoming.summary) {
            return true;
        }

        let drift = (self.start_time - incoming.start_time).num_milliseconds();
        if drift.abs() > START_TIME_TOLERANCE_MS {
            return true;
        }

        text_or_empty(&self.location) != text_or_empty(&incoming.location)
    }

    /// Returns true if every source-owned field of `incoming` equals ours.
    pub fn same_source_content(&self, incoming: &Event) -> bool {
        self.uid == incoming.uid
            && self.normalized_recurrence_id() == incoming.normalized_recurrence_id()
            && self.summary == incoming.summary
            && self.description == incoming.description
            && self.location == incoming.location
            && self.start_time == incoming.start_time
            && self.end_time == incoming.end_time
            && self.created == incoming.created
            && self.modified == incoming.modified
            && self.status == incoming.status
            && self.transparency == incoming.transparency
            && self.sequence == incoming.sequence
            && self.rrule == incoming.rrule
            && self.rdate == incoming.rdate
            && self.exdate == incoming.exdate
    }

    /// Copies every source-owned field from `incoming`, leaving the identity
    /// and the locally-owned fields untouched.
    pub fn apply_source(&mut self, incoming: &Event) {
        self.summary = incoming.summary.clone();
        self.description = incoming.description.clone();
        self.location = incoming.location.clone();
        self.start_time = incoming.start_time;
        self.end_time = incoming.end_time;
        self.created = incoming.created;
        self.modified = incoming.modified;
        self.status = incoming.status.clone();
        self.transparency = incoming.transparency.clone();
        self.sequence = incoming.sequence;
        self.rrule = incoming.rrule.clone();
        self.rdate = incoming.rdate.clone();
        self.exdate = incoming.exdate.clone();
    }

    /// Returns a copy suitable for a first insert: source-owned fields from
    /// `self`, locally-owned fields at their defaults.
    pub fn as_new_record(&self) -> Event {
        let mut record = Event {
            uid: self.uid.clone(),
            recurrence_id: self.normalized_recurrence_id().map(str::to_string),
            organization: self.organization.clone(),
            ..Default::default()
        };
        record.apply_source(self);
        record
    }
}

fn text_or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, minute, second).unwrap()
    }

    fn sample() -> Event {
        Event::new("uid-1", "Org", at(18, 0, 0), at(19, 0, 0))
            .with_summary("Group Ride")
            .with_location("White Rock Lake")
    }

    #[test]
    fn identity_treats_absent_and_empty_recurrence_id_alike() {
        let absent = sample();
        let empty = sample().with_recurrence_id("");
        assert_eq!(absent.identity(), empty.identity());
        assert!(absent.identity().is_master());
        assert_eq!(empty.normalized_recurrence_id(), None);
    }

    #[test]
    fn identity_display() {
        assert_eq!(EventIdentity::new("a", None).to_string(), "a");
        assert_eq!(
            EventIdentity::new("a", Some("20250301T180000")).to_string(),
            "a:20250301T180000"
        );
    }

    #[test]
    fn summary_change_is_significant() {
        let incoming = sample().with_summary("Group Ride (moved)");
        assert!(sample().has_significant_change(&incoming));
    }

    #[test]
    fn small_start_drift_is_not_significant() {
        let mut incoming = sample();
        incoming.start_time = at(18, 0, 30);
        assert!(!sample().has_significant_change(&incoming));

        incoming.start_time = at(17, 59, 0);
        assert!(!sample().has_significant_change(&incoming));
    }

    #[test]
    fn large_start_drift_is_significant() {
        let mut incoming = sample();
        incoming.start_time = at(18, 1, 30);
        assert!(sample().has_significant_change(&incoming));
    }

    #[test]
    fn absent_location_equals_empty_location() {
        let mut existing = sample();
        existing.location = None;
        let mut incoming = sample();
        incoming.location = Some(String::new());
        assert!(!existing.has_significant_change(&incoming));
    }

    #[test]
    fn description_change_is_not_significant() {
        let incoming = sample().with_description("Bring lights");
        assert!(!sample().has_significant_change(&incoming));
        assert!(!sample().same_source_content(&incoming));
    }

    #[test]
    fn apply_source_keeps_local_fields() {
        let mut existing = sample();
        existing.rejected = true;
        existing.event_type = Some("ride".to_string());
        existing
            .overlay
            .insert("location".to_string(), EventOverlay::new("Flagpole Hill"));

        let incoming = sample().with_summary("Night Ride").with_sequence(2);
        existing.apply_source(&incoming);

        assert_eq!(existing.summary.as_deref(), Some("Night Ride"));
        assert_eq!(existing.sequence, 2);
        assert!(existing.rejected);
        assert_eq!(existing.event_type.as_deref(), Some("ride"));
        assert_eq!(existing.overlay.len(), 1);
    }

    #[test]
    fn as_new_record_resets_local_fields() {
        let mut incoming = sample().with_recurrence_id("");
        incoming.rejected = true;
        incoming.event_type = Some("ride".to_string());

        let record = incoming.as_new_record();
        assert!(!record.rejected);
        assert!(record.event_type.is_none());
        assert!(record.recurrence_id.is_none());
        assert!(record.same_source_content(&incoming));
    }

    #[test]
    fn overlay_uses_camel_case_keys() {
        let mut overlay = EventOverlay::new("Flagpole Hill");
        overlay.merge_logic = Some("overwrite_empty".to_string());
        let json = serde_json::to_value(&overlay).unwrap();
        assert_eq!(json["mergeLogic"], "overwrite_empty");
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn event_serializes_type_field() {
        let mut event = sample();
        event.event_type = Some("social".to_string());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "social");
        assert_eq!(json["uid"], "uid-1");
    }
}
