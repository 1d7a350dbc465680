//! `eventsync events`: list and moderate stored events.

use std::fmt::Write as _;

use chrono::Utc;
use chrono_tz::Tz;
use eventsync_core::{Event, EventIdentity};
use eventsync_store::{EventFilter, EventStore, ModerationPatch};
use tracing::info;

use crate::cli::EventTarget;
use crate::error::{CliError, CliResult};

/// Options for `events list`.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub organization: Option<String>,
    pub rejected: Option<bool>,
    pub upcoming: bool,
    pub limit: Option<usize>,
    pub json: bool,
}

pub fn list(store: &dyn EventStore, options: &ListOptions, tz: Tz) -> CliResult<()> {
    let filter = EventFilter {
        organization: options.organization.clone(),
        rejected: options.rejected,
        ends_after: options.upcoming.then(Utc::now),
        limit: options.limit,
        ..EventFilter::default()
    };
    let events = store.list(&filter)?;

    if options.json {
        let rendered = serde_json::to_string_pretty(&events)
            .map_err(|e| CliError::Config(format!("failed to serialize events: {}", e)))?;
        println!("{}", rendered);
    } else if events.is_empty() {
        println!("No events.");
    } else {
        print!("{}", render_events(&events, tz));
    }
    Ok(())
}

/// One line per event, times in `tz`.
pub fn render_events(events: &[Event], tz: Tz) -> String {
    let mut out = String::new();
    for event in events {
        let start = event.start_time.with_timezone(&tz);
        let flag = if event.rejected { "rejected" } else { "visible" };
        let _ = write!(
            out,
            "{}  {:<8}  {}  {}",
            start.format("%Y-%m-%d %H:%M"),
            flag,
            event.organization,
            event.summary.as_deref().unwrap_or("(no title)")
        );
        if let Some(kind) = &event.event_type {
            let _ = write!(out, " [{}]", kind);
        }
        let _ = writeln!(out, "  <{}>", event.identity());
    }
    out
}

fn identity(target: &EventTarget) -> EventIdentity {
    EventIdentity::new(target.uid.as_str(), target.recurrence_id.as_deref())
}

fn apply(store: &dyn EventStore, target: &EventTarget, patch: &ModerationPatch) -> CliResult<Event> {
    let identity = identity(target);
    let event = store.moderate(&target.organization, &identity, patch)?;
    info!(organization = %target.organization, %identity, "Moderated event");
    Ok(event)
}

pub fn reject(store: &dyn EventStore, target: &EventTarget) -> CliResult<()> {
    let event = apply(store, target, &ModerationPatch::reject())?;
    println!("Rejected {} ({})", event.identity(), describe(&event));
    Ok(())
}

pub fn approve(store: &dyn EventStore, target: &EventTarget) -> CliResult<()> {
    let event = apply(store, target, &ModerationPatch::approve())?;
    println!("Approved {} ({})", event.identity(), describe(&event));
    Ok(())
}

pub fn set_type(store: &dyn EventStore, target: &EventTarget, event_type: &str) -> CliResult<()> {
    let patch = match event_type.trim() {
        "" => ModerationPatch {
            event_type: Some(None),
            ..ModerationPatch::default()
        },
        kind => ModerationPatch::set_type(kind),
    };
    let event = apply(store, target, &patch)?;
    match &event.event_type {
        Some(kind) => println!("Set type of {} to {}", event.identity(), kind),
        None => println!("Cleared type of {}", event.identity()),
    }
    Ok(())
}

fn describe(event: &Event) -> &str {
    event.summary.as_deref().unwrap_or("no title")
}
