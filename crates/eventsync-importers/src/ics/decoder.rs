//! Line unfolding and VEVENT scoping.
//!
//! Both stages are lazy iterators over the borrowed feed text. Decoding is a
//! single forward pass; to decode again, build a new decoder.

use std::iter::Peekable;
use std::str::Split;

use chrono_tz::Tz;
use eventsync_core::Event;
use tracing::debug;

use super::fields::EventDraft;
use super::property::ContentLine;

/// Yields logical lines: each physical line with its continuation lines
/// (those starting with one space or tab) appended, minus that first
/// whitespace character.
///
/// Physical lines are split on LF and a trailing CR is dropped, so CRLF and
/// bare LF feeds decode identically. Blank lines and orphan continuations
/// are skipped.
pub struct LogicalLines<'a> {
    lines: Peekable<Split<'a, char>>,
}

impl<'a> LogicalLines<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            lines: content.split('\n').peekable(),
        }
    }
}

impl Iterator for LogicalLines<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let line = strip_cr(self.lines.next()?);
            if line.trim().is_empty() || is_continuation(line) {
                continue;
            }

            let mut logical = line.to_string();
            while let Some(next) = self.lines.peek() {
                let next = strip_cr(next);
                if !is_continuation(next) {
                    break;
                }
                logical.push_str(&next[1..]);
                self.lines.next();
            }
            return Some(logical);
        }
    }
}

fn strip_cr(line: &str) -> &str {
    line.strip_suffix('\r').unwrap_or(line)
}

fn is_continuation(line: &str) -> bool {
    line.starts_with([' ', '\t'])
}

/// Yields one [`Event`] per closed VEVENT, in source order.
///
/// Lines outside a VEVENT are ignored, as are the properties of components
/// nested inside one (such as VALARM). A VEVENT still open at end of input
/// is dropped.
pub struct IcsDecoder<'a> {
    lines: LogicalLines<'a>,
    organization: String,
    default_tz: Tz,
    current: Option<EventDraft>,
    nested: usize,
}

impl<'a> IcsDecoder<'a> {
    /// Creates a decoder over `content`; every event is stamped with
    /// `organization` and floating times resolve in `default_tz`.
    pub fn new(content: &'a str, organization: impl Into<String>, default_tz: Tz) -> Self {
        Self {
            lines: LogicalLines::new(content),
            organization: organization.into(),
            default_tz,
            current: None,
            nested: 0,
        }
    }
}

impl Iterator for IcsDecoder<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        for raw in self.lines.by_ref() {
            let Some(line) = ContentLine::parse(&raw) else {
                continue;
            };
            let is_vevent = line.value.eq_ignore_ascii_case("VEVENT");

            match line.name.as_str() {
                "BEGIN" if is_vevent && self.nested == 0 => {
                    if self.current.is_some() {
                        debug!("VEVENT opened before the previous one closed, dropping it");
                    }
                    self.current = Some(EventDraft::default());
                }
                "BEGIN" => {
                    if self.current.is_some() {
                        self.nested += 1;
                    }
                }
                "END" if self.nested > 0 => self.nested -= 1,
                "END" if is_vevent => {
                    if let Some(draft) = self.current.take() {
                        return Some(draft.finish(&self.organization));
                    }
                }
                "END" => {}
                _ if self.nested == 0 => {
                    if let Some(draft) = self.current.as_mut() {
                        draft.apply(&line, self.default_tz);
                    }
                }
                _ => {}
            }
        }

        if self.current.take().is_some() {
            debug!("Input ended inside a VEVENT, dropping it");
        }
        None
    }
}
