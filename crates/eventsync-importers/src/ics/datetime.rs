//! ICS date-time values.
//!
//! Feeds in the wild mix basic (`20250115T1800`) and extended
//! (`2025-01-15T18:00`) notation and drop seconds, minutes or the whole time
//! part. Every precision is tried in turn, most precise first.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use eventsync_core::{localize, localize_date, parse_timezone};
use tracing::debug;

/// Basic and extended date-time layouts, most precise first. Hour-only and
/// date-only values are handled separately because chrono needs a minute to
/// build a `NaiveDateTime`.
const DATETIME_FORMATS: &[&str] = &[
    "%Y%m%dT%H%M%S",
    "%Y%m%dT%H%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d"];

/// Parses a DTSTART-style value.
///
/// A trailing `Z` (either case) means UTC. Otherwise the wall clock is
/// resolved in the `TZID` zone when one is given and known, else in
/// `default_tz`. Returns `None` when no layout matches.
pub fn parse_ics_datetime(value: &str, tzid: Option<&str>, default_tz: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(utc) = value.strip_suffix('Z').or_else(|| value.strip_suffix('z')) {
        return parse_wall_clock(utc).map(|naive| Utc.from_utc_datetime(&naive));
    }

    let tz = match tzid {
        Some(name) => parse_timezone(name).unwrap_or_else(|| {
            debug!(tzid = %name, fallback = %default_tz, "Unknown TZID, using default zone");
            default_tz
        }),
        None => default_tz,
    };

    if let Some(naive) = parse_wall_clock(value) {
        return Some(localize(naive, tz));
    }

    parse_date(value).map(|date| localize_date(date, tz))
}

fn parse_wall_clock(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| parse_hour_precision(value))
}

fn parse_hour_precision(value: &str) -> Option<NaiveDateTime> {
    let (date, hour) = value.split_once(['T', 't'])?;
    if hour.len() != 2 || !hour.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = hour.parse().ok()?;
    parse_date(date)?.and_hms_opt(hour, 0, 0)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventsync_core::DEFAULT_TIMEZONE;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn utc_suffix() {
        let tz = DEFAULT_TIMEZONE;
        assert_eq!(
            parse_ics_datetime("20250115T180000Z", None, tz),
            Some(utc(2025, 1, 15, 18, 0, 0))
        );
        assert_eq!(
            parse_ics_datetime("20250115T180000z", Some("America/New_York"), tz),
            Some(utc(2025, 1, 15, 18, 0, 0))
        );
    }

    #[test]
    fn all_precisions_in_default_zone() {
        let tz = DEFAULT_TIMEZONE;
        let cases = [
            ("20250115T183015", utc(2025, 1, 16, 0, 30, 15)),
            ("20250115T1830", utc(2025, 1, 16, 0, 30, 0)),
            ("20250115T18", utc(2025, 1, 16, 0, 0, 0)),
            ("20250115", utc(2025, 1, 15, 6, 0, 0)),
            ("2025-01-15T18:30:15", utc(2025, 1, 16, 0, 30, 15)),
            ("2025-01-15T18:30", utc(2025, 1, 16, 0, 30, 0)),
            ("2025-01-15T18", utc(2025, 1, 16, 0, 0, 0)),
            ("2025-01-15", utc(2025, 1, 15, 6, 0, 0)),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_ics_datetime(input, None, tz), Some(expected), "{}", input);
        }
    }

    #[test]
    fn tzid_selects_zone() {
        assert_eq!(
            parse_ics_datetime("20250115T180000", Some("America/New_York"), DEFAULT_TIMEZONE),
            Some(utc(2025, 1, 15, 23, 0, 0))
        );
    }

    #[test]
    fn unknown_tzid_falls_back_to_default() {
        assert_eq!(
            parse_ics_datetime("20250115T180000", Some("Central Standard Time"), DEFAULT_TIMEZONE),
            Some(utc(2025, 1, 16, 0, 0, 0))
        );
    }

    #[test]
    fn garbage_is_none() {
        let tz = DEFAULT_TIMEZONE;
        assert_eq!(parse_ics_datetime("next tuesday", None, tz), None);
        assert_eq!(parse_ics_datetime("20251345T180000", None, tz), None);
        assert_eq!(parse_ics_datetime("20250115T1", None, tz), None);
        assert_eq!(parse_ics_datetime("", None, tz), None);
    }
}
