//! Timezone resolution and wall-clock localisation.
//!
//! Source feeds frequently publish local wall-clock times without an offset,
//! or with a bogus `Z`. Everything here resolves such values against an IANA
//! zone (by default [`DEFAULT_TIMEZONE`]) and returns absolute UTC instants.

use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

/// The zone used when a feed does not name one.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Chicago;

/// Wall-clock formats accepted for offset-less ISO-8601 values, most precise
/// first.
const ISO_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses an IANA zone name such as `America/Chicago`.
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().trim_matches('"').parse::<Tz>().ok()
}

/// Resolves a wall-clock time in `tz` to a UTC instant.
///
/// Ambiguous times (the repeated hour when clocks fall back) resolve to the
/// earlier instant. Times inside a spring-forward gap are moved forward by
/// one hour, past the gap.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

/// Resolves midnight of `date` in `tz` to a UTC instant.
pub fn localize_date(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    localize(date.and_time(NaiveTime::default()), tz)
}

/// Keeps the wall-clock reading of `dt` but reinterprets it in `tz`,
/// discarding whatever offset the source attached.
pub fn reinterpret_wall_clock(dt: DateTime<FixedOffset>, tz: Tz) -> DateTime<Utc> {
    localize(dt.naive_local(), tz)
}

/// Parses an RFC 3339 instant, falling back to offset-less ISO-8601 wall
/// clock values (localised in `tz`) and finally to a bare date (midnight in
/// `tz`).
pub fn parse_instant(value: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ISO_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(localize(naive, tz));
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| localize_date(date, tz))
}
