use chrono::{Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::models::WeekCode;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve a timezone name, accepting `"auto"` for the system zone.
///
/// Unknown names fall back to UTC with a warning.
pub fn resolve_timezone(name: &str) -> Tz {
    let name = if name.eq_ignore_ascii_case("auto") {
        get_system_timezone()
    } else {
        name.to_string()
    };

    name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", name);
        Tz::UTC
    })
}

// ── Week numbering ────────────────────────────────────────────────────────────

/// Today's calendar date in `tz`.
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// ISO-8601 week of `date` as a [`WeekCode`].
pub fn iso_week_code(date: NaiveDate) -> WeekCode {
    WeekCode::saturating(date.iso_week().week())
}

/// The current work week.
///
/// `today` overrides the calendar date (used for reproducible reports);
/// otherwise the date is taken from the clock in `timezone`.
pub fn current_week(timezone: &str, today: Option<NaiveDate>) -> WeekCode {
    let date = today.unwrap_or_else(|| today_in(resolve_timezone(timezone)));
    iso_week_code(date)
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}
