use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{AttendanceError, Result};

/// Wire format of meeting dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name.parse::<Tz>().is_ok()
}

/// Resolve `tz_name`, falling back to UTC with a warning.
pub fn resolve_timezone(tz_name: &str) -> Tz {
    tz_name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", tz_name);
        Tz::UTC
    })
}

// ── Calendar dates ────────────────────────────────────────────────────────────

/// The calendar date of `now` as observed in `tz_name`.
pub fn date_in(now: DateTime<Utc>, tz_name: &str) -> NaiveDate {
    now.with_timezone(&resolve_timezone(tz_name)).date_naive()
}

/// Today's calendar date in `tz_name`.
pub fn today_in(tz_name: &str) -> NaiveDate {
    date_in(Utc::now(), tz_name)
}

/// Parse a `YYYY-MM-DD` date.
///
/// A trailing time component (`2024-01-15T09:30:00Z`) is ignored, matching
/// the way meeting dates are cut from full timestamps.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let trimmed = s.trim();
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map_err(|_| AttendanceError::InvalidDate(s.to_string()))
}

/// `date` moved by `days` (negative moves back); saturates at the calendar
/// bounds chrono supports.
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}

/// Clamp a requested start date so it never lies after `today`.
pub fn clamp_to_today(date: NaiveDate, today: NaiveDate) -> NaiveDate {
    date.min(today)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
