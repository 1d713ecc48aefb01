use chrono::NaiveDate;

use crate::models::AttendanceStatus;

/// Format a date the way the report headings show it.
///
/// # Examples
///
/// ```
/// use attendance_core::formatting::format_long_date;
/// use chrono::NaiveDate;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// assert_eq!(format_long_date(date), "Monday, January 15, 2024");
/// ```
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Heading for the day summary of the selected meeting.
pub fn format_meeting_heading(date: Option<NaiveDate>) -> String {
    match date {
        Some(date) => format!("Attendance for {}", format_long_date(date)),
        None => "No meeting data available for this date".to_string(),
    }
}

/// Format an attendance rate percentage.
///
/// ```
/// use attendance_core::formatting::format_rate;
///
/// assert_eq!(format_rate(80), "80%");
/// assert_eq!(format_rate(0), "0%");
/// ```
pub fn format_rate(rate: u32) -> String {
    format!("{}%", rate)
}

/// Format a streak length with a singular/plural unit.
///
/// ```
/// use attendance_core::formatting::format_streak;
///
/// assert_eq!(format_streak(1), "1 day");
/// assert_eq!(format_streak(3), "3 days");
/// ```
pub fn format_streak(days: u32) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}

/// Format an integer with thousands separators.
///
/// ```
/// use attendance_core::formatting::format_count;
///
/// assert_eq!(format_count(1234567), "1,234,567");
/// assert_eq!(format_count(42), "42");
/// ```
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Single-character marker used in calendar strips.
pub fn status_glyph(status: AttendanceStatus) -> char {
    match status {
        AttendanceStatus::Attending => '●',
        AttendanceStatus::NotAttending => '✕',
        AttendanceStatus::Undecided => '?',
    }
}
