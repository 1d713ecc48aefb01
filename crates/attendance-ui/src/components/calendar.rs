use attendance_core::formatting::status_glyph;
use attendance_core::models::DailyStatus;
use chrono::NaiveDate;
use ratatui::text::{Line, Span};

use crate::themes::Theme;

/// One glyph per meeting day, coloured by status.
///
/// The entry dated `highlight` gets the theme's calendar highlight on top
/// of its status colour.
pub struct CalendarStrip<'a> {
    pub days: &'a [DailyStatus],
    pub highlight: Option<NaiveDate>,
    pub theme: &'a Theme,
}

impl<'a> CalendarStrip<'a> {
    pub fn new(days: &'a [DailyStatus], highlight: Option<NaiveDate>, theme: &'a Theme) -> Self {
        Self {
            days,
            highlight,
            theme,
        }
    }

    pub fn to_line(&self) -> Line<'static> {
        let spans: Vec<Span<'static>> = self
            .days
            .iter()
            .map(|day| {
                let mut style = self.theme.status_style(day.status);
                if Some(day.date) == self.highlight {
                    style = style.patch(self.theme.calendar_highlight);
                }
                Span::styled(status_glyph(day.status).to_string(), style)
            })
            .collect();
        Line::from(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendance_core::models::AttendanceStatus;
    use ratatui::style::Modifier;

    fn day(n: u32, status: AttendanceStatus) -> DailyStatus {
        DailyStatus {
            date: NaiveDate::from_ymd_opt(2024, 3, n).unwrap(),
            status,
        }
    }

    #[test]
    fn test_one_span_per_day() {
        let theme = Theme::dark();
        let days = [
            day(1, AttendanceStatus::Attending),
            day(8, AttendanceStatus::NotAttending),
            day(15, AttendanceStatus::Undecided),
        ];
        let line = CalendarStrip::new(&days, None, &theme).to_line();
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "●✕?");
        assert_eq!(line.spans[0].style, theme.success);
        assert_eq!(line.spans[1].style, theme.error);
    }

    #[test]
    fn test_highlighted_day() {
        let theme = Theme::dark();
        let days = [
            day(1, AttendanceStatus::Attending),
            day(8, AttendanceStatus::Attending),
        ];
        let highlight = NaiveDate::from_ymd_opt(2024, 3, 8);
        let line = CalendarStrip::new(&days, highlight, &theme).to_line();
        assert!(!line.spans[0].style.add_modifier.contains(Modifier::REVERSED));
        assert!(line.spans[1].style.add_modifier.contains(Modifier::REVERSED));
    }

    #[test]
    fn test_empty_history() {
        let theme = Theme::dark();
        assert!(CalendarStrip::new(&[], None, &theme).to_line().spans.is_empty());
    }
}
