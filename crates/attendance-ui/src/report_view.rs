//! Attendance report view.
//!
//! Renders the day summary for the selected meeting followed by a bordered
//! [`ratatui::widgets::Table`] with one row per team member: status on the
//! selected meeting, counts, rate, streaks and a calendar strip.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use attendance_core::formatting;
use attendance_core::models::{AttendanceStatus, UserId};
use attendance_data::aggregator::UserAttendanceStats;
use attendance_data::analysis::AttendanceReport;

use crate::components::calendar::CalendarStrip;
use crate::themes::Theme;

/// Widest a member name may render before it is truncated.
pub const NAME_WIDTH: usize = 24;

/// Key bindings shown under the table.
pub const KEY_HELP: &str =
    "←/→ meeting  [/] start date ±1 week  r refresh  q quit";

/// Display values for one member row.
#[derive(Debug, Clone)]
pub struct MemberRowData {
    pub user_id: UserId,
    pub name: String,
    /// Status on the selected meeting, `None` if absent from it.
    pub status: Option<AttendanceStatus>,
    pub stats: UserAttendanceStats,
}

/// Build one row per tracked user, ordered by user id.
pub fn member_rows(report: &AttendanceReport) -> Vec<MemberRowData> {
    report
        .stats
        .iter()
        .map(|(user_id, stats)| MemberRowData {
            user_id: user_id.clone(),
            name: stats
                .user
                .as_ref()
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| user_id.to_string()),
            status: report.selected_status(user_id),
            stats: stats.clone(),
        })
        .collect()
}

/// Truncate `s` to at most `max` terminal columns, ending with `…` when cut.
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        out.push(c);
        width += w;
    }
    out.push('…');
    out
}

/// Lines of the day summary block.
pub fn summary_lines<'a>(report: &AttendanceReport, theme: &Theme) -> Vec<Line<'a>> {
    let heading = formatting::format_meeting_heading(report.selected.map(|s| s.date));
    let mut lines = vec![Line::from(Span::styled(heading, theme.bold))];

    if let Some(summary) = report.selected {
        lines.push(Line::from(vec![
            Span::styled(format!("{} attending", summary.attending), theme.success),
            Span::styled("  ·  ", theme.dim),
            Span::styled(format!("{} not attending", summary.not_attending), theme.error),
            Span::styled("  ·  ", theme.dim),
            Span::styled(format!("{} undecided", summary.undecided), theme.warning),
        ]));
    }

    lines.push(Line::from(vec![
        Span::styled("Team members: ", theme.label),
        Span::styled(formatting::format_count(report.stats.len() as u64), theme.value),
        Span::styled("   Since: ", theme.label),
        Span::styled(report.start_date.to_string(), theme.value),
        Span::styled("   Meetings: ", theme.label),
        Span::styled(formatting::format_count(report.log.len() as u64), theme.value),
    ]));
    lines
}

/// Render the member table into `area`.
pub fn render_member_table(
    frame: &mut Frame,
    area: Rect,
    report: &AttendanceReport,
    theme: &Theme,
) {
    let header_cells = [
        "Member", "Status", "Attended", "Missed", "Undecided", "Rate", "Streak", "Best",
        "Last 14",
    ]
    .iter()
    .map(|h| Cell::from(*h).style(theme.table_header));
    let header = Row::new(header_cells).height(1);

    let highlight = report.selected.map(|s| s.date);
    let rows: Vec<Row> = member_rows(report)
        .into_iter()
        .enumerate()
        .map(|(i, row)| {
            let style = if i % 2 == 0 {
                theme.table_row
            } else {
                theme.table_row_alt
            };
            let status_cell = match row.status {
                Some(status) => Cell::from(format!(
                    "{} {}",
                    formatting::status_glyph(status),
                    status.label()
                ))
                .style(theme.status_style(status)),
                None => Cell::from("-").style(theme.dim),
            };
            let calendar = report.calendar_for(&row.user_id);
            let strip = CalendarStrip::new(&calendar, highlight, theme).to_line();
            Row::new(vec![
                Cell::from(truncate_to_width(&row.name, NAME_WIDTH)),
                status_cell,
                Cell::from(row.stats.attended_count.to_string()),
                Cell::from(row.stats.missed_count.to_string()),
                Cell::from(row.stats.undecided_count.to_string()),
                Cell::from(formatting::format_rate(row.stats.attendance_rate))
                    .style(theme.rate_style(row.stats.attendance_rate)),
                Cell::from(formatting::format_streak(row.stats.current_streak)),
                Cell::from(formatting::format_streak(row.stats.best_streak)),
                Cell::from(strip),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(NAME_WIDTH as u16 + 1),
        Constraint::Length(16),
        Constraint::Length(9),
        Constraint::Length(7),
        Constraint::Length(10),
        Constraint::Length(6),
        Constraint::Length(8),
        Constraint::Length(8),
        Constraint::Length(15),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Attendance "),
        )
        .style(theme.text);

    frame.render_widget(table, area);
}

/// Render the whole report: header, day summary, member table and footer.
///
/// `status` is shown in the footer, e.g. a stale-data warning.
pub fn render_report(
    frame: &mut Frame,
    area: Rect,
    header: Vec<Line<'_>>,
    report: &AttendanceReport,
    status: Option<&str>,
    theme: &Theme,
) {
    let summary = summary_lines(report, theme);
    let chunks = Layout::vertical([
        Constraint::Length(header.len() as u16),
        Constraint::Length(summary.len() as u16 + 1),
        Constraint::Min(3),
        Constraint::Length(1),
    ])
    .split(area);

    frame.render_widget(Paragraph::new(Text::from(header)), chunks[0]);
    frame.render_widget(Paragraph::new(Text::from(summary)), chunks[1]);

    if report.stats.is_empty() {
        render_no_data(frame, chunks[2], theme);
    } else {
        render_member_table(frame, chunks[2], report, theme);
    }

    let footer = match status {
        Some(msg) => Line::from(Span::styled(msg.to_string(), theme.warning)),
        None => Line::from(Span::styled(KEY_HELP, theme.dim)),
    };
    frame.render_widget(Paragraph::new(footer), chunks[3]);
}

/// Placeholder shown when no attendance has been recorded since the start date.
pub fn render_no_data(frame: &mut Frame, area: Rect, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("No attendance recorded", theme.warning)),
        Line::from(""),
        Line::from(Span::styled(
            "Try an earlier start date with '['.",
            theme.dim,
        )),
        Line::from(Span::styled("Press 'q' or Ctrl+C to exit", theme.dim)),
    ];
    frame.render_widget(
        Paragraph::new(Text::from(text)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Attendance "),
        ),
        area,
    );
}

// ── Tests ──────────────────────────────────────────────────────────────────────
