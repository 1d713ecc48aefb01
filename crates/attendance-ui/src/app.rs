//! Application state and TUI event loop for the attendance report.
//!
//! [`App`] owns the theme, the current date selection and the last accepted
//! report snapshot. Key presses update the selection locally and are
//! forwarded to the runtime as [`ReportCommand`]s.

use std::io;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    text::{Line, Span, Text},
    widgets::Paragraph,
    Frame, Terminal,
};
use tokio::sync::mpsc;

use attendance_core::time_utils;
use attendance_runtime::orchestrator::{ReportCommand, ReportSnapshot};

use crate::components::header::Header;
use crate::report_view;
use crate::themes::Theme;

/// Days the start date moves per `[` / `]` press.
pub const START_DATE_STEP_DAYS: i64 = 7;

/// Result of handling one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Send(ReportCommand),
    Ignore,
}

// ── App ───────────────────────────────────────────────────────────────────────

/// Root application state for the attendance TUI.
pub struct App {
    pub theme: Theme,
    /// Label of the attendance store shown in the header.
    pub store: String,
    pub timezone: String,
    pub start_date: NaiveDate,
    pub view_date: NaiveDate,
    /// "Today" in `timezone` when the app started.
    pub today: NaiveDate,
    /// Set to `true` to break out of the event loop on the next iteration.
    pub should_quit: bool,
    /// Most recent accepted snapshot, `None` until the first report arrives.
    pub last_snapshot: Option<ReportSnapshot>,
}

impl App {
    pub fn new(
        theme_name: &str,
        store: String,
        timezone: String,
        start_date: NaiveDate,
        view_date: NaiveDate,
        today: NaiveDate,
    ) -> Self {
        Self {
            theme: Theme::from_name(theme_name),
            store,
            timezone,
            start_date: time_utils::clamp_to_today(start_date, today),
            view_date,
            today,
            should_quit: false,
            last_snapshot: None,
        }
    }

    // ── Public event loop ─────────────────────────────────────────────────────

    /// Run the report TUI, receiving reports from `rx` and sending selection
    /// changes on `cmd_tx`.
    ///
    /// Uses `crossterm::event::poll` with a 250 ms timeout so that the
    /// terminal event loop stays on the current thread while reports arrive
    /// on the async channel via `try_recv`.
    ///
    /// The loop exits on `q`, `Q`, `Ctrl+C`, or when the runtime stops.
    pub async fn run_report(
        mut self,
        mut rx: mpsc::Receiver<ReportSnapshot>,
        cmd_tx: mpsc::Sender<ReportCommand>,
    ) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let tick_rate = Duration::from_millis(250);

        let result = loop {
            if let Err(e) = terminal.draw(|frame| self.render(frame)) {
                break Err(e);
            }

            match event::poll(tick_rate) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => match self.handle_key(key) {
                        KeyAction::Quit => break Ok(()),
                        KeyAction::Send(cmd) => {
                            if let Err(e) = cmd_tx.try_send(cmd) {
                                tracing::warn!(error = %e, ?cmd, "failed to send report command");
                            }
                        }
                        KeyAction::Ignore => {}
                    },
                    Ok(_) => {}
                    Err(e) => break Err(e),
                },
                Ok(false) => {}
                Err(e) => break Err(e),
            }

            // Drain any pending reports (non-blocking).
            loop {
                match rx.try_recv() {
                    Ok(snapshot) => {
                        self.apply_snapshot(snapshot);
                    }
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        self.should_quit = true;
                        break;
                    }
                }
            }

            if self.should_quit {
                break Ok(());
            }
        };

        // Restore terminal state unconditionally.
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    // ── State transitions ─────────────────────────────────────────────────────

    /// Translate a key press into a state change and, if needed, a command.
    pub fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if key.kind != KeyEventKind::Press {
            return KeyAction::Ignore;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                KeyAction::Quit
            }
            KeyCode::Char('q') | KeyCode::Char('Q') => KeyAction::Quit,
            KeyCode::Left => self.step_view_date(false),
            KeyCode::Right => self.step_view_date(true),
            KeyCode::Char('[') => self.shift_start_date(-START_DATE_STEP_DAYS),
            KeyCode::Char(']') => self.shift_start_date(START_DATE_STEP_DAYS),
            KeyCode::Char('r') | KeyCode::Char('R') => KeyAction::Send(ReportCommand::Refresh),
            _ => KeyAction::Ignore,
        }
    }

    /// Accept `snapshot` unless it answers an outdated start date or is older
    /// than the current one. Returns whether it was accepted.
    pub fn apply_snapshot(&mut self, mut snapshot: ReportSnapshot) -> bool {
        if !snapshot.matches_start(self.start_date) {
            tracing::debug!(
                generation = snapshot.generation,
                start = %snapshot.report.start_date,
                "discarding report for outdated start date"
            );
            return false;
        }
        if let Some(current) = &self.last_snapshot {
            if snapshot.generation <= current.generation {
                return false;
            }
        }
        if snapshot.report.view_date != self.view_date {
            snapshot.report.resolve_view(self.view_date, self.today);
        }
        self.last_snapshot = Some(snapshot);
        true
    }

    // ── Private helpers ───────────────────────────────────────────────────────

    fn step_view_date(&mut self, forward: bool) -> KeyAction {
        let Some(snapshot) = self.last_snapshot.as_mut() else {
            return KeyAction::Ignore;
        };
        // Step from the meeting on screen, which differs from `view_date`
        // when the initial view fell back to the latest meeting.
        let from = snapshot
            .report
            .selected
            .map(|s| s.date)
            .unwrap_or(self.view_date);
        let log = &snapshot.report.log;
        let target = if forward {
            log.next_date(from)
        } else {
            log.previous_date(from)
        };
        match target {
            Some(date) => {
                self.view_date = date;
                snapshot.report.select_date(date);
                KeyAction::Send(ReportCommand::SetViewDate(date))
            }
            None => KeyAction::Ignore,
        }
    }

    /// Move the start date; the view returns to today (latest meeting).
    fn shift_start_date(&mut self, days: i64) -> KeyAction {
        let requested = time_utils::shift_days(self.start_date, days);
        let date = time_utils::clamp_to_today(requested, self.today);
        if date == self.start_date {
            return KeyAction::Ignore;
        }
        self.start_date = date;
        self.view_date = self.today;
        KeyAction::Send(ReportCommand::SetStartDate(date))
    }

    /// Render the current application state into `frame`.
    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let header = Header::new(&self.store, &self.timezone, &self.theme).to_lines();

        match &self.last_snapshot {
            Some(snapshot) => {
                let status = snapshot
                    .error
                    .as_deref()
                    .map(|e| format!("Showing cached data: {e}"));
                report_view::render_report(
                    frame,
                    area,
                    header,
                    &snapshot.report,
                    status.as_deref(),
                    &self.theme,
                );
            }
            None => {
                let mut lines = header;
                lines.push(Line::from(Span::styled(
                    "Loading attendance...",
                    self.theme.dim,
                )));
                frame.render_widget(Paragraph::new(Text::from(lines)), area);
            }
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
