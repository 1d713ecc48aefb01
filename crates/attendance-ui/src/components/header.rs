use crate::themes::Theme;
use ratatui::text::{Line, Span};

/// Decorative sparkle string placed either side of the application title.
pub const SPARKLES: &str = "✦ ✧ ✦ ✧";

/// Report header rendering four lines:
///
/// 1. Application title with sparkle decorations (ALL CAPS).
/// 2. A 60-column `=` separator.
/// 3. Store and timezone in `[ store | timezone ]` format.
/// 4. An empty line.
pub struct Header<'a> {
    /// Label of the attendance store being reported on.
    pub store: &'a str,
    /// Timezone used to compute "today" (e.g. "UTC", "America/New_York").
    pub timezone: &'a str,
    pub theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(store: &'a str, timezone: &'a str, theme: &'a Theme) -> Self {
        Self {
            store,
            timezone,
            theme,
        }
    }

    /// Render the header as exactly four lines.
    pub fn to_lines(&self) -> Vec<Line<'a>> {
        let separator = "=".repeat(60);

        vec![
            Line::from(vec![
                Span::styled(SPARKLES, self.theme.header_sparkle),
                Span::styled(" TEAM ATTENDANCE REPORT ", self.theme.header),
                Span::styled(SPARKLES, self.theme.header_sparkle),
            ]),
            Line::from(Span::styled(separator, self.theme.separator)),
            Line::from(vec![
                Span::styled("[ ", self.theme.label),
                Span::styled(self.store, self.theme.value),
                Span::styled(" | ", self.theme.label),
                Span::styled(self.timezone, self.theme.value),
                Span::styled(" ]", self.theme.label),
            ]),
            Line::from(""),
        ]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
