//! Attendance aggregation over an ordered meeting log.
//!
//! Turns a chronological [`AttendanceLog`] into per-user statistics
//! (counts, attendance rate, current and best streak) and per-user daily
//! histories for calendar rendering. Everything here is a pure function of
//! its input.

use std::collections::BTreeMap;

use attendance_core::models::{
    AttendanceLog, AttendanceStatus, DailyStatus, UserDailyHistory, UserId, UserProfile,
};
use serde::{Deserialize, Serialize};

/// Number of trailing days shown in a user's calendar strip.
pub const CALENDAR_WINDOW: usize = 14;

// ── UserAttendanceStats ───────────────────────────────────────────────────────

/// Attendance totals and streaks for one user across the processed log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAttendanceStats {
    pub attended_count: u32,
    pub missed_count: u32,
    pub undecided_count: u32,
    /// Rounded percentage of observed meetings attended; 0 with no data.
    pub attendance_rate: u32,
    /// Consecutive attending appearances ending at the latest observation.
    pub current_streak: u32,
    /// Longest run of consecutive attending appearances.
    pub best_streak: u32,
    /// Profile from the user's appearances; later values win, missing
    /// fields keep earlier ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}

impl UserAttendanceStats {
    /// Apply one observation of the user.
    pub fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Attending => {
                self.attended_count += 1;
                self.current_streak += 1;
                self.best_streak = self.best_streak.max(self.current_streak);
            }
            AttendanceStatus::NotAttending => {
                self.missed_count += 1;
                self.current_streak = 0;
            }
            AttendanceStatus::Undecided => {
                self.undecided_count += 1;
                self.current_streak = 0;
            }
        }
    }

    /// Number of meetings in which the user was observed.
    pub fn total(&self) -> u32 {
        self.attended_count + self.missed_count + self.undecided_count
    }

    /// Recompute `attendance_rate` from the current counts.
    pub fn finalize(&mut self) {
        self.attendance_rate = attendance_rate(self.attended_count, self.total());
    }
}

/// `round(100 * attended / total)` with halves rounded up; 0 when `total` is 0.
///
/// Integer arithmetic keeps the result exact at the .5 boundary.
pub fn attendance_rate(attended: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (attended, total) = (u64::from(attended), u64::from(total));
    ((200 * attended + total) / (2 * total)) as u32
}

// ── AttendanceAggregator ──────────────────────────────────────────────────────

/// Per-user statistics keyed by user id, ordered for stable output.
pub type StatsMap = BTreeMap<UserId, UserAttendanceStats>;

/// Stateless helper computing attendance statistics and histories.
pub struct AttendanceAggregator;

impl AttendanceAggregator {
    /// Compute statistics for every user observed anywhere in `log`.
    ///
    /// Records are processed in log order. A user missing from a record is
    /// not observed for that date: counts and streak carry over unchanged.
    pub fn compute_stats(log: &AttendanceLog) -> StatsMap {
        let mut stats = StatsMap::new();

        for record in log {
            for attendee in record.attendees() {
                let entry = stats.entry(attendee.profile.id.clone()).or_default();
                entry.record(attendee.status);
                match entry.user.as_mut() {
                    Some(profile) => profile.absorb(attendee.profile.clone()),
                    None => entry.user = Some(attendee.profile.clone()),
                }
            }
        }

        for entry in stats.values_mut() {
            entry.finalize();
        }

        stats
    }

    /// `user_id`'s status for every record of `log`, in log order.
    ///
    /// A user not listed on a date is reported as undecided for it.
    pub fn history_for_user(log: &AttendanceLog, user_id: &UserId) -> UserDailyHistory {
        log.iter()
            .map(|record| DailyStatus {
                date: record.date,
                status: record
                    .status_of(user_id)
                    .unwrap_or(AttendanceStatus::Undecided),
            })
            .collect()
    }

    /// The trailing `days` entries of `history`.
    pub fn calendar_window(history: &[DailyStatus], days: usize) -> &[DailyStatus] {
        &history[history.len().saturating_sub(days)..]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
