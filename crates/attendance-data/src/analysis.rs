//! Attendance report pipeline.
//!
//! Fetches the meeting log from an [`AttendanceSource`], aggregates it and
//! resolves which meeting the day summary shows, returning an
//! [`AttendanceReport`] ready for the view layer.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use attendance_core::models::{
    AttendanceLog, AttendanceStatus, DailyStatus, DaySummary, MeetingRecord, UserDailyHistory,
    UserId,
};

use crate::aggregator::{AttendanceAggregator, StatsMap, CALENDAR_WINDOW};
use crate::source::AttendanceSource;

// ── Public types ──────────────────────────────────────────────────────────────

/// Metadata produced alongside the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// RFC 3339 timestamp when this report was generated.
    pub generated_at: String,
    pub records_loaded: usize,
    pub users_tracked: usize,
    /// Wall-clock seconds spent fetching from the source.
    pub load_time_seconds: f64,
    /// Wall-clock seconds spent aggregating.
    pub aggregate_time_seconds: f64,
}

/// The complete output of [`build_report`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub start_date: NaiveDate,
    pub view_date: NaiveDate,
    /// Records the report was computed from, ascending by date.
    pub log: AttendanceLog,
    /// Per-user statistics keyed by user id.
    pub stats: StatsMap,
    /// Head counts of the meeting shown in the day summary, if any.
    pub selected: Option<DaySummary>,
    pub metadata: ReportMetadata,
}

impl AttendanceReport {
    /// Assemble a report from an already fetched log and precomputed stats.
    pub fn assemble(
        log: AttendanceLog,
        stats: StatsMap,
        start_date: NaiveDate,
        view_date: NaiveDate,
        today: NaiveDate,
        metadata: ReportMetadata,
    ) -> Self {
        let mut report = Self {
            start_date,
            view_date,
            log,
            stats,
            selected: None,
            metadata,
        };
        report.resolve_view(view_date, today);
        report
    }

    /// Point the day summary at `view_date`, falling back to the latest
    /// meeting when `view_date` is `today`.
    pub fn resolve_view(&mut self, view_date: NaiveDate, today: NaiveDate) {
        self.view_date = view_date;
        self.selected = select_meeting(&self.log, view_date, view_date == today)
            .map(MeetingRecord::summary);
    }

    /// The meeting record behind the day summary.
    pub fn selected_meeting(&self) -> Option<&MeetingRecord> {
        self.selected.and_then(|s| self.log.find(s.date))
    }

    /// Show `date` in the day summary without refetching.
    ///
    /// An explicit choice never falls back to the latest meeting.
    pub fn select_date(&mut self, date: NaiveDate) {
        self.view_date = date;
        self.selected = self.log.find(date).map(MeetingRecord::summary);
    }

    /// `user_id`'s status on the selected meeting.
    pub fn selected_status(&self, user_id: &UserId) -> Option<AttendanceStatus> {
        self.selected_meeting().and_then(|m| m.status_of(user_id))
    }

    /// Full daily history for `user_id`.
    pub fn history_for(&self, user_id: &UserId) -> UserDailyHistory {
        AttendanceAggregator::history_for_user(&self.log, user_id)
    }

    /// The trailing calendar window for `user_id`.
    pub fn calendar_for(&self, user_id: &UserId) -> Vec<DailyStatus> {
        let history = self.history_for(user_id);
        AttendanceAggregator::calendar_window(&history, CALENDAR_WINDOW).to_vec()
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the full report pipeline.
///
/// 1. Fetch the meeting log since `start_date`; a fetch failure is logged
///    and treated as no data.
/// 2. Aggregate per-user statistics.
/// 3. Resolve the selected meeting for `view_date` (see [`select_meeting`]).
pub fn build_report<S: AttendanceSource + ?Sized>(
    source: &S,
    start_date: NaiveDate,
    view_date: NaiveDate,
    today: NaiveDate,
) -> AttendanceReport {
    let load_start = std::time::Instant::now();
    let log = fetch_or_empty(source, start_date);
    let load_time = load_start.elapsed().as_secs_f64();

    let aggregate_start = std::time::Instant::now();
    let stats = AttendanceAggregator::compute_stats(&log);
    let aggregate_time = aggregate_start.elapsed().as_secs_f64();

    let metadata = ReportMetadata {
        generated_at: Utc::now().to_rfc3339(),
        records_loaded: log.len(),
        users_tracked: stats.len(),
        load_time_seconds: load_time,
        aggregate_time_seconds: aggregate_time,
    };

    debug!(
        records = metadata.records_loaded,
        users = metadata.users_tracked,
        "attendance report built"
    );

    AttendanceReport::assemble(log, stats, start_date, view_date, today, metadata)
}

/// Fetch the log since `start_date`, degrading to an empty log on error.
pub fn fetch_or_empty<S: AttendanceSource + ?Sized>(
    source: &S,
    start_date: NaiveDate,
) -> AttendanceLog {
    match source.fetch_attendance_since(start_date) {
        Ok(log) => log,
        Err(e) => {
            warn!(error = %e, "failed to fetch attendance; reporting no data");
            AttendanceLog::default()
        }
    }
}

/// Meeting for `view_date`; on the initial view, fall back to the latest one.
pub fn select_meeting(
    log: &AttendanceLog,
    view_date: NaiveDate,
    fallback_to_latest: bool,
) -> Option<&MeetingRecord> {
    log.find(view_date)
        .or_else(|| if fallback_to_latest { log.latest() } else { None })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use attendance_core::error::{AttendanceError, Result};
    use attendance_core::models::UserProfile;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn meeting(day: u32, attending: &[&str], not_attending: &[&str]) -> MeetingRecord {
        MeetingRecord::from_lists(
            d(day),
            attending.iter().map(|id| UserProfile::new(*id)),
            not_attending.iter().map(|id| UserProfile::new(*id)),
            Vec::new(),
        )
    }

    fn source() -> InMemorySource {
        InMemorySource::new(
            AttendanceLog::new(vec![
                meeting(1, &["a", "b"], &[]),
                meeting(3, &["a"], &["b"]),
                meeting(5, &["b"], &["a"]),
            ])
            .unwrap(),
        )
    }

    struct FailingSource;

    impl AttendanceSource for FailingSource {
        fn fetch_attendance_since(&self, _start: NaiveDate) -> Result<AttendanceLog> {
            Err(AttendanceError::Config("backend unavailable".to_string()))
        }
    }

    #[test]
    fn test_build_report_counts() {
        let report = build_report(&source(), d(1), d(5), d(5));
        assert_eq!(report.metadata.records_loaded, 3);
        assert_eq!(report.metadata.users_tracked, 2);
        assert_eq!(report.stats[&UserId::from("a")].attended_count, 2);
        assert_eq!(report.stats[&UserId::from("b")].current_streak, 1);
    }

    #[test]
    fn test_build_report_respects_start_date() {
        let report = build_report(&source(), d(2), d(5), d(5));
        assert_eq!(report.log.len(), 2);
        assert_eq!(report.stats[&UserId::from("b")].attended_count, 1);
    }

    #[test]
    fn test_selected_meeting_for_view_date() {
        let report = build_report(&source(), d(1), d(3), d(9));
        let selected = report.selected.unwrap();
        assert_eq!(selected.date, d(3));
        assert_eq!(selected.attending, 1);
        assert_eq!(selected.not_attending, 1);
        assert_eq!(
            report.selected_status(&UserId::from("b")),
            Some(AttendanceStatus::NotAttending)
        );
    }

    #[test]
    fn test_initial_view_falls_back_to_latest() {
        // Viewing "today" with no meeting today shows the latest meeting.
        let report = build_report(&source(), d(1), d(9), d(9));
        assert_eq!(report.selected.map(|s| s.date), Some(d(5)));
    }

    #[test]
    fn test_resolve_view_switches_meeting() {
        let mut report = build_report(&source(), d(1), d(9), d(9));
        report.resolve_view(d(3), d(9));
        assert_eq!(report.selected.map(|s| s.date), Some(d(3)));
        report.resolve_view(d(4), d(9));
        assert!(report.selected.is_none());
    }

    #[test]
    fn test_explicit_date_without_meeting_selects_nothing() {
        let report = build_report(&source(), d(1), d(4), d(9));
        assert!(report.selected.is_none());

        let mut report = build_report(&source(), d(1), d(9), d(9));
        report.select_date(d(2));
        assert!(report.selected.is_none());
        assert_eq!(report.view_date, d(2));
        report.select_date(d(1));
        assert_eq!(report.selected.map(|s| s.attending), Some(2));
    }

    #[test]
    fn test_fetch_failure_reports_no_data() {
        let report = build_report(&FailingSource, d(1), d(1), d(1));
        assert!(report.log.is_empty());
        assert!(report.stats.is_empty());
        assert!(report.selected.is_none());
        assert!(report.history_for(&UserId::from("a")).is_empty());
    }

    #[test]
    fn test_history_and_calendar_helpers() {
        let report = build_report(&source(), d(1), d(5), d(5));
        let history = report.history_for(&UserId::from("a"));
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].status, AttendanceStatus::NotAttending);
        assert_eq!(report.calendar_for(&UserId::from("a")).len(), 3);
    }

    #[test]
    fn test_report_serializes() {
        let report = build_report(&source(), d(1), d(5), d(5));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["start_date"], "2024-01-01");
        assert_eq!(value["stats"]["a"]["attendedCount"], 2);
        assert_eq!(value["selected"]["date"], "2024-01-05");
        assert_eq!(value["log"].as_array().unwrap().len(), 3);
    }
}
