//! TTL-cached report manager.
//!
//! Wraps an [`AttendanceSource`] and the report pipeline with a
//! time-to-live cache and retry logic. Callers use
//! [`ReportManager::get_report`] to obtain a fresh-or-cached
//! [`AttendanceReport`]; the manager handles staleness checks, up to three
//! fetch attempts with back-off, and fallback to the previous report when
//! every attempt fails.

use std::thread;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};

use attendance_core::models::AttendanceLog;
use attendance_data::aggregator::{AttendanceAggregator, StatsMap};
use attendance_data::analysis::{AttendanceReport, ReportMetadata};
use attendance_data::source::AttendanceSource;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default cache TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Maximum number of fetch attempts before giving up and returning stale data.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Identifies the inputs an aggregate was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheKey {
    pub start_date: NaiveDate,
    pub last_record_date: Option<NaiveDate>,
    pub record_count: usize,
}

impl CacheKey {
    pub fn for_log(start_date: NaiveDate, log: &AttendanceLog) -> Self {
        Self {
            start_date,
            last_record_date: log.last_date(),
            record_count: log.len(),
        }
    }
}

struct CachedStats {
    key: CacheKey,
    /// Log the stats were computed from; reuse requires an identical fetch.
    log: AttendanceLog,
    stats: StatsMap,
    computed_at: Instant,
}

/// Boxed source shared with the blocking pool.
pub type BoxedSource = Box<dyn AttendanceSource + Send + Sync>;

// ── ReportManager ─────────────────────────────────────────────────────────────

/// TTL-cached wrapper around the report pipeline.
///
/// # Example
/// ```no_run
/// use attendance_data::source::JsonlAttendanceSource;
/// use attendance_runtime::data_manager::ReportManager;
/// use chrono::NaiveDate;
///
/// let mut mgr = ReportManager::new(Box::new(JsonlAttendanceSource::open(None)), 30);
/// let today = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// let report = mgr.get_report(today, today, today, false);
/// println!("users: {}", report.stats.len());
/// ```
pub struct ReportManager {
    source: BoxedSource,
    cache_ttl: Duration,
    /// Most recently built report.
    cache: Option<AttendanceReport>,
    /// When `cache` was last populated.
    cache_timestamp: Option<Instant>,
    stats_cache: Option<CachedStats>,
    /// Description of the last error encountered.
    last_error: Option<String>,
}

impl ReportManager {
    pub fn new(source: BoxedSource, cache_ttl_secs: u64) -> Self {
        Self {
            source,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache: None,
            cache_timestamp: None,
            stats_cache: None,
            last_error: None,
        }
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Return the report for `start_date` viewed at `view_date`.
    ///
    /// A cached report for the same start date is reused while it is within
    /// its TTL unless `force_refresh` is set. When every fetch attempt fails
    /// the previous report is served (even if stale), or an empty report if
    /// nothing was ever fetched.
    pub fn get_report(
        &mut self,
        start_date: NaiveDate,
        view_date: NaiveDate,
        today: NaiveDate,
        force_refresh: bool,
    ) -> &AttendanceReport {
        if !force_refresh && self.is_cache_valid_for(start_date) {
            tracing::debug!("returning cached attendance report");
            return self.reselect(start_date, view_date, today);
        }

        let load_start = Instant::now();
        match self.fetch_with_retry(start_date) {
            Ok(log) => {
                let load_time = load_start.elapsed().as_secs_f64();
                let aggregate_start = Instant::now();
                let stats = self.stats_for(start_date, &log);
                let metadata = ReportMetadata {
                    generated_at: Utc::now().to_rfc3339(),
                    records_loaded: log.len(),
                    users_tracked: stats.len(),
                    load_time_seconds: load_time,
                    aggregate_time_seconds: aggregate_start.elapsed().as_secs_f64(),
                };
                tracing::debug!(
                    records = metadata.records_loaded,
                    users = metadata.users_tracked,
                    "report cache updated"
                );
                let report =
                    AttendanceReport::assemble(log, stats, start_date, view_date, today, metadata);
                self.cache_timestamp = Some(Instant::now());
                self.last_error = None;
                self.cache.insert(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "fetch failed; falling back to cached report");
                self.last_error = Some(e);
                self.reselect(start_date, view_date, today)
            }
        }
    }

    /// Discard the cached report and aggregate.
    pub fn invalidate_cache(&mut self) {
        self.cache = None;
        self.cache_timestamp = None;
        self.stats_cache = None;
        tracing::debug!("cache invalidated");
    }

    /// Age of the cached report, or `None` if nothing has been fetched.
    pub fn cache_age(&self) -> Option<Duration> {
        self.cache_timestamp.map(|ts| ts.elapsed())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn is_cache_valid_for(&self, start_date: NaiveDate) -> bool {
        match (self.cache.as_ref(), self.cache_timestamp) {
            (Some(report), Some(ts)) => {
                report.start_date == start_date && ts.elapsed() < self.cache_ttl
            }
            _ => false,
        }
    }

    /// Re-point the cached report at `view_date`, creating an empty one if
    /// nothing was ever fetched.
    fn reselect(
        &mut self,
        start_date: NaiveDate,
        view_date: NaiveDate,
        today: NaiveDate,
    ) -> &AttendanceReport {
        let report = self
            .cache
            .get_or_insert_with(|| empty_report(start_date, view_date, today));
        report.resolve_view(view_date, today);
        report
    }

    /// Stats for `log`, reusing the cached aggregate only when it was
    /// computed from the same records.
    ///
    /// The key is checked first; an edit that keeps the key (a changed status
    /// on an existing date) is caught by comparing the records themselves.
    fn stats_for(&mut self, start_date: NaiveDate, log: &AttendanceLog) -> StatsMap {
        let key = CacheKey::for_log(start_date, log);
        if let Some(cached) = &self.stats_cache {
            if cached.key == key && cached.log == *log {
                tracing::debug!(
                    age_ms = cached.computed_at.elapsed().as_millis() as u64,
                    "reusing cached attendance stats"
                );
                return cached.stats.clone();
            }
        }

        let stats = AttendanceAggregator::compute_stats(log);
        self.stats_cache = Some(CachedStats {
            key,
            log: log.clone(),
            stats: stats.clone(),
            computed_at: Instant::now(),
        });
        stats
    }

    /// Attempt up to [`MAX_RETRY_ATTEMPTS`] fetches.
    ///
    /// Back-off schedule: attempt 1 → 0 ms, attempt 2 → 100 ms, attempt 3 → 200 ms.
    fn fetch_with_retry(&self, start_date: NaiveDate) -> Result<AttendanceLog, String> {
        let mut last_err = String::new();

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                let sleep_ms = u64::from(attempt) * 100;
                tracing::debug!(attempt, sleep_ms, "retrying fetch after back-off");
                thread::sleep(Duration::from_millis(sleep_ms));
            }

            match self.source.fetch_attendance_since(start_date) {
                Ok(log) => return Ok(log),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "fetch attempt failed");
                    last_err = e.to_string();
                }
            }
        }

        Err(last_err)
    }
}

fn empty_report(start_date: NaiveDate, view_date: NaiveDate, today: NaiveDate) -> AttendanceReport {
    let metadata = ReportMetadata {
        generated_at: Utc::now().to_rfc3339(),
        records_loaded: 0,
        users_tracked: 0,
        load_time_seconds: 0.0,
        aggregate_time_seconds: 0.0,
    };
    AttendanceReport::assemble(
        AttendanceLog::default(),
        StatsMap::new(),
        start_date,
        view_date,
        today,
        metadata,
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use attendance_core::error::{AttendanceError, Result};
    use attendance_core::models::{AttendanceStatus, MeetingRecord, UserId, UserProfile};
    use attendance_data::source::{InMemorySource, JsonlAttendanceSource};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn log() -> AttendanceLog {
        AttendanceLog::new(vec![
            MeetingRecord::from_lists(d(1), vec![UserProfile::new("a")], Vec::new(), Vec::new()),
            MeetingRecord::from_lists(d(8), Vec::new(), vec![UserProfile::new("a")], Vec::new()),
        ])
        .unwrap()
    }

    /// Source that fails `failures` times, then serves `log`.
    struct FlakySource {
        failures: usize,
        calls: Arc<AtomicUsize>,
        log: AttendanceLog,
    }

    impl AttendanceSource for FlakySource {
        fn fetch_attendance_since(&self, start: NaiveDate) -> Result<AttendanceLog> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AttendanceError::Config(format!("transient failure {call}")))
            } else {
                Ok(self.log.since(start))
            }
        }
    }

    fn flaky(failures: usize) -> (ReportManager, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FlakySource {
            failures,
            calls: Arc::clone(&calls),
            log: log(),
        };
        (ReportManager::new(Box::new(source), 30), calls)
    }

    #[test]
    fn test_cache_miss_on_first_call() {
        let mgr = ReportManager::new(Box::new(InMemorySource::new(log())), 30);
        assert!(!mgr.is_cache_valid_for(d(1)));
        assert!(mgr.cache_age().is_none());
        assert!(mgr.last_error().is_none());
    }

    #[test]
    fn test_cache_valid_within_ttl() {
        let (mut mgr, calls) = flaky(0);
        assert_eq!(mgr.get_report(d(1), d(8), d(8), false).stats.len(), 1);
        mgr.get_report(d(1), d(8), d(8), false);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(mgr.cache_age().unwrap() < Duration::from_secs(5));
    }

    #[test]
    fn test_cached_report_follows_view_date() {
        let (mut mgr, calls) = flaky(0);
        mgr.get_report(d(1), d(8), d(8), false);
        let report = mgr.get_report(d(1), d(1), d(8), false);
        assert_eq!(report.view_date, d(1));
        assert_eq!(report.selected.map(|s| s.attending), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_date_change_refetches() {
        let (mut mgr, calls) = flaky(0);
        mgr.get_report(d(1), d(8), d(8), false);
        let report = mgr.get_report(d(2), d(8), d(8), false);
        assert_eq!(report.log.len(), 1);
        assert_eq!(report.stats[&UserId::from("a")].missed_count, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_expired() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FlakySource {
            failures: 0,
            calls: Arc::clone(&calls),
            log: log(),
        };
        let mut mgr = ReportManager::new(Box::new(source), 0);
        mgr.get_report(d(1), d(8), d(8), false);
        assert!(!mgr.is_cache_valid_for(d(1)));
        mgr.get_report(d(1), d(8), d(8), false);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_force_refresh_reuses_stats_for_unchanged_records() {
        let (mut mgr, calls) = flaky(0);
        mgr.get_report(d(1), d(8), d(8), false);
        let before = mgr.stats_cache.as_ref().unwrap().computed_at;
        mgr.get_report(d(1), d(8), d(8), true);
        let after = mgr.stats_cache.as_ref().unwrap().computed_at;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(before, after);
    }

    #[test]
    fn test_edited_record_recomputes_stats() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = JsonlAttendanceSource::new(tmp.path());
        source
            .record_attendance(&UserProfile::new("a"), d(1), AttendanceStatus::Attending)
            .unwrap();
        let mut mgr = ReportManager::new(Box::new(source.clone()), 30);
        assert_eq!(mgr.get_report(d(1), d(1), d(1), false).stats[&UserId::from("a")].attended_count, 1);

        // Same date and record count, different status.
        source
            .record_attendance(&UserProfile::new("a"), d(1), AttendanceStatus::NotAttending)
            .unwrap();
        let report = mgr.get_report(d(1), d(1), d(1), true);

        assert_eq!(report.stats, AttendanceAggregator::compute_stats(&report.log));
        let a = &report.stats[&UserId::from("a")];
        assert_eq!(a.attended_count, 0);
        assert_eq!(a.missed_count, 1);
        assert_eq!(a.attendance_rate, 0);
        assert_eq!(report.selected.map(|s| s.not_attending), Some(1));
    }

    #[test]
    fn test_new_record_changes_key() {
        let tmp = tempfile::TempDir::new().unwrap();
        let source = JsonlAttendanceSource::new(tmp.path());
        source
            .record_attendance(&UserProfile::new("a"), d(1), AttendanceStatus::Attending)
            .unwrap();
        let mut mgr = ReportManager::new(Box::new(source.clone()), 30);
        assert_eq!(mgr.get_report(d(1), d(1), d(1), false).stats.len(), 1);

        source
            .record_attendance(&UserProfile::new("b"), d(2), AttendanceStatus::Attending)
            .unwrap();
        let report = mgr.get_report(d(1), d(2), d(2), true);
        assert_eq!(report.stats.len(), 2);
        assert_eq!(mgr.stats_cache.as_ref().unwrap().key.record_count, 2);
    }

    #[test]
    fn test_retry_recovers_from_transient_failures() {
        let (mut mgr, calls) = flaky(2);
        let report = mgr.get_report(d(1), d(8), d(8), false);
        assert_eq!(report.log.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(mgr.last_error().is_none());
    }

    #[test]
    fn test_total_failure_without_cache_yields_empty_report() {
        let (mut mgr, calls) = flaky(usize::MAX);
        let report = mgr.get_report(d(1), d(8), d(8), false);
        assert!(report.log.is_empty());
        assert!(report.selected.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(mgr.last_error().unwrap().contains("transient failure"));
    }

    #[test]
    fn test_total_failure_serves_stale_report() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FlakySource {
            failures: 0,
            calls: Arc::clone(&calls),
            log: log(),
        };
        let mut mgr = ReportManager::new(Box::new(source), 30);
        mgr.get_report(d(1), d(8), d(8), false);

        // Every later call fails.
        mgr.source = Box::new(FlakySource {
            failures: usize::MAX,
            calls: Arc::new(AtomicUsize::new(0)),
            log: AttendanceLog::default(),
        });
        let report = mgr.get_report(d(1), d(8), d(8), true);
        assert_eq!(report.log.len(), 2);
        assert!(mgr.last_error().is_some());
    }

    #[test]
    fn test_invalidate_cache() {
        let (mut mgr, _calls) = flaky(0);
        mgr.get_report(d(1), d(8), d(8), false);
        assert!(mgr.cache.is_some());

        mgr.invalidate_cache();
        assert!(mgr.cache.is_none());
        assert!(mgr.stats_cache.is_none());
        assert!(mgr.cache_age().is_none());
    }
}
