//! Async report orchestrator.
//!
//! Runs a [`ReportManager`] in a tokio task, applying [`ReportCommand`]s from
//! the UI and sending [`ReportSnapshot`]s back through an `mpsc` channel so
//! the TUI event loop never blocks on the attendance store.

use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::mpsc;
use tokio::time;

use attendance_core::time_utils;
use attendance_data::analysis::AttendanceReport;

use crate::data_manager::{BoxedSource, ReportManager, DEFAULT_CACHE_TTL_SECS};

// ── Public types ──────────────────────────────────────────────────────────────

/// Requests from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportCommand {
    /// Recompute the report from a new start date; the view returns to today.
    SetStartDate(NaiveDate),
    /// Show a different meeting in the day summary.
    SetViewDate(NaiveDate),
    /// Refetch, bypassing the cache.
    Refresh,
}

/// A report forwarded to the TUI layer.
#[derive(Debug, Clone)]
pub struct ReportSnapshot {
    pub report: AttendanceReport,
    /// Increments with every snapshot sent.
    pub generation: u64,
    /// Last fetch error, if the report is stale.
    pub error: Option<String>,
}

impl ReportSnapshot {
    /// `true` if this snapshot answers the given start-date selection.
    pub fn matches_start(&self, start_date: NaiveDate) -> bool {
        self.report.start_date == start_date
    }
}

// ── ReportOrchestrator ────────────────────────────────────────────────────────

/// Background report coordinator.
///
/// Call [`ReportOrchestrator::start`] to spin up the loop in a dedicated
/// tokio task.
pub struct ReportOrchestrator {
    update_interval: Duration,
    timezone: String,
    start_date: NaiveDate,
    view_date: NaiveDate,
    manager: ReportManager,
}

impl ReportOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Parameters
    /// - `source`               – where attendance is fetched from.
    /// - `update_interval_secs` – seconds between automatic refreshes.
    /// - `timezone`             – IANA name used to compute "today".
    /// - `start_date`, `view_date` – initial selection.
    pub fn new(
        source: BoxedSource,
        update_interval_secs: u64,
        timezone: String,
        start_date: NaiveDate,
        view_date: NaiveDate,
    ) -> Self {
        Self {
            update_interval: Duration::from_secs(update_interval_secs.max(1)),
            timezone,
            start_date,
            view_date,
            manager: ReportManager::new(source, DEFAULT_CACHE_TTL_SECS),
        }
    }

    /// Start the report loop.
    ///
    /// Returns the snapshot receiver, the command sender and a
    /// [`ReportHandle`] that aborts the loop.
    pub fn start(
        self,
    ) -> (
        mpsc::Receiver<ReportSnapshot>,
        mpsc::Sender<ReportCommand>,
        ReportHandle,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            self.report_loop(tx, cmd_rx).await;
        });

        (rx, cmd_tx, ReportHandle { handle })
    }

    // ── Private implementation ────────────────────────────────────────────

    /// Fetch on startup, then on every interval tick or command.
    ///
    /// Exits when either channel closes.
    async fn report_loop(
        mut self,
        tx: mpsc::Sender<ReportSnapshot>,
        mut cmd_rx: mpsc::Receiver<ReportCommand>,
    ) {
        let mut generation = 0u64;

        if !self.fetch_and_send(&tx, &mut generation, true).await {
            return;
        }

        let mut interval = time::interval(self.update_interval);
        // The first tick fires immediately; we already fetched above.
        interval.tick().await;

        loop {
            let force = tokio::select! {
                _ = interval.tick() => false,
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.apply(cmd),
                    None => {
                        tracing::debug!("command channel closed; exiting loop");
                        break;
                    }
                },
            };

            if tx.is_closed() {
                tracing::debug!("report channel closed; exiting loop");
                break;
            }

            if !self.fetch_and_send(&tx, &mut generation, force).await {
                break;
            }
        }
    }

    /// Update the selection; returns whether the next fetch must bypass the cache.
    fn apply(&mut self, cmd: ReportCommand) -> bool {
        tracing::debug!(?cmd, "report command");
        match cmd {
            ReportCommand::SetStartDate(date) => {
                self.start_date = date;
                self.view_date = time_utils::today_in(&self.timezone);
                false
            }
            ReportCommand::SetViewDate(date) => {
                self.view_date = date;
                false
            }
            ReportCommand::Refresh => true,
        }
    }

    /// Build a report on the blocking pool and send it.
    ///
    /// Returns `false` when the loop should stop.
    async fn fetch_and_send(
        &mut self,
        tx: &mpsc::Sender<ReportSnapshot>,
        generation: &mut u64,
        force: bool,
    ) -> bool {
        let today = time_utils::today_in(&self.timezone);
        let start_date = time_utils::clamp_to_today(self.start_date, today);
        let view_date = self.view_date;
        let mut manager = std::mem::replace(&mut self.manager, placeholder_manager());

        let joined = tokio::task::spawn_blocking(move || {
            let report = manager
                .get_report(start_date, view_date, today, force)
                .clone();
            let error = manager.last_error().map(str::to_string);
            (manager, report, error)
        })
        .await;

        let (manager, report, error) = match joined {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(error = %e, "report task failed");
                return false;
            }
        };
        self.manager = manager;

        *generation += 1;
        let snapshot = ReportSnapshot {
            report,
            generation: *generation,
            error,
        };

        if let Err(e) = tx.send(snapshot).await {
            tracing::warn!(error = %e, "failed to send report snapshot; receiver dropped");
            return false;
        }
        true
    }
}

/// Stands in for the manager while it is on the blocking pool.
fn placeholder_manager() -> ReportManager {
    ReportManager::new(
        Box::new(attendance_data::source::InMemorySource::default()),
        DEFAULT_CACHE_TTL_SECS,
    )
}

// ── ReportHandle ──────────────────────────────────────────────────────────────

/// A handle to the background report task.
pub struct ReportHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl ReportHandle {
    /// Immediately abort the report loop.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
