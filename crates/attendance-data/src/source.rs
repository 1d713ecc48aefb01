//! Attendance data sources.
//!
//! [`AttendanceSource`] is the seam between the report pipeline and wherever
//! attendance lives. [`JsonlAttendanceSource`] reads the on-disk store;
//! [`InMemorySource`] serves a fixed log.

use std::path::{Path, PathBuf};

use attendance_core::error::{AttendanceError, Result};
use attendance_core::models::{AttendanceLog, AttendanceStatus, MeetingRecord, UserProfile};
use chrono::NaiveDate;
use tracing::debug;

use crate::reader::{self, AttendanceRow};

/// Supplier of meeting records.
pub trait AttendanceSource {
    /// All meeting records dated on or after `start`, ascending by date.
    fn fetch_attendance_since(&self, start: NaiveDate) -> Result<AttendanceLog>;

    /// The meeting record for exactly `date`, if one exists.
    fn fetch_attendance_for_date(&self, date: NaiveDate) -> Result<Option<MeetingRecord>> {
        let log = self.fetch_attendance_since(date)?;
        Ok(log.find(date).cloned())
    }
}

impl<S: AttendanceSource + ?Sized> AttendanceSource for Box<S> {
    fn fetch_attendance_since(&self, start: NaiveDate) -> Result<AttendanceLog> {
        (**self).fetch_attendance_since(start)
    }

    fn fetch_attendance_for_date(&self, date: NaiveDate) -> Result<Option<MeetingRecord>> {
        (**self).fetch_attendance_for_date(date)
    }
}

// ── JsonlAttendanceSource ─────────────────────────────────────────────────────

/// Attendance store on the local filesystem.
#[derive(Debug, Clone)]
pub struct JsonlAttendanceSource {
    store: PathBuf,
}

impl JsonlAttendanceSource {
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
        }
    }

    /// Store at `path`, or the default location when `None`.
    pub fn open(path: Option<&Path>) -> Self {
        match path {
            Some(p) => Self::new(p),
            None => Self::new(reader::default_store_path()),
        }
    }

    pub fn store(&self) -> &Path {
        &self.store
    }

    /// Upsert `profile`'s status for `date`.
    pub fn record_attendance(
        &self,
        profile: &UserProfile,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> Result<()> {
        let mut row = AttendanceRow::new(profile.id.clone(), date, status);
        row.full_name = profile.full_name.clone();
        row.avatar_url = profile.avatar_url.clone();
        row.position = profile.position.clone();
        reader::append_row(&self.store, &row)?;
        Ok(())
    }

    /// Fail with [`AttendanceError::DataPathNotFound`] if the store is missing.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.store.is_dir() {
            Ok(())
        } else {
            Err(AttendanceError::DataPathNotFound(self.store.clone()))
        }
    }
}

impl AttendanceSource for JsonlAttendanceSource {
    fn fetch_attendance_since(&self, start: NaiveDate) -> Result<AttendanceLog> {
        let log = reader::load_store(&self.store).since(start);
        debug!(
            store = %self.store.display(),
            start = %start,
            records = log.len(),
            "fetched attendance"
        );
        Ok(log)
    }
}

// ── InMemorySource ────────────────────────────────────────────────────────────

/// Source serving a fixed, already ordered log.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    log: AttendanceLog,
}

impl InMemorySource {
    pub fn new(log: AttendanceLog) -> Self {
        Self { log }
    }
}

impl AttendanceSource for InMemorySource {
    fn fetch_attendance_since(&self, start: NaiveDate) -> Result<AttendanceLog> {
        Ok(self.log.since(start))
    }

    fn fetch_attendance_for_date(&self, date: NaiveDate) -> Result<Option<MeetingRecord>> {
        Ok(self.log.find(date).cloned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
