//! Attendance store discovery and loading.
//!
//! The store is a directory tree holding two kinds of files:
//!
//! * `*.jsonl` – one [`AttendanceRow`] per line (a user's answer for a date);
//! * `*.json`  – exported meeting records, an array of
//!   `{date, attending, not_attending, undecided}` objects.
//!
//! Both are folded into a single [`AttendanceLog`]. Exports are applied
//! first and rows second, each in path order, so later rows win.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use attendance_core::error::{AttendanceError, Result};
use attendance_core::models::{AttendanceLog, AttendanceStatus, MeetingRecord, UserId, UserProfile};
use attendance_core::time_utils::parse_date;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// File that [`append_row`] writes to inside the store.
pub const ROWS_FILE_NAME: &str = "attendance.jsonl";

// ── AttendanceRow ─────────────────────────────────────────────────────────────

/// One user's answer for one meeting date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRow {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub user_id: UserId,
    /// `true` attending, `false` not attending, `null`/absent undecided.
    #[serde(default)]
    pub attending: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl AttendanceRow {
    pub fn new(user_id: UserId, date: NaiveDate, status: AttendanceStatus) -> Self {
        Self {
            date,
            user_id,
            attending: status.as_flag(),
            full_name: None,
            avatar_url: None,
            position: None,
        }
    }

    pub fn status(&self) -> AttendanceStatus {
        AttendanceStatus::from_flag(self.attending)
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.user_id.clone(),
            full_name: self.full_name.clone(),
            avatar_url: self.avatar_url.clone(),
            position: self.position.clone(),
        }
    }
}

/// Accept plain dates as well as full timestamps for the `date` column.
fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

// ── Discovery ─────────────────────────────────────────────────────────────────

/// Default store location: `~/.attendance-report/data`.
pub fn default_store_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".attendance-report").join("data")
}

/// Find files with extension `ext` recursively under `store`, sorted by path.
pub fn find_files(store: &Path, ext: &str) -> Vec<PathBuf> {
    if !store.exists() {
        warn!("Attendance store does not exist: {}", store.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(store)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .map(|e| e == ext)
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Read every row from a single JSONL file.
///
/// Blank and unparsable lines are skipped; only failing to open the file is
/// an error.
pub fn read_rows(path: &Path) -> Result<Vec<AttendanceRow>> {
    let file = std::fs::File::open(path).map_err(|source| AttendanceError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<AttendanceRow>(trimmed) {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                debug!("{}:{}: skipping row: {}", path.display(), line_no + 1, e);
            }
        }
    }

    debug!(
        "File {}: {} rows, {} skipped",
        path.display(),
        rows.len(),
        skipped
    );

    Ok(rows)
}

/// Read an exported array of meeting records.
pub fn read_meeting_export(path: &Path) -> Result<Vec<MeetingRecord>> {
    let content = std::fs::read_to_string(path).map_err(|source| AttendanceError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Load the whole store into an ordered log.
///
/// Files that cannot be read or parsed are logged and skipped.
pub fn load_store(store: &Path) -> AttendanceLog {
    let mut records: Vec<MeetingRecord> = Vec::new();

    let exports = find_files(store, "json");
    for path in &exports {
        match read_meeting_export(path) {
            Ok(found) => records.extend(found),
            Err(e) => warn!("Skipping meeting export {}: {}", path.display(), e),
        }
    }

    let row_files = find_files(store, "jsonl");
    let mut rows: Vec<AttendanceRow> = Vec::new();
    for path in &row_files {
        match read_rows(path) {
            Ok(found) => rows.extend(found),
            Err(e) => warn!("{}", e),
        }
    }

    debug!(
        "Loaded {} exported records and {} rows from {} files",
        records.len(),
        rows.len(),
        exports.len() + row_files.len()
    );

    records.extend(group_rows(rows).into_records());
    AttendanceLog::from_unsorted(records)
}

/// Group rows by date into meeting records.
///
/// A later row for the same `(date, user_id)` replaces the earlier one.
pub fn group_rows(rows: impl IntoIterator<Item = AttendanceRow>) -> AttendanceLog {
    let mut by_date: BTreeMap<NaiveDate, MeetingRecord> = BTreeMap::new();
    for row in rows {
        let status = row.status();
        by_date
            .entry(row.date)
            .or_insert_with(|| MeetingRecord::new(row.date))
            .set(row.profile(), status);
    }
    AttendanceLog::from_unsorted(by_date.into_values().collect())
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Append `row` to the store's rows file, creating the store if needed.
pub fn append_row(store: &Path, row: &AttendanceRow) -> Result<PathBuf> {
    std::fs::create_dir_all(store)?;
    let path = store.join(ROWS_FILE_NAME);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| AttendanceError::FileRead {
            path: path.clone(),
            source,
        })?;

    let line = serde_json::to_string(row)?;
    writeln!(file, "{}", line)?;

    debug!(user = %row.user_id, date = %row.date, "appended attendance row");
    Ok(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
