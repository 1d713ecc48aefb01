use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AttendanceError, Result};

// ── UserId / UserProfile ──────────────────────────────────────────────────────

/// Opaque user identifier as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Display information for a user, as attached to attendance rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl UserProfile {
    /// A profile carrying only the id.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            full_name: None,
            avatar_url: None,
            position: None,
        }
    }

    pub fn with_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Overlay `newer` onto this profile. Fields `newer` leaves empty keep
    /// their current value.
    pub fn absorb(&mut self, newer: UserProfile) {
        self.full_name = newer.full_name.or(self.full_name.take());
        self.avatar_url = newer.avatar_url.or(self.avatar_url.take());
        self.position = newer.position.or(self.position.take());
    }

    /// Full name when known and non-empty, otherwise the raw id.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.id.as_str(),
        }
    }
}

/// A user reference inside a meeting list: either a bare id or a full object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(UserId),
    Profile(UserProfile),
}

impl UserRef {
    pub fn into_profile(self) -> UserProfile {
        match self {
            UserRef::Id(id) => UserProfile::new(id),
            UserRef::Profile(profile) => profile,
        }
    }
}

// ── AttendanceStatus ──────────────────────────────────────────────────────────

/// A user's answer for one meeting date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Attending,
    NotAttending,
    Undecided,
}

impl AttendanceStatus {
    /// Every status, in list order of a meeting record.
    pub const ALL: [AttendanceStatus; 3] = [
        AttendanceStatus::Attending,
        AttendanceStatus::NotAttending,
        AttendanceStatus::Undecided,
    ];

    /// Map the nullable `attending` column of an attendance row.
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            Some(true) => AttendanceStatus::Attending,
            Some(false) => AttendanceStatus::NotAttending,
            None => AttendanceStatus::Undecided,
        }
    }

    /// Inverse of [`Self::from_flag`].
    pub fn as_flag(self) -> Option<bool> {
        match self {
            AttendanceStatus::Attending => Some(true),
            AttendanceStatus::NotAttending => Some(false),
            AttendanceStatus::Undecided => None,
        }
    }

    /// Wire name, e.g. `"not_attending"`.
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Attending => "attending",
            AttendanceStatus::NotAttending => "not_attending",
            AttendanceStatus::Undecided => "undecided",
        }
    }

    /// Human-readable label, e.g. `"Not Attending"`.
    pub fn label(self) -> &'static str {
        match self {
            AttendanceStatus::Attending => "Attending",
            AttendanceStatus::NotAttending => "Not Attending",
            AttendanceStatus::Undecided => "Undecided",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "attending" | "yes" => Ok(AttendanceStatus::Attending),
            "not_attending" | "no" => Ok(AttendanceStatus::NotAttending),
            "undecided" => Ok(AttendanceStatus::Undecided),
            _ => Err(AttendanceError::InvalidStatus(s.to_string())),
        }
    }
}

// ── MeetingRecord ─────────────────────────────────────────────────────────────

/// One user's entry within a meeting record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub profile: UserProfile,
    pub status: AttendanceStatus,
}

/// Attendance snapshot for one meeting date.
///
/// Each user holds exactly one status, so the attending / not-attending /
/// undecided partition is disjoint by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MeetingRecordWire", into = "MeetingRecordWire")]
pub struct MeetingRecord {
    pub date: NaiveDate,
    members: BTreeMap<UserId, Attendee>,
}

impl MeetingRecord {
    /// An empty record for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            members: BTreeMap::new(),
        }
    }

    /// Build a record from the three status lists of the wire format.
    ///
    /// Lists are applied in order attending, not-attending, undecided; a user
    /// listed twice keeps the later status and a warning is logged.
    pub fn from_lists(
        date: NaiveDate,
        attending: impl IntoIterator<Item = UserProfile>,
        not_attending: impl IntoIterator<Item = UserProfile>,
        undecided: impl IntoIterator<Item = UserProfile>,
    ) -> Self {
        let mut record = Self::new(date);
        let lists: [(AttendanceStatus, Vec<UserProfile>); 3] = [
            (AttendanceStatus::Attending, attending.into_iter().collect()),
            (AttendanceStatus::NotAttending, not_attending.into_iter().collect()),
            (AttendanceStatus::Undecided, undecided.into_iter().collect()),
        ];
        for (status, users) in lists {
            for profile in users {
                let id = profile.id.clone();
                if let Some(previous) = record.set(profile, status) {
                    if previous != status {
                        warn!(
                            date = %date,
                            user = %id,
                            "user listed as both {} and {}; keeping {}",
                            previous,
                            status,
                            status
                        );
                    }
                }
            }
        }
        record
    }

    /// Set `profile`'s status, returning the status it replaced.
    ///
    /// Profile fields missing from `profile` are kept from the stored entry.
    pub fn set(&mut self, profile: UserProfile, status: AttendanceStatus) -> Option<AttendanceStatus> {
        match self.members.entry(profile.id.clone()) {
            Entry::Occupied(mut slot) => {
                let attendee = slot.get_mut();
                let previous = attendee.status;
                attendee.profile.absorb(profile);
                attendee.status = status;
                Some(previous)
            }
            Entry::Vacant(slot) => {
                slot.insert(Attendee { profile, status });
                None
            }
        }
    }

    /// Status of `user_id` on this date, `None` when the user is not listed.
    pub fn status_of(&self, user_id: &UserId) -> Option<AttendanceStatus> {
        self.members.get(user_id).map(|a| a.status)
    }

    /// All attendees ordered by user id.
    pub fn attendees(&self) -> impl Iterator<Item = &Attendee> {
        self.members.values()
    }

    /// Profiles of the users holding `status`, ordered by user id.
    pub fn members_with(&self, status: AttendanceStatus) -> impl Iterator<Item = &UserProfile> {
        self.members
            .values()
            .filter(move |a| a.status == status)
            .map(|a| &a.profile)
    }

    pub fn count(&self, status: AttendanceStatus) -> usize {
        self.members_with(status).count()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Fold `other` (same date) into this record; `other`'s status wins per
    /// user, profile fields it lacks are kept.
    pub fn merge(&mut self, other: MeetingRecord) {
        for attendee in other.members.into_values() {
            self.set(attendee.profile, attendee.status);
        }
    }

    /// Per-status head counts for the day summary.
    pub fn summary(&self) -> DaySummary {
        DaySummary {
            date: self.date,
            attending: self.count(AttendanceStatus::Attending),
            not_attending: self.count(AttendanceStatus::NotAttending),
            undecided: self.count(AttendanceStatus::Undecided),
        }
    }
}

/// Wire shape of a meeting record: a date plus three user lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeetingRecordWire {
    #[serde(alias = "meeting_date")]
    date: NaiveDate,
    #[serde(default)]
    attending: Vec<UserRef>,
    #[serde(default)]
    not_attending: Vec<UserRef>,
    #[serde(default)]
    undecided: Vec<UserRef>,
}

impl From<MeetingRecordWire> for MeetingRecord {
    fn from(wire: MeetingRecordWire) -> Self {
        MeetingRecord::from_lists(
            wire.date,
            wire.attending.into_iter().map(UserRef::into_profile),
            wire.not_attending.into_iter().map(UserRef::into_profile),
            wire.undecided.into_iter().map(UserRef::into_profile),
        )
    }
}

impl From<MeetingRecord> for MeetingRecordWire {
    fn from(record: MeetingRecord) -> Self {
        let mut wire = MeetingRecordWire {
            date: record.date,
            attending: Vec::new(),
            not_attending: Vec::new(),
            undecided: Vec::new(),
        };
        for attendee in record.members.into_values() {
            let list = match attendee.status {
                AttendanceStatus::Attending => &mut wire.attending,
                AttendanceStatus::NotAttending => &mut wire.not_attending,
                AttendanceStatus::Undecided => &mut wire.undecided,
            };
            list.push(UserRef::Profile(attendee.profile));
        }
        wire
    }
}

/// Head counts for one meeting date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub attending: usize,
    pub not_attending: usize,
    pub undecided: usize,
}

// ── AttendanceLog ─────────────────────────────────────────────────────────────

/// Meeting records with strictly ascending, unique dates.
///
/// Aggregation is order-sensitive (streaks), so the ordering is carried by
/// the type instead of being assumed from the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MeetingRecord>", into = "Vec<MeetingRecord>")]
pub struct AttendanceLog {
    records: Vec<MeetingRecord>,
}

impl AttendanceLog {
    /// Validate that `records` is already in strictly ascending date order.
    pub fn new(records: Vec<MeetingRecord>) -> Result<Self> {
        for pair in records.windows(2) {
            let (earlier, later) = (pair[0].date, pair[1].date);
            if later == earlier {
                return Err(AttendanceError::DuplicateDate(later));
            }
            if later < earlier {
                return Err(AttendanceError::UnorderedRecords { earlier, later });
            }
        }
        Ok(Self { records })
    }

    /// Sort `records` by date and merge records that share a date.
    ///
    /// Records are merged in input order, so for a repeated date the later
    /// record wins for every user it lists.
    pub fn from_unsorted(mut records: Vec<MeetingRecord>) -> Self {
        records.sort_by_key(|r| r.date);
        let mut merged: Vec<MeetingRecord> = Vec::with_capacity(records.len());
        for record in records {
            match merged.last_mut() {
                Some(last) if last.date == record.date => last.merge(record),
                _ => merged.push(record),
            }
        }
        Self { records: merged }
    }

    pub fn records(&self) -> &[MeetingRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MeetingRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    pub fn latest(&self) -> Option<&MeetingRecord> {
        self.records.last()
    }

    /// Record for `date`, found by binary search.
    pub fn find(&self, date: NaiveDate) -> Option<&MeetingRecord> {
        self.records
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// Records dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> AttendanceLog {
        let from = self.records.partition_point(|r| r.date < start);
        AttendanceLog {
            records: self.records[from..].to_vec(),
        }
    }

    /// Nearest record date strictly before `date`.
    pub fn previous_date(&self, date: NaiveDate) -> Option<NaiveDate> {
        let idx = self.records.partition_point(|r| r.date < date);
        idx.checked_sub(1).map(|i| self.records[i].date)
    }

    /// Nearest record date strictly after `date`.
    pub fn next_date(&self, date: NaiveDate) -> Option<NaiveDate> {
        let idx = self.records.partition_point(|r| r.date <= date);
        self.records.get(idx).map(|r| r.date)
    }

    pub fn into_records(self) -> Vec<MeetingRecord> {
        self.records
    }
}

impl TryFrom<Vec<MeetingRecord>> for AttendanceLog {
    type Error = AttendanceError;

    fn try_from(records: Vec<MeetingRecord>) -> Result<Self> {
        AttendanceLog::new(records)
    }
}

impl From<AttendanceLog> for Vec<MeetingRecord> {
    fn from(log: AttendanceLog) -> Self {
        log.records
    }
}

impl<'a> IntoIterator for &'a AttendanceLog {
    type Item = &'a MeetingRecord;
    type IntoIter = std::slice::Iter<'a, MeetingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ── DailyStatus ───────────────────────────────────────────────────────────────

/// One entry of a user's calendar history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStatus {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// A user's status per meeting date, in log order.
pub type UserDailyHistory = Vec<DailyStatus>;

// ── Tests ─────────────────────────────────────────────────────────────────────
