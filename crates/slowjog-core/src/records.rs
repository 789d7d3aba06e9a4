//! Completed session records and the in-memory store that lists them.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// A countdown that ran to zero.
///
/// `started_at` is derived as `ended_at - duration_sec`, so it assumes the
/// run had no pauses. Records are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    id: String,
    duration_sec: u64,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Builds the record of a countdown of `duration_sec` that ended at `ended_at`.
    pub fn completed(id: impl Into<String>, duration_sec: u64, ended_at: DateTime<Utc>) -> Self {
        let started_at = i64::try_from(duration_sec)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|span| ended_at.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self {
            id: id.into(),
            duration_sec,
            started_at,
            ended_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Planned duration of the countdown, in seconds.
    pub fn duration_sec(&self) -> u64 {
        self.duration_sec
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }
}

/// Completed sessions, most recent first.
///
/// Entries are never removed or deduplicated; the store lives as long as
/// the controller that owns it.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    records: Vec<SessionRecord>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record at the front.
    pub fn append(&mut self, record: SessionRecord) {
        self.records.insert(0, record);
    }

    /// All records, most recent first.
    pub fn list(&self) -> &[SessionRecord] {
        &self.records
    }

    pub fn find(&self, id: &str) -> Option<&SessionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// The record at a 1-based display position.
    pub fn nth(&self, position: usize) -> Option<&SessionRecord> {
        position.checked_sub(1).and_then(|i| self.records.get(i))
    }

    pub fn latest(&self) -> Option<&SessionRecord> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
