use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use quest_core::{SessionId, SessionStatus, Turn};

/// Live view of one session, kept for inspection after it ends.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub target: String,
    pub status: SessionStatus,
    pub steps: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub turns: Vec<Turn>,
}

/// Listing entry without the turn history.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub target: String,
    pub status: SessionStatus,
    pub steps: u32,
    pub turns: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(r: &SessionRecord) -> Self {
        Self {
            id: r.id,
            target: r.target.clone(),
            status: r.status,
            steps: r.steps,
            turns: r.turns.len(),
            started_at: r.started_at,
            finished_at: r.finished_at,
        }
    }
}

/// Finished records kept by [`SessionTable::new`].
pub const DEFAULT_RETAINED_SESSIONS: usize = 100;

/// Process-wide table of sessions. Each record is written only by its own controller run.
///
/// Running sessions are always present. Finished ones are kept up to `retain_finished`,
/// oldest-closed evicted first.
#[derive(Clone)]
pub struct SessionTable {
    records: Arc<DashMap<SessionId, SessionRecord>>,
    /// Finished ids in close order.
    finished: Arc<Mutex<VecDeque<SessionId>>>,
    retain_finished: usize,
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_SESSIONS)
    }
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            finished: Arc::new(Mutex::new(VecDeque::new())),
            retain_finished,
        }
    }

    pub fn retain_finished(&self) -> usize {
        self.retain_finished
    }

    /// Create the record for `id`. A second open of the same id is a no-op.
    pub fn open(&self, id: SessionId, target: &str) {
        self.records.entry(id).or_insert_with(|| SessionRecord {
            id,
            target: target.to_string(),
            status: SessionStatus::Running,
            steps: 0,
            started_at: Utc::now(),
            finished_at: None,
            turns: Vec::new(),
        });
    }

    pub fn push_turn(&self, id: SessionId, turn: Turn) {
        if let Some(mut record) = self.records.get_mut(&id) {
            record.turns.push(turn);
        }
    }

    pub fn set_steps(&self, id: SessionId, steps: u32) {
        if let Some(mut record) = self.records.get_mut(&id) {
            record.steps = steps;
        }
    }

    pub fn close(&self, id: SessionId, status: SessionStatus, steps: u32) {
        let newly_finished = match self.records.get_mut(&id) {
            Some(mut record) => {
                let first = record.finished_at.is_none();
                record.status = status;
                record.steps = steps;
                record.finished_at = Some(Utc::now());
                first
            }
            None => false,
        };
        if newly_finished {
            self.evict_beyond_retention(id);
        }
    }

    fn evict_beyond_retention(&self, closed: SessionId) {
        let mut finished = self.finished.lock();
        finished.push_back(closed);
        while finished.len() > self.retain_finished {
            if let Some(oldest) = finished.pop_front() {
                self.records.remove(&oldest);
            }
        }
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionRecord> {
        self.records.get(id).map(|r| r.clone())
    }

    /// Summaries, newest first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut out: Vec<SessionSummary> = self
            .records
            .iter()
            .map(|r| SessionSummary::from(r.value()))
            .collect();
        out.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        out
    }

    pub fn running(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == SessionStatus::Running)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
