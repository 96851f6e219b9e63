//! Notifier feed for the UI: a bounded in-memory ring of structured event
//! records, polled through `GET /events?since=`. Oldest entries fall off
//! once the ring is full; `seq` is a process-wide cursor so pollers can
//! resume where they left off.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TournamentCreated,
    PlayerJoined,
    TournamentStarted,
    ResultsSubmitted,
    GameStarted,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub seq: u64,
    pub identifier: EventKind,
    pub tournament_id: String,
    /// Unix milliseconds; the one wall-clock timestamp in the system,
    /// because external pollers correlate it with their own clocks.
    pub ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct NotifierInner {
    ring: VecDeque<EventRecord>,
    next_seq: u64,
}

#[derive(Debug)]
pub struct Notifier {
    inner: Mutex<NotifierInner>,
    capacity: usize,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(NotifierInner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn publish(
        &self,
        identifier: EventKind,
        tournament_id: &str,
        data: Option<serde_json::Value>,
    ) {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.next_seq += 1;
        let record = EventRecord {
            seq: inner.next_seq,
            identifier,
            tournament_id: tournament_id.to_string(),
            ts: chrono::Utc::now().timestamp_millis(),
            data,
        };
        tracing::debug!(
            seq = record.seq,
            identifier = ?record.identifier,
            tournament_id = %record.tournament_id,
            "publishing notifier event"
        );
        if inner.ring.len() == self.capacity {
            inner.ring.pop_front();
        }
        inner.ring.push_back(record);
    }

    /// Records with `seq > since`, oldest first.
    pub fn since(&self, since: u64) -> Vec<EventRecord> {
        let inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner
            .ring
            .iter()
            .filter(|record| record.seq > since)
            .cloned()
            .collect()
    }

    pub fn latest_seq(&self) -> u64 {
        match self.inner.lock() {
            Ok(inner) => inner.next_seq,
            Err(poisoned) => poisoned.into_inner().next_seq,
        }
    }
}
