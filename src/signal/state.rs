use std::collections::VecDeque;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use super::types::{AnalysisResult, LogEntry};

/// Bounded, newest-first log of past results.
#[derive(Debug, Clone)]
pub struct SignalHistory {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl SignalHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the head and evict from the tail past capacity.
    /// Returns the id assigned to the new entry.
    pub fn push(&mut self, result: AnalysisResult) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.entries.push_front(LogEntry {
            id: id.clone(),
            result,
        });
        self.entries.truncate(self.capacity);
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Latest displayed result, the history log and the active-hold window.
///
/// The hold deadline is kept as a tokio `Instant` so the scanner can sleep
/// until it and tests can drive it with a paused clock.
pub struct SignalState {
    latest: Option<AnalysisResult>,
    history: SignalHistory,
    hold: Duration,
    active_until: Option<Instant>,
}

impl SignalState {
    pub fn new(history_capacity: usize, hold: Duration) -> Self {
        Self {
            latest: None,
            history: SignalHistory::new(history_capacity),
            hold,
            active_until: None,
        }
    }

    pub fn record_result(&mut self, result: AnalysisResult) -> String {
        let id = self.history.push(result);
        debug!("📝 History entry {} ({} / {})", id, self.history.len(), self.history.capacity());
        id
    }

    pub fn set_latest(&mut self, result: AnalysisResult) {
        self.latest = Some(result);
    }

    /// Start the hold window. Returns the instant at which it ends.
    pub fn activate_signal(&mut self, now: Instant) -> Instant {
        let until = now + self.hold;
        self.active_until = Some(until);
        info!("🔒 Signal hold started ({} ms)", self.hold.as_millis());
        until
    }

    pub fn deactivate_signal(&mut self) {
        if self.active_until.take().is_some() {
            info!("🔓 Signal hold released");
        }
        self.latest = None;
    }

    /// Deactivate once `now` has reached the hold deadline.
    /// Returns true if the hold ended on this call.
    pub fn expire_if_due(&mut self, now: Instant) -> bool {
        match self.active_until {
            Some(until) if now >= until => {
                self.deactivate_signal();
                true
            }
            _ => false,
        }
    }

    pub fn is_signal_active(&self) -> bool {
        self.active_until.is_some()
    }

    pub fn active_until(&self) -> Option<Instant> {
        self.active_until
    }

    pub fn latest(&self) -> Option<&AnalysisResult> {
        self.latest.as_ref()
    }

    pub fn history(&self) -> &SignalHistory {
        &self.history
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }
}
