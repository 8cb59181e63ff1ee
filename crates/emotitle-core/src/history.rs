use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::topology::{PaneKey, TabKey};

pub const HISTORY_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventType {
    TabAdded,
    TabRemoved,
    TabKeyUpdated,
    TabRenamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventLogEntry {
    pub seq: u64,
    pub event_type: EventType,
    pub tab_key: TabKey,
    pub pane_keys: Vec<PaneKey>,
    /// Tab position when the change was observed.
    pub internal_index: usize,
    pub timestamp: DateTime<Utc>,
}

/// Bounded structural-change log. Entries are immutable once recorded and
/// the oldest ones fall off the front when capacity is reached.
#[derive(Debug)]
pub struct EventHistory {
    entries: VecDeque<EventLogEntry>,
    capacity: usize,
    next_seq: u64,
}

impl Default for EventHistory {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl EventHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 1,
        }
    }

    pub fn record(
        &mut self,
        event_type: EventType,
        tab_key: TabKey,
        pane_keys: Vec<PaneKey>,
        internal_index: usize,
        now: DateTime<Utc>,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(EventLogEntry {
            seq,
            event_type,
            tab_key,
            pane_keys,
            internal_index,
            timestamp: now,
        });
        seq
    }

    pub fn dump(&self) -> Vec<EventLogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
