//! Per-chat read timestamps.
//!
//! The in-memory value is authoritative for the session and moves forward
//! only. Alongside it the tracker remembers, per chat, the latest value handed
//! to durable storage and the latest value storage confirmed, so completions
//! of superseded writes can be recognised and ignored.

use std::{collections::BTreeMap, sync::Arc};

use crate::model::{AccountId, ChatKey, Timestamp};

/// Result of [`ReadStateTracker::mark_read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkRead {
    /// The read time moved forward. A durable write is due.
    Advanced {
        /// Previous read time, `None` if the chat had never been read
        previous: Option<Timestamp>,
    },
    /// Same as the current read time.
    Unchanged,
    /// Older than the current read time; ignored.
    Stale {
        /// Current read time
        current: Timestamp,
    },
}

impl MarkRead {
    /// Whether the read time moved forward.
    pub fn advanced(self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

/// Result of [`ReadStateTracker::persisted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Storage now holds the latest requested value.
    Current,
    /// A newer value was requested after this write was issued.
    Superseded {
        /// Latest requested value
        latest: Timestamp,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct DurableState {
    /// Latest value handed to storage.
    requested: Option<Timestamp>,
    /// Latest value storage confirmed.
    durable: Option<Timestamp>,
}

/// Immutable view of every read time.
#[derive(Debug, Clone, Default)]
pub struct ReadStateSnapshot {
    times: Arc<BTreeMap<ChatKey, Timestamp>>,
}

impl ReadStateSnapshot {
    /// Read time of `key`, or the minimum timestamp if never read.
    pub fn last_read(&self, key: ChatKey) -> Timestamp {
        self.get(key).unwrap_or(Timestamp::MIN_UTC)
    }

    /// Read time of `key`, `None` if never read.
    pub fn get(&self, key: ChatKey) -> Option<Timestamp> {
        self.times.get(&key).copied()
    }

    /// All recorded read times.
    pub fn iter(&self) -> impl Iterator<Item = (ChatKey, Timestamp)> + '_ {
        self.times.iter().map(|(k, t)| (*k, *t))
    }
}

/// Read timestamps per chat. Mutated only by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct ReadStateTracker {
    times: Arc<BTreeMap<ChatKey, Timestamp>>,
    durable: BTreeMap<ChatKey, DurableState>,
}

impl ReadStateTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the user has seen `key` up to `time`.
    ///
    /// # Invariants
    ///
    /// - Post: the read time of `key` never decreases
    /// - Post: on `Advanced`, `time` is the latest requested durable value
    pub fn mark_read(&mut self, key: ChatKey, time: Timestamp) -> MarkRead {
        let current = self.times.get(&key).copied();
        match current {
            Some(current) if time < current => MarkRead::Stale { current },
            Some(current) if time == current => MarkRead::Unchanged,
            previous => {
                Arc::make_mut(&mut self.times).insert(key, time);
                self.durable.entry(key).or_default().requested = Some(time);
                MarkRead::Advanced { previous }
            },
        }
    }

    /// Merge a value loaded from durable storage.
    ///
    /// The value is already durable, so no write is requested. An in-memory
    /// value that is ahead wins. Returns `true` if the read time moved.
    pub fn load(&mut self, key: ChatKey, time: Timestamp) -> bool {
        let state = self.durable.entry(key).or_default();
        state.durable = Some(state.durable.map_or(time, |d| d.max(time)));

        match self.times.get(&key) {
            Some(current) if *current >= time => false,
            _ => {
                Arc::make_mut(&mut self.times).insert(key, time);
                true
            },
        }
    }

    /// Record that storage confirmed `time` for `key`.
    pub fn persisted(&mut self, key: ChatKey, time: Timestamp) -> PersistOutcome {
        let state = self.durable.entry(key).or_default();
        state.durable = Some(state.durable.map_or(time, |d| d.max(time)));

        match state.requested {
            Some(latest) if latest > time => PersistOutcome::Superseded { latest },
            _ => PersistOutcome::Current,
        }
    }

    /// Whether a requested value has not been confirmed by storage yet.
    pub fn is_pending(&self, key: ChatKey) -> bool {
        self.durable.get(&key).is_some_and(|s| match (s.requested, s.durable) {
            (Some(requested), Some(durable)) => requested > durable,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }

    /// Latest value storage confirmed for `key`.
    pub fn durable(&self, key: ChatKey) -> Option<Timestamp> {
        self.durable.get(&key).and_then(|s| s.durable)
    }

    /// In-memory read time of `key`.
    pub fn last_read(&self, key: ChatKey) -> Option<Timestamp> {
        self.times.get(&key).copied()
    }

    /// Forget `key`.
    pub fn remove_chat(&mut self, key: ChatKey) {
        if self.times.contains_key(&key) {
            Arc::make_mut(&mut self.times).remove(&key);
        }
        self.durable.remove(&key);
    }

    /// Forget every chat owned by `account`.
    pub fn remove_account(&mut self, account: AccountId) {
        if self.times.keys().any(|k| k.account == account) {
            Arc::make_mut(&mut self.times).retain(|k, _| k.account != account);
        }
        self.durable.retain(|k, _| k.account != account);
    }

    /// Immutable view of every read time.
    pub fn snapshot(&self) -> ReadStateSnapshot {
        ReadStateSnapshot { times: Arc::clone(&self.times) }
    }
}
