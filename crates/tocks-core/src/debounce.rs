//! Mark-read debouncing.
//!
//! UI initialisation and message bursts produce many mark-read requests for
//! the same chat in quick succession. [`ReadDebouncer`] coalesces them: each
//! request restarts the chat's quiet period, and when the period elapses a
//! single value carrying the latest timestamp is released. A chat that keeps
//! receiving requests is still released once `max_delay` has passed since its
//! first pending request.
//!
//! This is a pure state machine over an abstract instant type, so the same
//! code runs against the tokio clock and against virtual time in tests.

use std::{collections::BTreeMap, ops::Add, time::Duration};

use crate::model::{ChatKey, Timestamp};

#[derive(Debug, Clone, Copy)]
struct Pending<I> {
    time: Timestamp,
    first_seen: I,
    deadline: I,
}

/// Coalesces mark-read requests per chat.
#[derive(Debug, Clone)]
pub struct ReadDebouncer<I> {
    window: Duration,
    max_delay: Duration,
    pending: BTreeMap<ChatKey, Pending<I>>,
}

impl<I> ReadDebouncer<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Debouncer with the given quiet period, capped at four periods.
    pub fn new(window: Duration) -> Self {
        Self::with_max_delay(window, window.saturating_mul(4))
    }

    /// Debouncer with an explicit upper bound on how long a chat may stay
    /// pending.
    pub fn with_max_delay(window: Duration, max_delay: Duration) -> Self {
        Self { window, max_delay: max_delay.max(window), pending: BTreeMap::new() }
    }

    /// Record a mark-read request observed at `now`.
    pub fn observe(&mut self, key: ChatKey, time: Timestamp, now: I) {
        let window = self.window;
        let max_delay = self.max_delay;
        self.pending
            .entry(key)
            .and_modify(|p| {
                p.time = p.time.max(time);
                p.deadline = (now + window).min(p.first_seen + max_delay);
            })
            .or_insert(Pending { time, first_seen: now, deadline: now + window });
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<I> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Release every chat whose deadline is at or before `now`.
    pub fn poll(&mut self, now: I) -> Vec<(ChatKey, Timestamp)> {
        let due: Vec<ChatKey> =
            self.pending.iter().filter(|(_, p)| p.deadline <= now).map(|(k, _)| *k).collect();

        due.into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|p| (key, p.time)))
            .collect()
    }

    /// Release everything regardless of deadlines.
    pub fn flush(&mut self) -> Vec<(ChatKey, Timestamp)> {
        std::mem::take(&mut self.pending).into_iter().map(|(k, p)| (k, p.time)).collect()
    }

    /// Number of chats waiting for their quiet period.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{AccountId, ChatId};

    /// Milliseconds since an arbitrary origin.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Tick(u64);

    impl Add<Duration> for Tick {
        type Output = Tick;

        fn add(self, rhs: Duration) -> Tick {
            Tick(self.0 + rhs.as_millis() as u64)
        }
    }

    fn ts(secs: i64) -> Timestamp {
        chrono::Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn key(chat: u64) -> ChatKey {
        ChatKey::new(AccountId(1), ChatId(chat))
    }

    #[test]
    fn burst_collapses_to_latest() {
        let mut debouncer = ReadDebouncer::new(Duration::from_millis(300));
        debouncer.observe(key(1), ts(5), Tick(0));
        debouncer.observe(key(1), ts(9), Tick(100));
        debouncer.observe(key(1), ts(7), Tick(200));

        assert!(debouncer.poll(Tick(400)).is_empty());
        assert_eq!(debouncer.poll(Tick(500)), vec![(key(1), ts(9))]);
        assert_eq!(debouncer.pending_len(), 0);
    }

    #[test]
    fn chats_debounce_independently() {
        let mut debouncer = ReadDebouncer::new(Duration::from_millis(300));
        debouncer.observe(key(1), ts(1), Tick(0));
        debouncer.observe(key(2), ts(2), Tick(200));

        assert_eq!(debouncer.next_deadline(), Some(Tick(300)));
        assert_eq!(debouncer.poll(Tick(300)), vec![(key(1), ts(1))]);
        assert_eq!(debouncer.poll(Tick(500)), vec![(key(2), ts(2))]);
    }

    #[test]
    fn continuous_requests_release_at_max_delay() {
        let mut debouncer =
            ReadDebouncer::with_max_delay(Duration::from_millis(300), Duration::from_millis(1000));
        for step in 0..20 {
            debouncer.observe(key(1), ts(step), Tick(step as u64 * 100));
        }

        assert_eq!(debouncer.next_deadline(), Some(Tick(1000)));
    }

    #[test]
    fn flush_releases_everything() {
        let mut debouncer = ReadDebouncer::new(Duration::from_millis(300));
        debouncer.observe(key(1), ts(1), Tick(0));
        debouncer.observe(key(2), ts(2), Tick(0));

        assert_eq!(debouncer.flush().len(), 2);
        assert_eq!(debouncer.next_deadline(), None);
    }
}
