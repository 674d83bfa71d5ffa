//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture chat, read and notification state at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use std::collections::BTreeMap;

use tocks_core::{
    Account, AccountId, ChatKey, ChatStoreSnapshot, MessageId, NotificationBatch,
    ReadStateSnapshot, Timestamp, Visibility,
};

/// Read times observed for each chat, in observation order.
///
/// A chat whose read state disappears (removed chat, logged-out account)
/// starts a fresh history if it comes back.
#[derive(Debug, Clone, Default)]
pub struct ReadHistory {
    history: BTreeMap<ChatKey, Vec<Timestamp>>,
}

impl ReadHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the read times in `reads`.
    pub fn record(&mut self, reads: &ReadStateSnapshot) {
        self.history.retain(|key, _| reads.get(*key).is_some());
        for (key, time) in reads.iter() {
            let seen = self.history.entry(key).or_default();
            if seen.last() != Some(&time) {
                seen.push(time);
            }
        }
    }

    /// Observed read times of `key`.
    pub fn of(&self, key: ChatKey) -> &[Timestamp] {
        self.history.get(&key).map_or(&[], Vec::as_slice)
    }
}

/// Snapshot of the observable state.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    /// Per-chat state.
    pub chats: BTreeMap<ChatKey, ChatState>,
    /// Read time history per chat (for monotonicity checks).
    pub read_history: BTreeMap<ChatKey, Vec<Timestamp>>,
    /// Chats listed by the notification currently shown. `None` if nothing
    /// is shown.
    pub notified_chats: Option<Vec<ChatKey>>,
}

impl StateSnapshot {
    /// Create an empty snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture chat, read and notification state.
    pub fn capture(
        accounts: &BTreeMap<AccountId, Account>,
        chats: &ChatStoreSnapshot,
        reads: &ReadStateSnapshot,
        visibility: Visibility,
        notification: Option<&NotificationBatch>,
        history: &ReadHistory,
    ) -> Self {
        let chats: BTreeMap<ChatKey, ChatState> = chats
            .chats()
            .map(|chat| {
                let key = chat.key();
                let last_read_time = reads.last_read(key);
                let user = accounts.get(&key.account).map(|a| a.user);
                let state = ChatState {
                    message_ids: chat.messages().iter().map(|m| m.id).collect(),
                    last_message_time: chat.last_message_time(),
                    last_read_time,
                    unread_count: chat.unread_count(last_read_time),
                    unread: chat.is_unread(last_read_time),
                    notifiable_unread: chat
                        .unread_since(last_read_time)
                        .filter(|m| Some(m.sender) != user)
                        .count(),
                    on_screen: visibility.suppresses(key),
                };
                (key, state)
            })
            .collect();

        let read_history =
            history.history.iter().map(|(key, times)| (*key, times.clone())).collect();

        let notified_chats = notification.map(|batch| {
            batch.groups.iter().flat_map(|g| g.chats.iter().map(|c| c.key)).collect()
        });

        Self { chats, read_history, notified_chats }
    }

    /// Add a chat.
    #[must_use]
    pub fn with_chat(mut self, key: ChatKey, chat: ChatState) -> Self {
        self.chats.insert(key, chat);
        self
    }

    /// Set the chats listed by the shown notification.
    #[must_use]
    pub fn with_notification(mut self, chats: impl IntoIterator<Item = ChatKey>) -> Self {
        self.notified_chats = Some(chats.into_iter().collect());
        self
    }

    /// Record a read time observation.
    pub fn record_read(&mut self, key: ChatKey, time: Timestamp) {
        self.read_history.entry(key).or_default().push(time);
    }
}

/// Observable state of one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatState {
    /// Message ids in display order.
    pub message_ids: Vec<MessageId>,
    /// Latest message timestamp.
    pub last_message_time: Option<Timestamp>,
    /// Read time, minimum timestamp if never read.
    pub last_read_time: Timestamp,
    /// Messages newer than the read time.
    pub unread_count: usize,
    /// Unread flag as reported to the UI.
    pub unread: bool,
    /// Unread messages sent by someone other than the account's user.
    pub notifiable_unread: usize,
    /// Chat is open in a visible window.
    pub on_screen: bool,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            message_ids: Vec::new(),
            last_message_time: None,
            last_read_time: Timestamp::MIN_UTC,
            unread_count: 0,
            unread: false,
            notifiable_unread: 0,
            on_screen: false,
        }
    }
}
