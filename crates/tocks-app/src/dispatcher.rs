//! Single-writer dispatcher.
//!
//! This module defines the [`Dispatcher`] state machine, the only owner of
//! mutable chat and read state. It consumes [`Event`]s one at a time and
//! produces [`Signal`]s for the runtime to route. It performs no I/O, so the
//! same code runs under the async [`crate::Session`] and in plain unit tests.
//!
//! # Responsibilities
//!
//! - Applies network, UI and completion events to the chat store and read
//!   tracker. An event that fails validation changes nothing.
//! - Reports unread-count changes for every chat an event touched.
//! - Requests a notification when a newly stored message is notifiable or a
//!   visibility change uncovers unread messages, and dismisses it once
//!   nothing it summarised is unread.
//! - Requests durable writes for read times and live messages.
//! - Requests pages of stored history and reports which messages a load
//!   added.

use std::{collections::BTreeMap, sync::Arc};

use tocks_core::{
    Account, AccountId, AppendOutcome, ChatId, ChatInfo, ChatKey, ChatSnapshot, ChatStore,
    ChatStoreError, ChatStoreSnapshot, MarkRead, Message, MessageId, NotificationBatch,
    NotificationConfig, NotificationInput, PersistOutcome, ReadStateSnapshot, ReadStateTracker,
    Status, Timestamp, Visibility, aggregate,
};

use crate::{DispatchError, Event, Signal};

/// Immutable view of session state, published after every event.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    accounts: Arc<BTreeMap<AccountId, Account>>,
    chats: ChatStoreSnapshot,
    reads: ReadStateSnapshot,
    visibility: Visibility,
    notification: Option<NotificationBatch>,
}

impl SessionSnapshot {
    /// Logged-in accounts.
    pub fn accounts(&self) -> &BTreeMap<AccountId, Account> {
        &self.accounts
    }

    /// Chat histories.
    pub fn chats(&self) -> &ChatStoreSnapshot {
        &self.chats
    }

    /// Read times.
    pub fn reads(&self) -> &ReadStateSnapshot {
        &self.reads
    }

    /// Window state.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Notification currently shown, if any.
    pub fn notification(&self) -> Option<&NotificationBatch> {
        self.notification.as_ref()
    }

    /// Read time of `key`, minimum timestamp if never read.
    pub fn last_read(&self, key: ChatKey) -> Timestamp {
        self.reads.last_read(key)
    }

    /// Messages in `key` newer than its read time.
    pub fn unread_count(&self, key: ChatKey) -> usize {
        self.chats.chat(key).map_or(0, |chat| chat.unread_count(self.last_read(key)))
    }

    /// Whether `key` has a message newer than its read time.
    pub fn is_unread(&self, key: ChatKey) -> bool {
        self.chats.chat(key).is_some_and(|chat| chat.is_unread(self.last_read(key)))
    }
}

/// Single-writer state machine.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    accounts: Arc<BTreeMap<AccountId, Account>>,
    chats: ChatStore,
    reads: ReadStateTracker,
    visibility: Visibility,
    config: NotificationConfig,
    /// Last batch handed to the notification service.
    showing: Option<NotificationBatch>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(NotificationConfig::default())
    }
}

impl Dispatcher {
    /// Dispatcher with no accounts.
    pub fn new(config: NotificationConfig) -> Self {
        Self {
            accounts: Arc::new(BTreeMap::new()),
            chats: ChatStore::new(),
            reads: ReadStateTracker::new(),
            visibility: Visibility::default(),
            config,
            showing: None,
        }
    }

    /// Apply one event and return the signals it produced.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the event references an account or chat
    /// that is not known. State is unchanged in that case.
    pub fn handle(&mut self, event: Event) -> Result<Vec<Signal>, DispatchError> {
        let before: Vec<(ChatKey, usize)> =
            self.touched_chats(&event).into_iter().map(|k| (k, self.unread_count(k))).collect();

        let mut signals = Vec::new();
        let mut arrivals = Vec::new();
        let revealed = matches!(event, Event::VisibilityChanged { .. });

        match event {
            Event::MessageReceived { account, chat, message } => {
                let key = ChatKey::new(account, chat);
                self.message_received(key, message, &mut signals, &mut arrivals)?;
            },
            Event::MessageSent { account, chat, message } => {
                self.message_sent(ChatKey::new(account, chat), message, &mut signals)?;
            },
            Event::MessageCompleted { account, chat, message } => {
                self.message_completed(ChatKey::new(account, chat), message, &mut signals)?;
            },
            Event::ChatMarkedRead { account, chat, time } => {
                self.chat_marked_read(ChatKey::new(account, chat), time, &mut signals)?;
            },
            Event::AccountLoggedIn { account, chats, last_read_times } => {
                self.account_logged_in(account, chats, last_read_times, &mut signals);
            },
            Event::AccountLoggedOut { account } => self.account_logged_out(account)?,
            Event::FriendAdded { account, chat } => self.friend_added(account, chat)?,
            Event::FriendRemoved { account, chat } => {
                self.friend_removed(ChatKey::new(account, chat))?;
            },
            Event::PresenceChanged { account, chat, status } => {
                self.presence_changed(ChatKey::new(account, chat), status, &mut signals)?;
            },
            Event::VisibilityChanged { window_visible, active_chat } => {
                self.visibility = Visibility { window_visible, active_chat };
            },
            Event::LoadMessages { account, chat, before, limit } => {
                let key = ChatKey::new(account, chat);
                self.load_messages(key, before, limit, &mut signals)?;
            },
            Event::HistoryLoaded { account, chat, messages } => {
                let key = ChatKey::new(account, chat);
                self.history_loaded(key, messages, &mut signals, &mut arrivals)?;
            },
            Event::ReadStatePersisted { account, chat, time } => {
                self.read_state_persisted(ChatKey::new(account, chat), time);
            },
            Event::PersistenceFailed { account, chat, time, attempts, reason } => {
                tracing::warn!(%account, %chat, %time, attempts, %reason, "read state not persisted");
                signals.push(Signal::PersistenceDegraded { account, chat, time, attempts, reason });
            },
        }

        for (key, previous) in before {
            let count = self.unread_count(key);
            if count != previous {
                signals.push(Signal::UnreadCountChanged {
                    account: key.account,
                    chat: key.chat,
                    count,
                });
            }
        }

        self.refresh_notification(&arrivals, revealed, &mut signals);
        Ok(signals)
    }

    /// Immutable view of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            accounts: Arc::clone(&self.accounts),
            chats: self.chats.snapshot(),
            reads: self.reads.snapshot(),
            visibility: self.visibility,
            notification: self.showing.clone(),
        }
    }

    /// Logged-in accounts.
    pub fn accounts(&self) -> &BTreeMap<AccountId, Account> {
        &self.accounts
    }

    /// Chat store.
    pub fn chats(&self) -> &ChatStore {
        &self.chats
    }

    /// Read tracker.
    pub fn reads(&self) -> &ReadStateTracker {
        &self.reads
    }

    /// Window state.
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Notification currently shown, if any.
    pub fn notification(&self) -> Option<&NotificationBatch> {
        self.showing.as_ref()
    }

    /// Messages in `key` newer than its read time.
    pub fn unread_count(&self, key: ChatKey) -> usize {
        let since = self.reads.last_read(key).unwrap_or(Timestamp::MIN_UTC);
        self.chats.chat(key).map_or(0, |chat| chat.unread_count(since))
    }

    fn message_received(
        &mut self,
        key: ChatKey,
        message: Message,
        signals: &mut Vec<Signal>,
        arrivals: &mut Vec<(ChatKey, MessageId)>,
    ) -> Result<(), DispatchError> {
        self.require_account(key.account)?;
        let (id, timestamp) = (message.id, message.timestamp);

        let outcome = self.chats.append(key, message.clone())?;
        match outcome {
            AppendOutcome::Duplicate => {
                tracing::debug!(%key, message = %id, "duplicate message ignored");
                return Ok(());
            },
            AppendOutcome::OutOfOrder { latest } => {
                tracing::warn!(%key, message = %id, %latest, "message arrived out of order");
            },
            AppendOutcome::Appended => {},
        }

        arrivals.push((key, id));
        let foreground = self.visibility.suppresses(key);
        signals.push(Signal::PersistMessage { account: key.account, chat: key.chat, message });
        signals.push(Signal::MessageArrived {
            account: key.account,
            chat: key.chat,
            timestamp,
            foreground,
        });
        Ok(())
    }

    fn message_sent(
        &mut self,
        key: ChatKey,
        message: Message,
        signals: &mut Vec<Signal>,
    ) -> Result<(), DispatchError> {
        self.require_account(key.account)?;
        if message.body.is_empty() {
            return Err(DispatchError::EmptyMessage(key));
        }
        let timestamp = message.timestamp;

        if self.chats.append(key, message.clone())?.is_stored() {
            signals.push(Signal::PersistMessage { account: key.account, chat: key.chat, message });
        }

        self.mark_read(key, timestamp, signals);
        Ok(())
    }

    fn message_completed(
        &mut self,
        key: ChatKey,
        id: MessageId,
        signals: &mut Vec<Signal>,
    ) -> Result<(), DispatchError> {
        self.require_account(key.account)?;
        if !self.chats.complete(key, id)? {
            return Ok(());
        }

        if let Some(message) = self.chats.chat(key).and_then(|c| c.message(id).cloned()) {
            signals.push(Signal::PersistMessage { account: key.account, chat: key.chat, message });
        }
        Ok(())
    }

    fn chat_marked_read(
        &mut self,
        key: ChatKey,
        time: Timestamp,
        signals: &mut Vec<Signal>,
    ) -> Result<(), DispatchError> {
        self.require_chat(key)?;
        self.mark_read(key, time, signals);
        Ok(())
    }

    fn mark_read(&mut self, key: ChatKey, time: Timestamp, signals: &mut Vec<Signal>) {
        match self.reads.mark_read(key, time) {
            MarkRead::Advanced { .. } => {
                signals.push(Signal::PersistReadState {
                    account: key.account,
                    chat: key.chat,
                    time,
                });
            },
            MarkRead::Unchanged => {},
            MarkRead::Stale { current } => {
                tracing::debug!(%key, %time, %current, "stale mark-read ignored");
            },
        }
    }

    fn account_logged_in(
        &mut self,
        account: Account,
        chats: Vec<ChatInfo>,
        last_read_times: Vec<(ChatId, Timestamp)>,
        signals: &mut Vec<Signal>,
    ) {
        let id = account.id;
        Arc::make_mut(&mut self.accounts).insert(id, account);

        for mut info in chats {
            info.key.account = id;
            self.chats.upsert_chat(info);
        }

        for (chat, time) in last_read_times {
            let key = ChatKey::new(id, chat);
            if self.chats.contains(key) {
                self.reads.load(key, time);
            } else {
                tracing::debug!(%key, "read time for unknown chat skipped");
            }
        }

        let snapshot = self.chats.snapshot();
        let mut count = 0;
        for chat in snapshot.for_account(id) {
            let key = chat.key();
            let since = self.reads.last_read(key).unwrap_or(Timestamp::MIN_UTC);
            signals.push(Signal::LoadHistory { account: id, chat: key.chat, since });
            count += 1;
        }

        tracing::info!(account = %id, chats = count, "account logged in");
    }

    fn account_logged_out(&mut self, account: AccountId) -> Result<(), DispatchError> {
        self.require_account(account)?;

        let removed = self.chats.remove_account(account);
        self.reads.remove_account(account);
        Arc::make_mut(&mut self.accounts).remove(&account);

        tracing::info!(%account, chats = removed.len(), "account logged out");
        Ok(())
    }

    fn friend_added(&mut self, account: AccountId, mut info: ChatInfo) -> Result<(), DispatchError> {
        self.require_account(account)?;
        info.key.account = account;
        let key = info.key;

        if self.chats.upsert_chat(info) {
            tracing::debug!(%key, "chat added");
        }
        Ok(())
    }

    fn friend_removed(&mut self, key: ChatKey) -> Result<(), DispatchError> {
        self.require_account(key.account)?;
        if !self.chats.remove_chat(key) {
            return Err(ChatStoreError::UnknownChat(key).into());
        }
        self.reads.remove_chat(key);
        tracing::debug!(%key, "chat removed");
        Ok(())
    }

    fn presence_changed(
        &mut self,
        key: ChatKey,
        status: Status,
        signals: &mut Vec<Signal>,
    ) -> Result<(), DispatchError> {
        self.require_account(key.account)?;
        if self.chats.set_presence(key, status)? {
            signals.push(Signal::PresenceChanged { account: key.account, chat: key.chat, status });
        }
        Ok(())
    }

    fn load_messages(
        &mut self,
        key: ChatKey,
        before: Option<MessageId>,
        limit: usize,
        signals: &mut Vec<Signal>,
    ) -> Result<(), DispatchError> {
        self.require_account(key.account)?;
        let chat = self.chats.chat(key).ok_or(ChatStoreError::UnknownChat(key))?;
        let before = before.or_else(|| chat.messages().first().map(|m| m.id));

        tracing::debug!(%key, ?before, limit, "older messages requested");
        signals.push(Signal::LoadPage { account: key.account, chat: key.chat, before, limit });
        Ok(())
    }

    fn history_loaded(
        &mut self,
        key: ChatKey,
        messages: Vec<Message>,
        signals: &mut Vec<Signal>,
        arrivals: &mut Vec<(ChatKey, MessageId)>,
    ) -> Result<(), DispatchError> {
        self.require_account(key.account)?;
        self.require_chat(key)?;

        let offered = messages.len();
        let mut stored = self.chats.extend(key, messages)?;
        stored.sort_unstable();
        let duplicates = offered - stored.len();
        tracing::debug!(%key, stored = stored.len(), duplicates, "history loaded");

        arrivals.extend(stored.iter().map(|id| (key, *id)));
        signals.push(Signal::MessagesLoaded {
            account: key.account,
            chat: key.chat,
            messages: stored,
        });
        Ok(())
    }

    fn read_state_persisted(&mut self, key: ChatKey, time: Timestamp) {
        if !self.chats.contains(key) {
            tracing::debug!(%key, "write completed for removed chat");
            return;
        }

        match self.reads.persisted(key, time) {
            PersistOutcome::Current => tracing::trace!(%key, %time, "read state durable"),
            PersistOutcome::Superseded { latest } => {
                tracing::debug!(%key, %time, %latest, "superseded write completed");
            },
        }
    }

    /// Keep the shown notification in step with unread state.
    ///
    /// A batch is requested when it includes a fresh arrival, or when
    /// `revealed` and it includes a message the shown batch did not.
    fn refresh_notification(
        &mut self,
        arrivals: &[(ChatKey, MessageId)],
        revealed: bool,
        signals: &mut Vec<Signal>,
    ) {
        if arrivals.is_empty() && !revealed && self.showing.is_none() {
            return;
        }

        let chats = self.chats.snapshot();
        let reads = self.reads.snapshot();
        let input = NotificationInput {
            accounts: self.accounts.as_ref(),
            chats: &chats,
            reads: &reads,
            visibility: &self.visibility,
        };

        match aggregate(&input, &self.config) {
            None => {
                if self.showing.take().is_some() {
                    signals.push(Signal::NotificationDismissed);
                }
            },
            Some(batch) => {
                let fresh = arrivals.iter().any(|(key, id)| batch.contains(*key, *id));
                let uncovered = revealed
                    && batch.messages().any(|(key, id)| {
                        self.showing.as_ref().is_none_or(|shown| !shown.contains(key, id))
                    });
                if fresh || uncovered {
                    signals.push(Signal::NotificationRequested(batch.clone()));
                    self.showing = Some(batch);
                } else if self.showing.is_some() {
                    self.showing = Some(batch);
                }
            },
        }
    }

    fn touched_chats(&self, event: &Event) -> Vec<ChatKey> {
        match event {
            Event::AccountLoggedIn { account, chats, .. } => {
                let mut keys: Vec<ChatKey> = self.account_chats(account.id);
                keys.extend(chats.iter().map(|c| ChatKey::new(account.id, c.key.chat)));
                keys.sort_unstable();
                keys.dedup();
                keys
            },
            Event::AccountLoggedOut { account } => self.account_chats(*account),
            other => other.chat_key().into_iter().collect(),
        }
    }

    fn account_chats(&self, account: AccountId) -> Vec<ChatKey> {
        self.chats.snapshot().for_account(account).map(ChatSnapshot::key).collect()
    }

    fn require_account(&self, account: AccountId) -> Result<(), DispatchError> {
        if self.accounts.contains_key(&account) {
            Ok(())
        } else {
            Err(DispatchError::UnknownAccount(account))
        }
    }

    fn require_chat(&self, key: ChatKey) -> Result<(), DispatchError> {
        if self.chats.contains(key) {
            Ok(())
        } else {
            Err(ChatStoreError::UnknownChat(key).into())
        }
    }
}
