//! Append-only per-chat message logs.
//!
//! Messages are kept sorted by [`MessageId`], which is the display order. A
//! message whose id is lower than one already stored arrived out of order: it
//! is still inserted at its id position and flagged. Replaying a message with
//! an id that is already present changes nothing.
//!
//! Storage is copy-on-write. [`ChatStore::snapshot`] hands out `Arc` clones,
//! and the next mutation clones whatever a reader still holds, so a published
//! snapshot is never modified in place. Histories live in a [`MessageLog`],
//! so that clone is one chunk, not the whole chat.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    error::ChatStoreError,
    message_log::MessageLog,
    model::{AccountId, ChatId, ChatInfo, ChatKey, Message, MessageId, Status, Timestamp},
};

/// Result of [`ChatStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Stored after every existing message.
    Appended,
    /// Stored, but its id is lower than the latest id in the chat. The
    /// message is flagged and displayed at its id position.
    OutOfOrder {
        /// Highest id stored when the message arrived
        latest: MessageId,
    },
    /// A message with this id is already stored. Nothing changed.
    Duplicate,
}

impl AppendOutcome {
    /// Whether the message was stored.
    pub fn is_stored(self) -> bool {
        !matches!(self, Self::Duplicate)
    }
}

/// Immutable view of one chat.
#[derive(Debug, Clone)]
pub struct ChatSnapshot {
    info: Arc<ChatInfo>,
    messages: MessageLog,
    out_of_order: Arc<BTreeSet<MessageId>>,
    last_message_time: Option<Timestamp>,
}

impl ChatSnapshot {
    fn new(info: ChatInfo) -> Self {
        Self {
            info: Arc::new(info),
            messages: MessageLog::new(),
            out_of_order: Arc::new(BTreeSet::new()),
            last_message_time: None,
        }
    }

    /// Chat metadata.
    pub fn info(&self) -> &ChatInfo {
        &self.info
    }

    /// Chat key.
    pub fn key(&self) -> ChatKey {
        self.info.key
    }

    /// Messages in id order.
    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    /// Latest timestamp of any stored message. `None` for an empty chat.
    ///
    /// This is a maximum, not the timestamp of the last message by id:
    /// network delivery can be out of order by wall clock.
    pub fn last_message_time(&self) -> Option<Timestamp> {
        self.last_message_time
    }

    /// Whether `id` arrived after a higher id.
    pub fn is_out_of_order(&self, id: MessageId) -> bool {
        self.out_of_order.contains(&id)
    }

    /// Look up a message by id.
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    /// Messages with a timestamp strictly after `since`, in id order.
    pub fn unread_since(&self, since: Timestamp) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().filter(move |m| m.timestamp > since)
    }

    /// Number of messages with a timestamp strictly after `since`.
    ///
    /// Non-zero exactly when `last_message_time > since`.
    pub fn unread_count(&self, since: Timestamp) -> usize {
        self.unread_since(since).count()
    }

    /// Whether `last_message_time > since`.
    pub fn is_unread(&self, since: Timestamp) -> bool {
        self.last_message_time.is_some_and(|t| t > since)
    }

    fn append(&mut self, message: Message) -> AppendOutcome {
        let (id, timestamp) = (message.id, message.timestamp);
        let outcome = match self.messages.last() {
            Some(latest) if latest.id > id => AppendOutcome::OutOfOrder { latest: latest.id },
            _ => AppendOutcome::Appended,
        };

        if !self.messages.insert(message) {
            return AppendOutcome::Duplicate;
        }
        if matches!(outcome, AppendOutcome::OutOfOrder { .. }) {
            Arc::make_mut(&mut self.out_of_order).insert(id);
        }
        self.last_message_time = Some(self.last_message_time.map_or(timestamp, |t| t.max(timestamp)));

        outcome
    }
}

/// Immutable view of every chat, ordered by [`ChatKey`].
#[derive(Debug, Clone, Default)]
pub struct ChatStoreSnapshot {
    chats: Arc<BTreeMap<ChatKey, ChatSnapshot>>,
}

impl ChatStoreSnapshot {
    /// Snapshot of one chat.
    pub fn chat(&self, key: ChatKey) -> Option<&ChatSnapshot> {
        self.chats.get(&key)
    }

    /// All chats.
    pub fn chats(&self) -> impl Iterator<Item = &ChatSnapshot> + '_ {
        self.chats.values()
    }

    /// Chats owned by `account`, in chat id order.
    pub fn for_account(&self, account: AccountId) -> impl Iterator<Item = &ChatSnapshot> + '_ {
        let start = ChatKey::new(account, ChatId(0));
        let end = ChatKey::new(account, ChatId(u64::MAX));
        self.chats.range(start..=end).map(|(_, chat)| chat)
    }

    /// Number of chats.
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    /// Whether no chat is known.
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }
}

/// Per-chat message logs. Mutated only by the dispatcher.
#[derive(Debug, Clone, Default)]
pub struct ChatStore {
    chats: Arc<BTreeMap<ChatKey, ChatSnapshot>>,
}

impl ChatStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chat, or refresh the metadata of an existing one.
    ///
    /// Existing history is kept. Returns `true` if the chat is new.
    pub fn upsert_chat(&mut self, info: ChatInfo) -> bool {
        let chats = Arc::make_mut(&mut self.chats);
        match chats.get_mut(&info.key) {
            Some(chat) => {
                if *chat.info != info {
                    chat.info = Arc::new(info);
                }
                false
            },
            None => {
                chats.insert(info.key, ChatSnapshot::new(info));
                true
            },
        }
    }

    /// Whether `key` is known.
    pub fn contains(&self, key: ChatKey) -> bool {
        self.chats.contains_key(&key)
    }

    /// Append a message to a chat.
    ///
    /// # Invariants
    ///
    /// - Post: messages stay sorted by id with no duplicate ids
    /// - Post: `last_message_time` is the maximum stored timestamp
    pub fn append(&mut self, key: ChatKey, message: Message) -> Result<AppendOutcome, ChatStoreError> {
        let chat = self.chat_mut(key)?;
        Ok(chat.append(message))
    }

    /// Append a batch of messages, as replayed from history.
    ///
    /// Returns the ids that were stored; duplicates are skipped.
    pub fn extend(
        &mut self,
        key: ChatKey,
        messages: impl IntoIterator<Item = Message>,
    ) -> Result<Vec<MessageId>, ChatStoreError> {
        let chat = self.chat_mut(key)?;
        let stored = messages
            .into_iter()
            .filter_map(|message| {
                let id = message.id;
                chat.append(message).is_stored().then_some(id)
            })
            .collect();
        Ok(stored)
    }

    /// Mark a message complete. Returns `true` if it was incomplete.
    pub fn complete(&mut self, key: ChatKey, id: MessageId) -> Result<bool, ChatStoreError> {
        let current = self.chats.get(&key).ok_or(ChatStoreError::UnknownChat(key))?;
        let message = current
            .messages
            .get(id)
            .ok_or(ChatStoreError::UnknownMessage { chat: key, message: id })?;
        if message.complete {
            return Ok(false);
        }

        let chat = self.chat_mut(key)?;
        if let Some(message) = chat.messages.get_mut(id) {
            message.complete = true;
        }
        Ok(true)
    }

    /// Update a peer's presence. Returns `true` if it changed.
    pub fn set_presence(&mut self, key: ChatKey, status: Status) -> Result<bool, ChatStoreError> {
        let current = self.chats.get(&key).ok_or(ChatStoreError::UnknownChat(key))?;
        if current.info.presence == status {
            return Ok(false);
        }

        let chat = self.chat_mut(key)?;
        Arc::make_mut(&mut chat.info).presence = status;
        Ok(true)
    }

    /// Remove a chat and its history. Returns `true` if it existed.
    pub fn remove_chat(&mut self, key: ChatKey) -> bool {
        if !self.chats.contains_key(&key) {
            return false;
        }
        Arc::make_mut(&mut self.chats).remove(&key).is_some()
    }

    /// Remove every chat owned by `account`. Returns the removed keys.
    pub fn remove_account(&mut self, account: AccountId) -> Vec<ChatKey> {
        let keys: Vec<ChatKey> =
            self.snapshot().for_account(account).map(ChatSnapshot::key).collect();
        if !keys.is_empty() {
            let chats = Arc::make_mut(&mut self.chats);
            for key in &keys {
                chats.remove(key);
            }
        }
        keys
    }

    /// Immutable view of one chat.
    pub fn chat(&self, key: ChatKey) -> Option<ChatSnapshot> {
        self.chats.get(&key).cloned()
    }

    /// Immutable view of every chat.
    pub fn snapshot(&self) -> ChatStoreSnapshot {
        ChatStoreSnapshot { chats: Arc::clone(&self.chats) }
    }

    fn chat_mut(&mut self, key: ChatKey) -> Result<&mut ChatSnapshot, ChatStoreError> {
        if !self.chats.contains_key(&key) {
            return Err(ChatStoreError::UnknownChat(key));
        }
        Arc::make_mut(&mut self.chats).get_mut(&key).ok_or(ChatStoreError::UnknownChat(key))
    }
}
