use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tocks_core::{AccountId, ChatId, ChatKey, Message, MessageId, Timestamp};

use super::{HistoryQuery, Storage, StorageError};

/// In-memory storage implementation for testing and simulation
///
/// Keeps everything in ordered maps behind an `Arc<Mutex<>>` so clones share
/// state. Besides the stored values it records every read-state write it
/// accepted, which lets tests count durable writes.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Default)]
struct MemoryStorageInner {
    /// Latest read time per chat
    read_states: BTreeMap<ChatKey, Timestamp>,

    /// Messages per chat, keyed by id
    messages: BTreeMap<ChatKey, BTreeMap<MessageId, Message>>,

    /// Every accepted read-state write, in call order
    read_state_log: Vec<(ChatKey, Timestamp)>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read-state write accepted so far, in call order.
    pub fn read_state_writes(&self) -> Vec<(ChatKey, Timestamp)> {
        self.lock().read_state_log.clone()
    }

    /// Stored read time of `key`.
    pub fn read_state(&self, key: ChatKey) -> Option<Timestamp> {
        self.lock().read_states.get(&key).copied()
    }

    /// Number of messages stored for `key`.
    pub fn message_count(&self, key: ChatKey) -> usize {
        self.lock().messages.get(&key).map_or(0, BTreeMap::len)
    }

    /// Stored message `id` of `key`.
    pub fn message(&self, key: ChatKey, id: MessageId) -> Option<Message> {
        self.lock().messages.get(&key).and_then(|m| m.get(&id)).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStorageInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn persist_read_state(
        &self,
        account: AccountId,
        chat: ChatId,
        time: Timestamp,
    ) -> Result<(), StorageError> {
        let key = ChatKey::new(account, chat);
        let mut inner = self.lock();
        inner.read_state_log.push((key, time));
        inner.read_states.entry(key).and_modify(|t| *t = (*t).max(time)).or_insert(time);
        Ok(())
    }

    fn load_read_states(
        &self,
        account: AccountId,
    ) -> Result<Vec<(ChatId, Timestamp)>, StorageError> {
        let inner = self.lock();
        Ok(inner
            .read_states
            .iter()
            .filter(|(key, _)| key.account == account)
            .map(|(key, time)| (key.chat, *time))
            .collect())
    }

    fn persist_message(
        &self,
        account: AccountId,
        chat: ChatId,
        message: &Message,
    ) -> Result<(), StorageError> {
        let key = ChatKey::new(account, chat);
        self.lock().messages.entry(key).or_default().insert(message.id, message.clone());
        Ok(())
    }

    fn load_messages(
        &self,
        account: AccountId,
        chat: ChatId,
        query: HistoryQuery,
    ) -> Result<Vec<Message>, StorageError> {
        let key = ChatKey::new(account, chat);
        let inner = self.lock();
        let Some(messages) = inner.messages.get(&key) else {
            return Ok(Vec::new());
        };

        let mut loaded: Vec<Message> = messages
            .values()
            .rev()
            .filter(|m| query.matches(m))
            .take(query.limit)
            .cloned()
            .collect();
        loaded.reverse();
        Ok(loaded)
    }
}
