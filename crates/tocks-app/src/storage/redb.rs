//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! Read times and messages survive restarts.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use tocks_core::{AccountId, ChatId, Message, MessageId, Timestamp};

use super::{HistoryQuery, Storage, StorageError};

/// Table: read_state
/// Key: (account: u64, chat: u64) as big-endian bytes [16 bytes]
/// Value: CBOR-encoded Timestamp
const READ_STATE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("read_state");

/// Table: messages
/// Key: (account: u64, chat: u64, message_id: u64) as big-endian bytes [24 bytes]
/// Value: CBOR-encoded Message
const MESSAGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("messages");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (READ_STATE, MESSAGES).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(READ_STATE).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(MESSAGES).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn persist_read_state(
        &self,
        account: AccountId,
        chat: ChatId,
        time: Timestamp,
    ) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut table =
                txn.open_table(READ_STATE).map_err(|e| StorageError::Io(e.to_string()))?;

            let key = encode_chat_key(account, chat);

            let current = match table
                .get(key.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?
            {
                Some(value) => Some(decode::<Timestamp>(value.value())?),
                None => None,
            };

            if current.is_some_and(|current| current >= time) {
                return Ok(());
            }

            let bytes = encode(&time)?;
            table
                .insert(key.as_slice(), bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn load_read_states(
        &self,
        account: AccountId,
    ) -> Result<Vec<(ChatId, Timestamp)>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(READ_STATE).map_err(|e| StorageError::Io(e.to_string()))?;

        let start_key = encode_chat_key(account, ChatId(0));
        let end_key = encode_chat_key(account, ChatId(u64::MAX));

        let results = table
            .range(start_key.as_slice()..=end_key.as_slice())
            .map_err(|e| StorageError::Io(e.to_string()))?;

        let mut states = Vec::new();
        for result in results {
            let (key, value) = result.map_err(|e| StorageError::Io(e.to_string()))?;
            let (_, chat) = decode_chat_key(key.value())?;
            states.push((chat, decode(value.value())?));
        }

        Ok(states)
    }

    fn persist_message(
        &self,
        account: AccountId,
        chat: ChatId,
        message: &Message,
    ) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;

        {
            let mut table =
                txn.open_table(MESSAGES).map_err(|e| StorageError::Io(e.to_string()))?;

            let bytes = encode(message)?;
            let key = encode_message_key(account, chat, message.id);
            table
                .insert(key.as_slice(), bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }

        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(())
    }

    fn load_messages(
        &self,
        account: AccountId,
        chat: ChatId,
        query: HistoryQuery,
    ) -> Result<Vec<Message>, StorageError> {
        let last = match query.before {
            Some(before) => match before.0.checked_sub(1) {
                Some(last) => MessageId(last),
                None => return Ok(Vec::new()),
            },
            None => MessageId(u64::MAX),
        };
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;

        let table = txn.open_table(MESSAGES).map_err(|e| StorageError::Io(e.to_string()))?;

        let start_key = encode_message_key(account, chat, MessageId(0));
        let end_key = encode_message_key(account, chat, last);

        let results = table
            .range(start_key.as_slice()..=end_key.as_slice())
            .map_err(|e| StorageError::Io(e.to_string()))?;

        // Newest first, so the scan stops once the limit is reached.
        let mut messages = Vec::new();
        for result in results.rev() {
            let (_, value) = result.map_err(|e| StorageError::Io(e.to_string()))?;
            let message: Message = decode(value.value())?;
            if message.timestamp > query.since {
                messages.push(message);
                if messages.len() == query.limit {
                    break;
                }
            }
        }

        messages.reverse();
        Ok(messages)
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Encode (account, chat) as 16-byte big-endian key.
///
/// Layout: [account: 8 bytes BE][chat: 8 bytes BE]
/// Lexicographic ordering matches numeric ordering, so one account's chats
/// form a contiguous range.
fn encode_chat_key(account: AccountId, chat: ChatId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&account.0.to_be_bytes());
    key[8..].copy_from_slice(&chat.0.to_be_bytes());
    key
}

/// Decode chat key back to (account, chat).
fn decode_chat_key(key: &[u8]) -> Result<(AccountId, ChatId), StorageError> {
    let (account, chat) = key
        .split_first_chunk::<8>()
        .and_then(|(account, rest)| rest.first_chunk::<8>().map(|chat| (account, chat)))
        .ok_or_else(|| StorageError::Serialization(format!("chat key has {} bytes", key.len())))?;
    Ok((AccountId(u64::from_be_bytes(*account)), ChatId(u64::from_be_bytes(*chat))))
}

/// Encode (account, chat, message_id) as 24-byte big-endian key.
///
/// Layout: [account: 8 bytes BE][chat: 8 bytes BE][message_id: 8 bytes BE]
fn encode_message_key(account: AccountId, chat: ChatId, id: MessageId) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..16].copy_from_slice(&encode_chat_key(account, chat));
    key[16..].copy_from_slice(&id.0.to_be_bytes());
    key
}
