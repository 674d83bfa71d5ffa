//! Durable storage for read times and messages
//!
//! Trait-based abstraction over the persistence layer. The trait is
//! synchronous (no async); the writer and loader tasks call it from their own
//! tasks so the dispatcher never waits on storage.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
use tocks_core::{AccountId, ChatId, Message, MessageId, Timestamp};

pub use self::redb::RedbStorage;

/// Selects stored messages of one chat.
///
/// Matches messages with a timestamp strictly after `since` and an id below
/// `before`, and keeps the `limit` matches with the highest ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Only messages newer than this.
    pub since: Timestamp,
    /// Only messages with a lower id. `None` for no upper bound.
    pub before: Option<MessageId>,
    /// Most messages returned.
    pub limit: usize,
}

impl HistoryQuery {
    /// The latest `limit` messages newer than `since`.
    pub fn unread(since: Timestamp, limit: usize) -> Self {
        Self { since, before: None, limit }
    }

    /// The `limit` messages just below `before`, whatever their age.
    pub fn page(before: Option<MessageId>, limit: usize) -> Self {
        Self { since: Timestamp::MIN_UTC, before, limit }
    }

    /// Whether `message` passes the time and id bounds.
    pub fn matches(&self, message: &Message) -> bool {
        message.timestamp > self.since && self.before.is_none_or(|before| message.id < before)
    }
}

/// Storage abstraction for read times and message history
///
/// Must be Clone (shared by the writer and loader tasks), Send + Sync, and
/// synchronous. Implementations share internal state via Arc, so clones
/// access the same underlying storage.
///
/// Every write is idempotent: repeating it after a failure or a crash leaves
/// the same state as writing it once.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Record that `chat` was read up to `time`.
    ///
    /// # Invariants
    ///
    /// - Post: the stored value is the maximum of the previous value and
    ///   `time`, so reordered writes never move it backwards
    fn persist_read_state(
        &self,
        account: AccountId,
        chat: ChatId,
        time: Timestamp,
    ) -> Result<(), StorageError>;

    /// All read times stored for `account`, in chat id order.
    fn load_read_states(&self, account: AccountId)
    -> Result<Vec<(ChatId, Timestamp)>, StorageError>;

    /// Store a message, replacing any stored message with the same id.
    fn persist_message(
        &self,
        account: AccountId,
        chat: ChatId,
        message: &Message,
    ) -> Result<(), StorageError>;

    /// Messages of `chat` selected by `query`, in id order.
    ///
    /// # Invariants
    ///
    /// - Post: at most `query.limit` messages, the highest matching ids
    fn load_messages(
        &self,
        account: AccountId,
        chat: ChatId,
        query: HistoryQuery,
    ) -> Result<Vec<Message>, StorageError>;
}
