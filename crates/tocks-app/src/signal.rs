//! Dispatcher output signals.
//!
//! [`Signal`]s are the instructions and notifications produced by the
//! [`crate::Dispatcher`]. The session routes persistence and history signals
//! to its background tasks and broadcasts every signal to subscribers.

use tocks_core::{AccountId, ChatId, Message, MessageId, NotificationBatch, Status, Timestamp};

/// Signals produced by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Unread count of a chat changed.
    UnreadCountChanged {
        /// Owning account.
        account: AccountId,
        /// Chat whose count changed.
        chat: ChatId,
        /// New count.
        count: usize,
    },

    /// Show or replace the desktop notification.
    NotificationRequested(NotificationBatch),

    /// Everything the notification summarised has been read.
    NotificationDismissed,

    /// Write a read time to durable storage.
    PersistReadState {
        /// Owning account.
        account: AccountId,
        /// Chat that was read.
        chat: ChatId,
        /// Read time.
        time: Timestamp,
    },

    /// Write a message to durable storage.
    PersistMessage {
        /// Owning account.
        account: AccountId,
        /// Chat holding the message.
        chat: ChatId,
        /// Message to store or update.
        message: Message,
    },

    /// Replay stored messages newer than `since`.
    LoadHistory {
        /// Owning account.
        account: AccountId,
        /// Chat to replay.
        chat: ChatId,
        /// Read time at login.
        since: Timestamp,
    },

    /// Load a page of stored messages older than `before`.
    LoadPage {
        /// Owning account.
        account: AccountId,
        /// Chat to load.
        chat: ChatId,
        /// Upper bound, exclusive. `None` for the newest messages.
        before: Option<MessageId>,
        /// Most messages to load.
        limit: usize,
    },

    /// Stored messages were merged into a chat.
    MessagesLoaded {
        /// Owning account.
        account: AccountId,
        /// Chat that received them.
        chat: ChatId,
        /// Ids that were not already present, in id order.
        messages: Vec<MessageId>,
    },

    /// A read time could not be persisted after every retry.
    PersistenceDegraded {
        /// Owning account.
        account: AccountId,
        /// Chat that was being written.
        chat: ChatId,
        /// Value that could not be written.
        time: Timestamp,
        /// Attempts made.
        attempts: u32,
        /// Last storage error.
        reason: String,
    },

    /// Peer presence changed.
    PresenceChanged {
        /// Owning account.
        account: AccountId,
        /// Chat with the peer.
        chat: ChatId,
        /// New presence.
        status: Status,
    },

    /// A new message was received.
    MessageArrived {
        /// Owning account.
        account: AccountId,
        /// Chat holding the message.
        chat: ChatId,
        /// Message timestamp.
        timestamp: Timestamp,
        /// Chat was open in a visible window when the message was stored.
        foreground: bool,
    },
}
