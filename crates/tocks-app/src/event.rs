//! Dispatcher input events.
//!
//! This module defines [`Event`], the complete set of inputs that drive the
//! [`crate::Dispatcher`] state machine.
//!
//! Events originate from three sources:
//! - The network layer (messages, friends, presence).
//! - The UI layer (mark-read, visibility), usually through
//!   [`crate::UiBoundary`].
//! - Background tasks reporting completions (history loads, durable writes).

use tocks_core::{
    Account, AccountId, ChatId, ChatInfo, ChatKey, Message, MessageId, Status, Timestamp,
};

/// Events processed by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Message delivered by the network.
    MessageReceived {
        /// Receiving account.
        account: AccountId,
        /// Chat the message belongs to.
        chat: ChatId,
        /// Delivered message.
        message: Message,
    },

    /// Message sent by the local user.
    MessageSent {
        /// Sending account.
        account: AccountId,
        /// Chat the message was sent to.
        chat: ChatId,
        /// Sent message, usually incomplete until a receipt arrives.
        message: Message,
    },

    /// Delivery receipt or end of a streamed message.
    MessageCompleted {
        /// Owning account.
        account: AccountId,
        /// Chat holding the message.
        chat: ChatId,
        /// Completed message id.
        message: MessageId,
    },

    /// User has seen the chat up to `time`.
    ChatMarkedRead {
        /// Owning account.
        account: AccountId,
        /// Chat that was read.
        chat: ChatId,
        /// Read time.
        time: Timestamp,
    },

    /// Account came online with its chats and persisted read times.
    AccountLoggedIn {
        /// Account details.
        account: Account,
        /// Known chats. Keys are rewritten to this account.
        chats: Vec<ChatInfo>,
        /// Read times loaded from durable storage.
        last_read_times: Vec<(ChatId, Timestamp)>,
    },

    /// Account went away. Its chats and read state are dropped.
    AccountLoggedOut {
        /// Account to remove.
        account: AccountId,
    },

    /// First contact with a peer, or a new group.
    FriendAdded {
        /// Owning account.
        account: AccountId,
        /// Chat metadata. The key is rewritten to this account.
        chat: ChatInfo,
    },

    /// Friend removed or blocked.
    FriendRemoved {
        /// Owning account.
        account: AccountId,
        /// Chat to drop.
        chat: ChatId,
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

    /// Window visibility or active chat changed.
    VisibilityChanged {
        /// Whether the window is shown.
        window_visible: bool,
        /// Chat open in the window.
        active_chat: Option<ChatKey>,
    },

    /// User scrolled back and wants older messages of a chat.
    LoadMessages {
        /// Owning account.
        account: AccountId,
        /// Chat to load.
        chat: ChatId,
        /// Load messages older than this id. `None` starts from the oldest
        /// message the chat currently holds.
        before: Option<MessageId>,
        /// Most messages to load.
        limit: usize,
    },

    /// A chunk of history loaded from storage, either replayed after login
    /// or requested by [`Event::LoadMessages`].
    HistoryLoaded {
        /// Owning account.
        account: AccountId,
        /// Chat the messages belong to.
        chat: ChatId,
        /// Messages in id order. Empty when a page found nothing older.
        messages: Vec<Message>,
    },

    /// Storage confirmed a read-state write.
    ReadStatePersisted {
        /// Owning account.
        account: AccountId,
        /// Chat that was written.
        chat: ChatId,
        /// Value now durable.
        time: Timestamp,
    },

    /// A read-state write failed after every retry.
    PersistenceFailed {
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
}

impl Event {
    /// Chat the event targets, if it targets exactly one.
    pub fn chat_key(&self) -> Option<ChatKey> {
        match self {
            Self::MessageReceived { account, chat, .. }
            | Self::MessageSent { account, chat, .. }
            | Self::MessageCompleted { account, chat, .. }
            | Self::ChatMarkedRead { account, chat, .. }
            | Self::FriendRemoved { account, chat }
            | Self::PresenceChanged { account, chat, .. }
            | Self::LoadMessages { account, chat, .. }
            | Self::HistoryLoaded { account, chat, .. }
            | Self::ReadStatePersisted { account, chat, .. }
            | Self::PersistenceFailed { account, chat, .. } => Some(ChatKey::new(*account, *chat)),
            Self::FriendAdded { account, chat } => Some(ChatKey::new(*account, chat.key.chat)),
            Self::AccountLoggedIn { .. }
            | Self::AccountLoggedOut { .. }
            | Self::VisibilityChanged { .. } => None,
        }
    }
}
