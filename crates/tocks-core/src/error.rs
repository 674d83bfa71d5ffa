//! Chat store error types.

use thiserror::Error;

use crate::model::{ChatKey, MessageId};

/// Errors returned by [`crate::ChatStore`] operations.
///
/// Every variant describes an event that referenced state this session does
/// not know about. The dispatcher logs and drops such events; none of them is
/// fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatStoreError {
    /// Chat was never added or has been removed.
    #[error("unknown chat {0}")]
    UnknownChat(ChatKey),

    /// Message id not present in the chat.
    #[error("unknown message {message} in chat {chat}")]
    UnknownMessage {
        /// Chat that was searched
        chat: ChatKey,
        /// Missing message id
        message: MessageId,
    },
}

/// Errors returned by [`crate::split_message`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// Nothing to send.
    #[error("message is empty")]
    Empty,
}
