//! Dispatcher and session error types.

use thiserror::Error;
use tocks_core::{AccountId, ChatKey, ChatStoreError};

/// Reasons the dispatcher rejects an event.
///
/// A rejected event leaves state untouched. The session logs it and moves on
/// to the next event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Account is not logged in.
    #[error("unknown account {0}")]
    UnknownAccount(AccountId),

    /// Sent message has no text.
    #[error("empty message sent to {0}")]
    EmptyMessage(ChatKey),

    /// Event referenced a chat or message the store does not hold.
    #[error(transparent)]
    Store(#[from] ChatStoreError),
}

/// Errors returned by [`crate::Session`] and [`crate::SessionHandle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Inbound queue is at capacity.
    ///
    /// The event was not enqueued. Callers may retry later.
    #[error("event queue is full")]
    QueueOverflow,

    /// Session has shut down.
    #[error("session is closed")]
    Closed,

    /// A background task panicked or was cancelled.
    #[error("session task failed: {0}")]
    TaskFailed(String),
}
