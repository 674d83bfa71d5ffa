//! Core state for the Tocks messaging client.
//!
//! Pure, Sans-IO state machines for chat history, read tracking and
//! notification derivation. Nothing in this crate performs I/O or spawns
//! tasks: the single-writer dispatcher in `tocks-app` owns the mutable
//! instances and publishes the immutable snapshots defined here.
//!
//! # Components
//!
//! - [`ChatStore`]: append-only per-chat message logs and `last_message_time`
//! - [`MessageLog`]: chunked history shared between snapshots
//! - [`ReadStateTracker`]: monotonic per-chat `last_read_time` plus durable
//!   write bookkeeping
//! - [`aggregate`]: notification batching and body elision over snapshots
//! - [`split_message`]: cuts outgoing text to the network's message size
//! - [`ReadDebouncer`]: coalesces bursts of mark-read requests
//! - [`Environment`]: time abstraction shared by runtime and tests

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chat_store;
pub mod compose;
pub mod debounce;
pub mod env;
mod error;
pub mod message_log;
pub mod model;
pub mod notification;
pub mod read_state;

pub use chat_store::{AppendOutcome, ChatSnapshot, ChatStore, ChatStoreSnapshot};
pub use compose::{MAX_MESSAGE_LEN, split_message};
pub use debounce::ReadDebouncer;
pub use env::Environment;
pub use error::{ChatStoreError, ComposeError};
pub use message_log::MessageLog;
pub use model::{
    Account, AccountId, ChatId, ChatInfo, ChatKey, ChatPeer, GroupId, Message, MessageId,
    MessageKind, Status, Timestamp, UserId,
};
pub use notification::{
    AccountGroup, ChatUnread, ElisionUnit, NotificationBatch, NotificationConfig,
    NotificationInput, Visibility, aggregate,
};
pub use read_state::{MarkRead, PersistOutcome, ReadStateSnapshot, ReadStateTracker};
