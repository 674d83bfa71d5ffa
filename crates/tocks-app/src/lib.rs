//! Application layer for tocks
//!
//! The single-writer event dispatcher and the async machinery around it.
//!
//! # Components
//!
//! - [`Dispatcher`]: Sans-IO state machine that owns chat and read state
//! - [`Session`]: runtime that queues events, publishes snapshots and signals
//! - [`UiBoundary`]: UI-facing task owning the mark-read debounce timer
//! - [`PersistWriter`]: background durable writes with coalescing and retry
//! - [`HistoryLoader`]: login catch-up replayed in chunks
//! - [`Storage`]: durable-storage contract with memory, chaotic and redb
//!   implementations

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod boundary;
mod config;
mod dispatcher;
mod error;
mod event;
mod loader;
mod runtime;
mod signal;
mod storage;
mod system_env;
mod writer;

pub use boundary::{UiBoundary, UiHandle, UiInput};
pub use config::{RetryPolicy, SessionConfig};
pub use dispatcher::{Dispatcher, SessionSnapshot};
pub use error::{DispatchError, SessionError};
pub use event::Event;
pub use loader::{HistoryLoader, LoadRequest, login_event};
pub use runtime::{Session, SessionHandle};
pub use signal::Signal;
pub use storage::{
    ChaoticStorage, HistoryQuery, MemoryStorage, RedbStorage, Storage, StorageError,
};
pub use system_env::SystemEnv;
pub use writer::{PersistWriter, WriteRequest};
