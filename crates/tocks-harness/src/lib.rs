//! Invariant harness for tocks state testing.
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all event sequences,
//! not specific scenarios. Capture a [`StateSnapshot`] after every event and
//! run [`InvariantRegistry::standard()`] against it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;

pub use invariants::{
    ChatState, Invariant, InvariantRegistry, InvariantResult, MessagesSortedUnique,
    ReadHistory, ReadTimeMonotonicity, ShownNotificationHasUnread, StateSnapshot,
    UnreadMatchesTimestamps, UnreadOffScreenIsNotified, Violation,
};
