//! Invariant checking for state-machine testing.
//!
//! Invariants are properties that must always hold during system execution.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify behavioral properties across all possible event sequences.
//!
//! # Architecture
//!
//! Observable chat, read and notification state is extracted into a
//! [`StateSnapshot`], then registered [`Invariant`] checks run against it.
//! Read times are tracked across snapshots by a [`ReadHistory`] so that
//! monotonicity can be checked.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! history.record(snapshot.reads());
//! let state = StateSnapshot::capture(
//!     snapshot.accounts(),
//!     snapshot.chats(),
//!     snapshot.reads(),
//!     snapshot.visibility(),
//!     snapshot.notification(),
//!     &history,
//! );
//! registry.check_all(&state)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    MessagesSortedUnique, ReadTimeMonotonicity, ShownNotificationHasUnread,
    UnreadMatchesTimestamps, UnreadOffScreenIsNotified,
};
pub use snapshot::{ChatState, ReadHistory, StateSnapshot};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against captured state.
///
/// Invariants are behavioral properties that must always hold.
/// They capture WHAT must be true, not specific test scenarios.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &StateSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
///
/// Use [`InvariantRegistry::standard()`] for the chat/read/notification
/// invariants.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard invariants.
    ///
    /// Includes:
    /// - [`ReadTimeMonotonicity`]: read times never decrease
    /// - [`UnreadMatchesTimestamps`]: unread iff `last_message_time > last_read_time`
    /// - [`MessagesSortedUnique`]: message ids strictly increasing per chat
    /// - [`ShownNotificationHasUnread`]: a shown notification only lists
    ///   unread chats
    /// - [`UnreadOffScreenIsNotified`]: unread peer messages outside the
    ///   visible chat are always notified
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(ReadTimeMonotonicity);
        registry.add(UnreadMatchesTimestamps);
        registry.add(MessagesSortedUnique);
        registry.add(ShownNotificationHasUnread);
        registry.add(UnreadOffScreenIsNotified);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &StateSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation found.
    ///
    /// Use this in tests where you want immediate failure with context.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &StateSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            tracing::error!(context, violations = messages.len(), "invariant violated");
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
