//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations to exercise the writer's
//! retry and degradation paths.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use tocks_core::{AccountId, ChatId, Message, Timestamp};

use super::{HistoryQuery, Storage, StorageError};

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation but fails operations
/// with probability `failure_rate`. The RNG is seeded, so a given seed always
/// fails the same calls.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Operations attempted, including failed ones
    operation_count: Arc<AtomicUsize>,
}

/// Linear congruential generator; fast and reproducible.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Wrap `inner` with the default seed.
    ///
    /// `failure_rate` is clamped to [0.0, 1.0].
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying storage (for checking state after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Count the operation and decide whether it fails.
    fn inject(&self) -> Result<(), StorageError> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);
        let roll = self.rng.lock().unwrap_or_else(PoisonError::into_inner).next();
        if roll < self.failure_rate {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn persist_read_state(
        &self,
        account: AccountId,
        chat: ChatId,
        time: Timestamp,
    ) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.persist_read_state(account, chat, time)
    }

    fn load_read_states(
        &self,
        account: AccountId,
    ) -> Result<Vec<(ChatId, Timestamp)>, StorageError> {
        self.inject()?;
        self.inner.load_read_states(account)
    }

    fn persist_message(
        &self,
        account: AccountId,
        chat: ChatId,
        message: &Message,
    ) -> Result<(), StorageError> {
        self.inject()?;
        self.inner.persist_message(account, chat, message)
    }

    fn load_messages(
        &self,
        account: AccountId,
        chat: ChatId,
        query: HistoryQuery,
    ) -> Result<Vec<Message>, StorageError> {
        self.inject()?;
        self.inner.load_messages(account, chat, query)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::storage::MemoryStorage;

    fn ts(secs: i64) -> Timestamp {
        chrono::Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn zero_failure_rate_never_fails() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 0.0);

        for i in 0..100 {
            chaotic.persist_read_state(AccountId(1), ChatId(1), ts(i)).expect("no failures at 0%");
        }

        assert_eq!(chaotic.inner().read_state_writes().len(), 100);
        assert_eq!(chaotic.operation_count(), 100);
    }

    #[test]
    fn full_failure_rate_always_fails() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.0);

        assert!(chaotic.persist_read_state(AccountId(1), ChatId(1), ts(1)).is_err());
        assert!(chaotic.load_read_states(AccountId(1)).is_err());
        assert!(chaotic.load_messages(AccountId(1), ChatId(1), HistoryQuery::unread(ts(0), 10)).is_err());
        assert!(chaotic.inner().read_state_writes().is_empty());
    }

    #[test]
    fn same_seed_fails_same_calls() {
        let a = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);
        let b = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);

        for i in 0..100 {
            let ra = a.persist_read_state(AccountId(1), ChatId(1), ts(i));
            let rb = b.persist_read_state(AccountId(1), ChatId(1), ts(i));
            assert_eq!(ra.is_ok(), rb.is_ok(), "determinism violated at iteration {i}");
        }
    }

    #[test]
    fn failure_rate_is_clamped() {
        let chaotic = ChaoticStorage::new(MemoryStorage::new(), 1.5);
        assert!(chaotic.persist_read_state(AccountId(1), ChatId(1), ts(1)).is_err());
    }
}
