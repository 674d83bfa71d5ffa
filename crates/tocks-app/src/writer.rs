//! Background durable writes.
//!
//! The [`PersistWriter`] task receives [`WriteRequest`]s routed from
//! dispatcher signals and executes them against [`Storage`] off the
//! dispatcher's path. Completions flow back into the session as events.
//!
//! # Coalescing
//!
//! Queued read-state writes are kept per chat and only the latest time is
//! written. While a failed write waits out its backoff, newer requests keep
//! arriving; if a later time for the same chat shows up the retry is
//! abandoned in favour of it.

use std::collections::{BTreeMap, VecDeque};

use tocks_core::{ChatKey, Environment, Message, Timestamp};
use tokio::sync::mpsc;

use crate::{Event, RetryPolicy, SessionHandle, Storage, StorageError};

/// A durable write requested by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    /// Persist a read time.
    ReadState {
        /// Chat that was read.
        key: ChatKey,
        /// Read time.
        time: Timestamp,
    },
    /// Persist or update a message.
    Message {
        /// Chat holding the message.
        key: ChatKey,
        /// Message to store.
        message: Message,
    },
}

/// Background task executing durable writes with retry.
pub struct PersistWriter<S: Storage, E: Environment> {
    storage: S,
    env: E,
    retry: RetryPolicy,
    events: SessionHandle,
    inbox: mpsc::UnboundedReceiver<WriteRequest>,
    read_states: BTreeMap<ChatKey, Timestamp>,
    messages: VecDeque<(ChatKey, Message)>,
}

impl<S: Storage, E: Environment> PersistWriter<S, E> {
    /// Writer reporting completions to `events`.
    pub fn new(
        storage: S,
        env: E,
        retry: RetryPolicy,
        events: SessionHandle,
        inbox: mpsc::UnboundedReceiver<WriteRequest>,
    ) -> Self {
        Self {
            storage,
            env,
            retry,
            events,
            inbox,
            read_states: BTreeMap::new(),
            messages: VecDeque::new(),
        }
    }

    /// Run until the inbox closes and every queued write has been attempted.
    pub async fn run(mut self) {
        loop {
            if self.is_idle() {
                match self.inbox.recv().await {
                    Some(request) => self.enqueue(request),
                    None => break,
                }
            }
            self.drain_inbox();

            // Messages first: a read time may cover messages still queued.
            if let Some((key, message)) = self.messages.pop_front() {
                self.write_message(key, message).await;
            } else if let Some((key, time)) = self.read_states.pop_first() {
                self.write_read_state(key, time).await;
            }
        }

        tracing::debug!("persist writer stopped");
    }

    fn is_idle(&self) -> bool {
        self.messages.is_empty() && self.read_states.is_empty()
    }

    fn enqueue(&mut self, request: WriteRequest) {
        match request {
            WriteRequest::ReadState { key, time } => {
                self.read_states.entry(key).and_modify(|t| *t = (*t).max(time)).or_insert(time);
            },
            WriteRequest::Message { key, message } => self.messages.push_back((key, message)),
        }
    }

    fn drain_inbox(&mut self) {
        while let Ok(request) = self.inbox.try_recv() {
            self.enqueue(request);
        }
    }

    async fn write_read_state(&mut self, key: ChatKey, time: Timestamp) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.storage.persist_read_state(key.account, key.chat, time) {
                Ok(()) => {
                    let event =
                        Event::ReadStatePersisted { account: key.account, chat: key.chat, time };
                    report(&self.events, event).await;
                    return;
                },
                Err(error) => error,
            };

            if attempt >= self.retry.max_attempts {
                tracing::warn!(%key, %time, attempt, %error, "giving up on read state write");
                let event = Event::PersistenceFailed {
                    account: key.account,
                    chat: key.chat,
                    time,
                    attempts: attempt,
                    reason: error.to_string(),
                };
                report(&self.events, event).await;
                return;
            }

            self.backoff(attempt, &error).await;
            if let Some(newer) = self.read_states.get(&key).filter(|newer| **newer > time) {
                tracing::debug!(%key, %time, %newer, "retry superseded by newer read time");
                return;
            }
        }
    }

    async fn write_message(&mut self, key: ChatKey, message: Message) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.storage.persist_message(key.account, key.chat, &message) {
                Ok(()) => return,
                Err(error) => error,
            };

            if attempt >= self.retry.max_attempts {
                tracing::warn!(%key, message = %message.id, attempt, %error, "dropping message write");
                return;
            }
            self.backoff(attempt, &error).await;
        }
    }

    /// Wait out the backoff for `attempt`, then pick up anything queued
    /// meanwhile.
    async fn backoff(&mut self, attempt: u32, error: &StorageError) {
        let delay = self.retry.backoff(attempt);
        tracing::debug!(attempt, ?delay, %error, "storage write failed, retrying");
        self.env.sleep(delay).await;
        self.drain_inbox();
    }
}

async fn report(events: &SessionHandle, event: Event) {
    if events.send(event).await.is_err() {
        tracing::trace!("session closed before write completion was reported");
    }
}
