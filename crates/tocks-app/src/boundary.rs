//! UI-facing task.
//!
//! The [`UiBoundary`] sits between the UI and the dispatcher. It owns the
//! mark-read debounce timer and the visibility input channel, and applies
//! the foreground rule: a message the dispatcher stored while its chat was
//! open in a visible window is marked read immediately, bypassing the
//! debounce.
//!
//! History page requests pass straight through to the dispatcher.
//!
//! The UI talks to it through a cloneable [`UiHandle`].

use std::sync::Arc;

use tocks_core::{ChatKey, Environment, MessageId, ReadDebouncer, Timestamp};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::{Event, SessionError, SessionHandle, SessionSnapshot, Signal};

/// Inputs accepted from the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiInput {
    /// User has seen `key` up to `time`. Debounced.
    MarkRead {
        /// Chat that was viewed.
        key: ChatKey,
        /// Latest message time on screen.
        time: Timestamp,
    },
    /// Window shown, hidden or switched to another chat.
    Visibility {
        /// Whether the window is shown.
        window_visible: bool,
        /// Chat open in the window.
        active_chat: Option<ChatKey>,
    },
    /// User scrolled back past the oldest loaded message.
    LoadMessages {
        /// Chat being scrolled.
        key: ChatKey,
        /// Load messages older than this id. `None` for older than the
        /// oldest loaded message.
        before: Option<MessageId>,
        /// Most messages to load.
        limit: usize,
    },
}

/// Cloneable UI-side handle to the boundary task.
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiInput>,
}

impl UiHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<UiInput>) -> Self {
        Self { tx }
    }

    /// Request that `key` be marked read up to `time`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] once the session has shut down.
    pub fn mark_read(&self, key: ChatKey, time: Timestamp) -> Result<(), SessionError> {
        self.send(UiInput::MarkRead { key, time })
    }

    /// Report window visibility and the active chat.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] once the session has shut down.
    pub fn set_visibility(
        &self,
        window_visible: bool,
        active_chat: Option<ChatKey>,
    ) -> Result<(), SessionError> {
        self.send(UiInput::Visibility { window_visible, active_chat })
    }

    /// Ask for up to `limit` messages of `key` older than `before`.
    ///
    /// The result arrives as [`Signal::MessagesLoaded`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] once the session has shut down.
    pub fn load_messages(
        &self,
        key: ChatKey,
        before: Option<MessageId>,
        limit: usize,
    ) -> Result<(), SessionError> {
        self.send(UiInput::LoadMessages { key, before, limit })
    }

    /// Forward a raw input.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] once the session has shut down.
    pub fn send(&self, input: UiInput) -> Result<(), SessionError> {
        self.tx.send(input).map_err(|_| SessionError::Closed)
    }
}

/// Task owning the debounce timer and the foreground rule.
pub struct UiBoundary<E: Environment> {
    env: E,
    debouncer: ReadDebouncer<E::Instant>,
    events: SessionHandle,
    inputs: mpsc::UnboundedReceiver<UiInput>,
    signals: broadcast::Receiver<Signal>,
    snapshots: watch::Receiver<Arc<SessionSnapshot>>,
}

impl<E: Environment> UiBoundary<E> {
    /// Boundary submitting coalesced events to `events`.
    pub fn new(
        env: E,
        debouncer: ReadDebouncer<E::Instant>,
        events: SessionHandle,
        inputs: mpsc::UnboundedReceiver<UiInput>,
        signals: broadcast::Receiver<Signal>,
        snapshots: watch::Receiver<Arc<SessionSnapshot>>,
    ) -> Self {
        Self { env, debouncer, events, inputs, signals, snapshots }
    }

    /// Run until `stop` fires or every UI handle is dropped, then flush
    /// pending mark-reads.
    pub async fn run(mut self, mut stop: oneshot::Receiver<()>) {
        loop {
            let deadline = self.debouncer.next_deadline();
            tokio::select! {
                _ = &mut stop => break,
                input = self.inputs.recv() => match input {
                    Some(input) => self.on_input(input).await,
                    None => break,
                },
                signal = self.signals.recv() => match signal {
                    Ok(signal) => self.on_signal(signal).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "ui boundary lagged behind signals");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                () = wait_until(&self.env, deadline) => {
                    let due = self.debouncer.poll(self.env.now());
                    self.submit_reads(due).await;
                },
            }
        }

        let pending = self.debouncer.flush();
        tracing::debug!(pending = pending.len(), "ui boundary stopping");
        self.submit_reads(pending).await;
    }

    async fn on_input(&mut self, input: UiInput) {
        match input {
            UiInput::MarkRead { key, time } => {
                self.debouncer.observe(key, time, self.env.now());
            },
            UiInput::Visibility { window_visible, active_chat } => {
                submit(&self.events, Event::VisibilityChanged { window_visible, active_chat }).await;

                let Some(key) = active_chat.filter(|_| window_visible) else {
                    return;
                };
                let latest = {
                    let snapshot = self.snapshots.borrow();
                    snapshot
                        .chats()
                        .chat(key)
                        .filter(|_| snapshot.is_unread(key))
                        .and_then(|chat| chat.last_message_time())
                };
                if let Some(time) = latest {
                    self.debouncer.observe(key, time, self.env.now());
                }
            },
            UiInput::LoadMessages { key, before, limit } => {
                let event =
                    Event::LoadMessages { account: key.account, chat: key.chat, before, limit };
                submit(&self.events, event).await;
            },
        }
    }

    async fn on_signal(&mut self, signal: Signal) {
        if let Signal::MessageArrived { account, chat, timestamp, foreground: true } = signal {
            let key = ChatKey::new(account, chat);
            tracing::trace!(%key, "message arrived in foreground chat");
            submit(&self.events, Event::ChatMarkedRead { account, chat, time: timestamp }).await;
        }
    }

    async fn submit_reads(&mut self, reads: Vec<(ChatKey, Timestamp)>) {
        for (key, time) in reads {
            let event = Event::ChatMarkedRead { account: key.account, chat: key.chat, time };
            submit(&self.events, event).await;
        }
    }
}

async fn submit(events: &SessionHandle, event: Event) {
    if events.send(event).await.is_err() {
        tracing::debug!("session closed, ui event dropped");
    }
}

async fn wait_until<E: Environment>(env: &E, deadline: Option<E::Instant>) {
    match deadline {
        Some(deadline) => env.sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
