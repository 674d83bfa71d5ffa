//! Async session runtime.
//!
//! [`Session`] drives the [`Dispatcher`] from a bounded inbound queue and
//! wires it to its collaborators:
//!
//! - every accepted event republishes an `Arc<SessionSnapshot>` on a `watch`
//!   channel, so readers never wait for the writer
//! - every signal is broadcast to subscribers
//! - persistence signals go to the [`PersistWriter`], history requests to
//!   the [`HistoryLoader`]
//! - the [`UiBoundary`] turns UI input into debounced events
//!
//! # Shutdown
//!
//! [`Session::shutdown`] stops the UI boundary first (flushing pending
//! mark-reads), then closes the queue and lets the dispatcher drain it, then
//! waits for the writer to finish its queued writes.

use std::sync::Arc;

use tocks_core::{ChatKey, Environment, ReadDebouncer};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    Dispatcher, Event, HistoryLoader, LoadRequest, PersistWriter, SessionConfig, SessionError,
    SessionSnapshot, Signal, Storage, UiBoundary, UiHandle, WriteRequest,
};

/// Cloneable handle for submitting events to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Event>,
}

impl SessionHandle {
    /// Enqueue `event` without waiting.
    ///
    /// # Errors
    ///
    /// - [`SessionError::QueueOverflow`] if the queue is at capacity
    /// - [`SessionError::Closed`] if the session has shut down
    pub fn submit(&self, event: Event) -> Result<(), SessionError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SessionError::QueueOverflow,
            mpsc::error::TrySendError::Closed(_) => SessionError::Closed,
        })
    }

    /// Enqueue `event`, waiting for queue space.
    ///
    /// Used by background tasks, whose completions must not be dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has shut down.
    pub async fn send(&self, event: Event) -> Result<(), SessionError> {
        self.tx.send(event).await.map_err(|_| SessionError::Closed)
    }
}

/// A running session: dispatcher plus its background tasks.
pub struct Session {
    handle: SessionHandle,
    ui: UiHandle,
    signals: broadcast::Sender<Signal>,
    snapshots: watch::Receiver<Arc<SessionSnapshot>>,
    boundary_stop: oneshot::Sender<()>,
    dispatcher_stop: oneshot::Sender<()>,
    boundary: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    writer: JoinHandle<()>,
    loader: JoinHandle<()>,
}

impl Session {
    /// Spawn the dispatcher, writer, loader and UI boundary tasks.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<S: Storage, E: Environment>(config: SessionConfig, storage: S, env: E) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let handle = SessionHandle { tx };

        let (signals, _) = broadcast::channel(config.signal_capacity.max(1));
        let (snapshot_tx, snapshots) = watch::channel(Arc::new(SessionSnapshot::default()));
        let (writes_tx, writes_rx) = mpsc::unbounded_channel();
        let (loads_tx, loads_rx) = mpsc::unbounded_channel();
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (boundary_stop, boundary_stop_rx) = oneshot::channel();
        let (dispatcher_stop, dispatcher_stop_rx) = oneshot::channel();

        let writer =
            PersistWriter::new(storage.clone(), env.clone(), config.retry, handle.clone(), writes_rx);
        let loader = HistoryLoader::new(
            storage,
            handle.clone(),
            loads_rx,
            config.history_chunk_size,
            config.history_replay_cap,
        );
        let boundary = UiBoundary::new(
            env,
            ReadDebouncer::with_max_delay(config.debounce, config.debounce_max_delay),
            handle.clone(),
            ui_rx,
            signals.subscribe(),
            snapshots.clone(),
        );
        let router = Router { snapshots: snapshot_tx, signals: signals.clone(), writes_tx, loads_tx };

        let dispatcher = Dispatcher::new(config.notification);
        tracing::info!(queue_capacity = config.queue_capacity, "session started");

        Self {
            handle,
            ui: UiHandle::new(ui_tx),
            signals,
            snapshots,
            boundary_stop,
            dispatcher_stop,
            boundary: tokio::spawn(boundary.run(boundary_stop_rx)),
            dispatcher: tokio::spawn(dispatch_loop(dispatcher, rx, dispatcher_stop_rx, router)),
            writer: tokio::spawn(writer.run()),
            loader: tokio::spawn(loader.run()),
        }
    }

    /// Handle for submitting events from other tasks.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Enqueue `event` without waiting.
    ///
    /// # Errors
    ///
    /// See [`SessionHandle::submit`].
    pub fn submit(&self, event: Event) -> Result<(), SessionError> {
        self.handle.submit(event)
    }

    /// Subscribe to signals emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Receiver notified whenever a new snapshot is published.
    pub fn watch(&self) -> watch::Receiver<Arc<SessionSnapshot>> {
        self.snapshots.clone()
    }

    /// Handle for UI input.
    pub fn ui(&self) -> UiHandle {
        self.ui.clone()
    }

    /// Stop accepting events, drain the queue and wait for queued writes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TaskFailed`] if a background task panicked.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        tracing::info!("session shutting down");

        // Receivers only vanish if their task already ended; the join reports it.
        let _ = self.boundary_stop.send(());
        join("ui boundary", self.boundary).await?;

        let _ = self.dispatcher_stop.send(());
        join("dispatcher", self.dispatcher).await?;

        join("persist writer", self.writer).await?;
        join("history loader", self.loader).await?;

        tracing::info!("session stopped");
        Ok(())
    }
}

async fn join(task: &str, handle: JoinHandle<()>) -> Result<(), SessionError> {
    handle.await.map_err(|e| {
        tracing::error!(task, error = %e, "session task failed");
        SessionError::TaskFailed(format!("{task}: {e}"))
    })
}

/// Outbound side of the dispatcher loop.
struct Router {
    snapshots: watch::Sender<Arc<SessionSnapshot>>,
    signals: broadcast::Sender<Signal>,
    writes_tx: mpsc::UnboundedSender<WriteRequest>,
    loads_tx: mpsc::UnboundedSender<LoadRequest>,
}

impl Router {
    fn publish(&self, dispatcher: &Dispatcher, signals: Vec<Signal>) {
        self.snapshots.send_replace(Arc::new(dispatcher.snapshot()));

        for signal in signals {
            self.route(&signal);
            if self.signals.send(signal).is_err() {
                tracing::trace!("no signal subscribers");
            }
        }
    }

    fn route(&self, signal: &Signal) {
        let delivered = match signal {
            Signal::PersistReadState { account, chat, time } => self
                .writes_tx
                .send(WriteRequest::ReadState { key: ChatKey::new(*account, *chat), time: *time })
                .is_ok(),
            Signal::PersistMessage { account, chat, message } => self
                .writes_tx
                .send(WriteRequest::Message {
                    key: ChatKey::new(*account, *chat),
                    message: message.clone(),
                })
                .is_ok(),
            Signal::LoadHistory { account, chat, since } => self
                .loads_tx
                .send(LoadRequest::Replay { key: ChatKey::new(*account, *chat), since: *since })
                .is_ok(),
            Signal::LoadPage { account, chat, before, limit } => self
                .loads_tx
                .send(LoadRequest::Page {
                    key: ChatKey::new(*account, *chat),
                    before: *before,
                    limit: *limit,
                })
                .is_ok(),
            _ => true,
        };

        if !delivered {
            tracing::warn!(?signal, "background task gone, request dropped");
        }
    }
}

async fn dispatch_loop(
    mut dispatcher: Dispatcher,
    mut rx: mpsc::Receiver<Event>,
    mut stop: oneshot::Receiver<()>,
    router: Router,
) {
    let mut closing = false;
    let mut processed: u64 = 0;

    loop {
        let event = tokio::select! {
            _ = &mut stop, if !closing => {
                closing = true;
                rx.close();
                tracing::debug!(backlog = rx.len(), "event queue closed, draining");
                continue;
            },
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        processed += 1;
        match dispatcher.handle(event) {
            Ok(signals) => router.publish(&dispatcher, signals),
            Err(error) => tracing::warn!(%error, "event rejected"),
        }
    }

    tracing::debug!(processed, "dispatcher stopped");
}
