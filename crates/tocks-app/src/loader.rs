//! Login catch-up and on-demand history.
//!
//! Reading read times happens before login is submitted ([`login_event`]),
//! so the dispatcher sees the account with its read state already in place.
//! Unread history is replayed afterwards by the [`HistoryLoader`] task,
//! capped per chat and split into chunks with a yield between them so a
//! large backlog never monopolises the dispatcher queue. The same task
//! serves pages of older history when the UI scrolls back.

use tocks_core::{Account, ChatInfo, ChatKey, MessageId, Timestamp};
use tokio::sync::mpsc;

use crate::{Event, HistoryQuery, SessionHandle, Storage, StorageError};

/// History load requested by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRequest {
    /// Unread messages after login, capped by the loader.
    Replay {
        /// Chat to replay.
        key: ChatKey,
        /// Replay messages strictly after this time.
        since: Timestamp,
    },
    /// Older messages for a chat the user is scrolling through.
    Page {
        /// Chat to load.
        key: ChatKey,
        /// Load messages with a lower id. `None` for the newest.
        before: Option<MessageId>,
        /// Most messages to load.
        limit: usize,
    },
}

impl LoadRequest {
    /// Chat the request is for.
    pub fn key(&self) -> ChatKey {
        match self {
            Self::Replay { key, .. } | Self::Page { key, .. } => *key,
        }
    }
}

/// Build the login event for `account`, with its durable read times.
///
/// # Errors
///
/// Returns the storage error if read times cannot be loaded.
pub fn login_event<S: Storage>(
    storage: &S,
    account: Account,
    chats: Vec<ChatInfo>,
) -> Result<Event, StorageError> {
    let last_read_times = storage.load_read_states(account.id)?;
    tracing::debug!(account = %account.id, read_states = last_read_times.len(), "read times loaded");
    Ok(Event::AccountLoggedIn { account, chats, last_read_times })
}

/// Background task loading history from storage.
pub struct HistoryLoader<S: Storage> {
    storage: S,
    events: SessionHandle,
    inbox: mpsc::UnboundedReceiver<LoadRequest>,
    chunk_size: usize,
    replay_cap: usize,
}

impl<S: Storage> HistoryLoader<S> {
    /// Loader submitting chunks of at most `chunk_size` messages and at
    /// most `replay_cap` messages per chat.
    pub fn new(
        storage: S,
        events: SessionHandle,
        inbox: mpsc::UnboundedReceiver<LoadRequest>,
        chunk_size: usize,
        replay_cap: usize,
    ) -> Self {
        Self { storage, events, inbox, chunk_size: chunk_size.max(1), replay_cap }
    }

    /// Run until the inbox closes.
    pub async fn run(mut self) {
        while let Some(request) = self.inbox.recv().await {
            if let Err(error) = self.load(request).await {
                tracing::warn!(key = %request.key(), %error, "history load failed");
            }
        }
        tracing::debug!("history loader stopped");
    }

    async fn load(&self, request: LoadRequest) -> Result<(), StorageError> {
        let key = request.key();
        let query = match request {
            LoadRequest::Replay { since, .. } => HistoryQuery::unread(since, self.replay_cap),
            LoadRequest::Page { before, limit, .. } => HistoryQuery::page(before, limit),
        };
        let messages = self.storage.load_messages(key.account, key.chat, query)?;

        let total = messages.len();
        if matches!(request, LoadRequest::Replay { .. }) && total == self.replay_cap {
            tracing::info!(%key, cap = self.replay_cap, "history replay reached cap");
        }

        // A page is always answered, even when empty, so the UI learns the
        // start of the history was reached.
        let mut pending = matches!(request, LoadRequest::Page { .. });
        let mut remaining = messages.into_iter().peekable();
        while remaining.peek().is_some() || pending {
            pending = false;
            let chunk: Vec<_> = remaining.by_ref().take(self.chunk_size).collect();
            let event = Event::HistoryLoaded { account: key.account, chat: key.chat, messages: chunk };
            if self.events.send(event).await.is_err() {
                tracing::debug!(%key, "session closed during history load");
                return Ok(());
            }
            tokio::task::yield_now().await;
        }

        tracing::debug!(%key, messages = total, "history loaded");
        Ok(())
    }
}
