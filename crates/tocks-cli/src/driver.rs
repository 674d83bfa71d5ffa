//! Executes parsed commands against a running session.

use tocks_app::{Event, Session, SessionError, Signal, Storage, SystemEnv, login_event};
use tocks_core::{
    Account, ChatInfo, ChatKey, Environment, MAX_MESSAGE_LEN, Message, MessageId, split_message,
};
use tokio::sync::broadcast;

use crate::commands::{Command, USAGE};

/// Whether the driver keeps reading input after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Stop and shut down.
    Quit,
}

/// Drives a [`Session`] from line commands.
pub struct Driver<S: Storage> {
    session: Session,
    storage: S,
    env: SystemEnv,
    max_message_len: usize,
}

impl<S: Storage> Driver<S> {
    /// Driver for `session`, loading login state from `storage`.
    pub fn new(session: Session, storage: S, env: SystemEnv) -> Self {
        Self { session, storage, env, max_message_len: MAX_MESSAGE_LEN }
    }

    /// Split sent text into messages of at most `max_len` bytes.
    #[must_use]
    pub fn with_max_message_len(mut self, max_len: usize) -> Self {
        self.max_message_len = max_len;
        self
    }

    /// Run one command.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session stopped underneath
    /// the driver.
    #[allow(clippy::print_stdout)]
    pub async fn execute(&self, command: Command) -> Result<Flow, SessionError> {
        let event = match command {
            Command::Login { account, user, name, friends } => {
                let chats = friends
                    .into_iter()
                    .map(|(chat, peer)| {
                        ChatInfo::friend(ChatKey::new(account, chat), chat.0.into(), peer)
                    })
                    .collect();
                match login_event(&self.storage, Account::new(account, user, name), chats) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(%account, error = %e, "login failed");
                        return Ok(Flow::Continue);
                    },
                }
            },
            Command::Logout { account } => Event::AccountLoggedOut { account },
            Command::Friend { account, chat, name } => Event::FriendAdded {
                account,
                chat: ChatInfo::friend(ChatKey::new(account, chat), chat.0.into(), name),
            },
            Command::Unfriend { account, chat } => Event::FriendRemoved { account, chat },
            Command::Receive { account, chat, id, text } => {
                let message = Message::new(id, chat.0.into(), text, self.env.wall_clock());
                Event::MessageReceived { account, chat, message }
            },
            Command::Send { account, chat, id, text } => {
                let Some(user) = self.session.snapshot().accounts().get(&account).map(|a| a.user)
                else {
                    println!("account {account} is not logged in");
                    return Ok(Flow::Continue);
                };
                let parts = match split_message(&text, self.max_message_len) {
                    Ok(parts) => parts,
                    Err(e) => {
                        println!("send: {e}");
                        return Ok(Flow::Continue);
                    },
                };
                if parts.len() > 1 {
                    tracing::debug!(%account, %chat, parts = parts.len(), "long message split");
                }

                let time = self.env.wall_clock();
                for (next, part) in (id.0..).zip(parts) {
                    let message = Message::new(MessageId(next), user, part, time).pending();
                    self.session.handle().send(Event::MessageSent { account, chat, message }).await?;
                }
                return Ok(Flow::Continue);
            },
            Command::Complete { account, chat, id } => {
                Event::MessageCompleted { account, chat, message: id }
            },
            Command::Presence { account, chat, status } => {
                Event::PresenceChanged { account, chat, status }
            },
            Command::Read { account, chat } => {
                let key = ChatKey::new(account, chat);
                let latest =
                    self.session.snapshot().chats().chat(key).and_then(|c| c.last_message_time());
                match latest {
                    Some(time) => self.session.ui().mark_read(key, time)?,
                    None => println!("nothing to read in {key}"),
                }
                return Ok(Flow::Continue);
            },
            Command::History { account, chat, count } => {
                self.session.ui().load_messages(ChatKey::new(account, chat), None, count)?;
                return Ok(Flow::Continue);
            },
            Command::Open { account, chat } => {
                self.session.ui().set_visibility(true, Some(ChatKey::new(account, chat)))?;
                return Ok(Flow::Continue);
            },
            Command::Hide => {
                self.session.ui().set_visibility(false, None)?;
                return Ok(Flow::Continue);
            },
            Command::Unread => {
                self.print_unread();
                return Ok(Flow::Continue);
            },
            Command::Help => {
                println!("{USAGE}");
                return Ok(Flow::Continue);
            },
            Command::Quit => return Ok(Flow::Quit),
            Command::Empty => return Ok(Flow::Continue),
            Command::Unknown { input } => {
                println!("unknown command: {input} (try `help`)");
                return Ok(Flow::Continue);
            },
            Command::InvalidArgs { command, error } => {
                println!("{command}: {error}");
                return Ok(Flow::Continue);
            },
        };

        self.session.handle().send(event).await?;
        Ok(Flow::Continue)
    }

    #[allow(clippy::print_stdout)]
    fn print_unread(&self) {
        let snapshot = self.session.snapshot();
        for chat in snapshot.chats().chats() {
            let key = chat.key();
            println!(
                "{key} {} [{}] unread {}",
                chat.info().name,
                chat.info().presence,
                snapshot.unread_count(key)
            );
        }
    }

    /// Shut the session down, flushing pending reads and writes.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TaskFailed`] if a session task panicked.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        self.session.shutdown().await
    }
}

/// Print signals a user would see until the session closes.
#[allow(clippy::print_stdout)]
pub async fn print_signals(mut signals: broadcast::Receiver<Signal>) {
    loop {
        match signals.recv().await {
            Ok(Signal::NotificationRequested(batch)) => {
                println!("[notify] {}", batch.title);
                for line in batch.body.lines() {
                    println!("         {line}");
                }
            },
            Ok(Signal::NotificationDismissed) => println!("[notify] dismissed"),
            Ok(Signal::UnreadCountChanged { account, chat, count }) => {
                println!("[unread] {} {count}", ChatKey::new(account, chat));
            },
            Ok(Signal::MessagesLoaded { account, chat, messages }) => {
                let key = ChatKey::new(account, chat);
                match (messages.first(), messages.last()) {
                    (Some(first), Some(last)) => {
                        let count = messages.len();
                        println!("[history] {key} loaded {count} messages ({first}..={last})");
                    },
                    _ => println!("[history] {key} no older messages"),
                }
            },
            Ok(Signal::PresenceChanged { account, chat, status }) => {
                println!("[presence] {} {status}", ChatKey::new(account, chat));
            },
            Ok(Signal::PersistenceDegraded { account, chat, attempts, reason, .. }) => {
                println!(
                    "[storage] read state of {} not saved after {attempts} attempts: {reason}",
                    ChatKey::new(account, chat)
                );
            },
            Ok(_) => {},
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "signal printer lagged");
            },
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tocks_app::{MemoryStorage, SessionConfig};
    use tocks_core::{AccountId, ChatId, UserId};

    use super::*;
    use crate::commands::parse;

    const KEY: ChatKey = ChatKey { account: AccountId(1), chat: ChatId(7) };

    fn driver(storage: &MemoryStorage) -> Driver<MemoryStorage> {
        let session = Session::start(SessionConfig::default(), storage.clone(), SystemEnv::new());
        Driver::new(session, storage.clone(), SystemEnv::new())
    }

    async fn run(driver: &Driver<MemoryStorage>, line: &str) -> Flow {
        let flow = driver.execute(parse(line)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        flow
    }

    #[tokio::test(start_paused = true)]
    async fn received_message_is_counted_and_read() {
        let storage = MemoryStorage::new();
        let driver = driver(&storage);

        run(&driver, "login 1 100 alice 7=bob").await;
        run(&driver, "recv 1 7 1 Hello!").await;
        assert_eq!(driver.session.snapshot().unread_count(KEY), 1);

        run(&driver, "read 1 7").await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(driver.session.snapshot().unread_count(KEY), 0);
        assert_eq!(storage.read_state_writes().len(), 1);

        driver.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sent_message_needs_logged_in_account() {
        let storage = MemoryStorage::new();
        let driver = driver(&storage);

        run(&driver, "send 1 7 1 hi").await;
        assert!(driver.session.snapshot().chats().is_empty());

        run(&driver, "login 1 100 alice 7=bob").await;
        run(&driver, "send 1 7 1 hi").await;
        let snapshot = driver.session.snapshot();
        let messages = snapshot.chats().chat(KEY).unwrap().messages();
        assert_eq!(messages.len(), 1);
        assert!(!messages.first().unwrap().complete);

        run(&driver, "done 1 7 1").await;
        let snapshot = driver.session.snapshot();
        assert!(snapshot.chats().chat(KEY).unwrap().messages().first().unwrap().complete);

        driver.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn long_message_is_sent_in_parts() {
        let storage = MemoryStorage::new();
        let driver = driver(&storage).with_max_message_len(5);

        run(&driver, "login 1 100 alice 7=bob").await;
        run(&driver, "send 1 7 4 hello world").await;

        let snapshot = driver.session.snapshot();
        let sent: Vec<(u64, &str)> = snapshot
            .chats()
            .chat(KEY)
            .unwrap()
            .messages()
            .iter()
            .map(|m| (m.id.0, m.body.as_str()))
            .collect();
        assert_eq!(sent, vec![(4, "hello"), (5, " worl"), (6, "d")]);

        driver.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn history_pages_back_through_stored_messages() {
        let storage = MemoryStorage::new();
        let env = SystemEnv::new();
        for id in 1..=6 {
            let message = Message::new(MessageId(id), UserId(7), format!("m{id}"), env.wall_clock());
            storage.persist_message(KEY.account, KEY.chat, &message).unwrap();
        }
        storage.persist_read_state(KEY.account, KEY.chat, env.wall_clock()).unwrap();
        let driver = driver(&storage);

        run(&driver, "login 1 100 alice 7=bob").await;
        assert!(driver.session.snapshot().chats().chat(KEY).unwrap().messages().is_empty());

        run(&driver, "history 1 7 4").await;
        let ids = |driver: &Driver<MemoryStorage>| -> Vec<u64> {
            let snapshot = driver.session.snapshot();
            snapshot.chats().chat(KEY).unwrap().messages().iter().map(|m| m.id.0).collect()
        };
        assert_eq!(ids(&driver), vec![3, 4, 5, 6]);

        run(&driver, "history 1 7 4").await;
        assert_eq!(ids(&driver), (1..=6).collect::<Vec<_>>());
        assert_eq!(driver.session.snapshot().unread_count(KEY), 0);

        driver.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn quit_stops_the_loop() {
        let driver = driver(&MemoryStorage::new());
        assert_eq!(run(&driver, "help").await, Flow::Continue);
        assert_eq!(run(&driver, "bogus").await, Flow::Continue);
        assert_eq!(run(&driver, "quit").await, Flow::Quit);
        driver.shutdown().await.unwrap();
    }
}
