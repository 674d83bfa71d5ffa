//! Line command parsing.
//!
//! Each stdin line is one command. Parsing never fails: unknown commands and
//! bad arguments come back as [`Command::Unknown`] and
//! [`Command::InvalidArgs`] so the driver can report them and keep reading.

use tocks_core::{AccountId, ChatId, MessageId, Status, UserId};

/// Usage text printed by `help`.
pub const USAGE: &str = "\
login <account> <user> <name> [<chat>=<peer> ...]
logout <account>
friend <account> <chat> <name>
unfriend <account> <chat>
recv <account> <chat> <id> <text>
send <account> <chat> <id> <text>
done <account> <chat> <id>
presence <account> <chat> online|away|busy|offline
read <account> <chat>
history <account> <chat> [count]
open <account> <chat>
hide
unread
help
quit";

/// Messages loaded by `history` without a count.
pub const DEFAULT_HISTORY_PAGE: usize = 20;

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log an account in with its friends.
    Login {
        /// Account to log in.
        account: AccountId,
        /// The account's own user.
        user: UserId,
        /// Display name.
        name: String,
        /// Friend chats. The peer's user id is the chat id.
        friends: Vec<(ChatId, String)>,
    },
    /// Log an account out.
    Logout {
        /// Account to log out.
        account: AccountId,
    },
    /// Add a friend chat.
    Friend {
        /// Owning account.
        account: AccountId,
        /// New chat.
        chat: ChatId,
        /// Peer name.
        name: String,
    },
    /// Remove a friend chat.
    Unfriend {
        /// Owning account.
        account: AccountId,
        /// Chat to drop.
        chat: ChatId,
    },
    /// Simulate a message from the peer.
    Receive {
        /// Receiving account.
        account: AccountId,
        /// Chat with the peer.
        chat: ChatId,
        /// Message id.
        id: MessageId,
        /// Message text.
        text: String,
    },
    /// Send a message as the account's user.
    Send {
        /// Sending account.
        account: AccountId,
        /// Target chat.
        chat: ChatId,
        /// Message id.
        id: MessageId,
        /// Message text.
        text: String,
    },
    /// Delivery receipt for a sent message.
    Complete {
        /// Owning account.
        account: AccountId,
        /// Chat holding the message.
        chat: ChatId,
        /// Completed message.
        id: MessageId,
    },
    /// Peer presence change.
    Presence {
        /// Owning account.
        account: AccountId,
        /// Chat with the peer.
        chat: ChatId,
        /// New presence.
        status: Status,
    },
    /// Mark a chat read up to its latest message.
    Read {
        /// Owning account.
        account: AccountId,
        /// Chat to read.
        chat: ChatId,
    },
    /// Load older messages of a chat from storage.
    History {
        /// Owning account.
        account: AccountId,
        /// Chat to page back through.
        chat: ChatId,
        /// Most messages to load.
        count: usize,
    },
    /// Show the window with a chat open.
    Open {
        /// Owning account.
        account: AccountId,
        /// Chat to open.
        chat: ChatId,
    },
    /// Hide the window.
    Hide,
    /// Print unread counts.
    Unread,
    /// Print usage.
    Help,
    /// Shut the session down and exit.
    Quit,
    /// Empty line.
    Empty,
    /// Unrecognized command word.
    Unknown {
        /// The offending line.
        input: String,
    },
    /// Recognized command with unusable arguments.
    InvalidArgs {
        /// Command word.
        command: String,
        /// What was wrong.
        error: String,
    },
}

/// Parse one input line.
pub fn parse(line: &str) -> Command {
    let mut args = line.split_whitespace();
    let Some(word) = args.next() else {
        return Command::Empty;
    };

    let parsed = match word {
        "login" => parse_login(&mut args),
        "logout" => id(args.next(), "account").map(|account| Command::Logout { account }),
        "friend" => parse_friend(&mut args),
        "unfriend" => chat_args(&mut args).map(|(account, chat)| Command::Unfriend { account, chat }),
        "recv" => message_args(&mut args)
            .map(|(account, chat, id, text)| Command::Receive { account, chat, id, text }),
        "send" => message_args(&mut args)
            .map(|(account, chat, id, text)| Command::Send { account, chat, id, text }),
        "done" => parse_complete(&mut args),
        "presence" => parse_presence(&mut args),
        "read" => chat_args(&mut args).map(|(account, chat)| Command::Read { account, chat }),
        "history" => parse_history(&mut args),
        "open" => chat_args(&mut args).map(|(account, chat)| Command::Open { account, chat }),
        "hide" => Ok(Command::Hide),
        "unread" => Ok(Command::Unread),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        _ => return Command::Unknown { input: line.trim().to_string() },
    };

    parsed.unwrap_or_else(|error| Command::InvalidArgs { command: word.to_string(), error })
}

type Args<'a> = std::str::SplitWhitespace<'a>;

fn id<T: From<u64>>(arg: Option<&str>, what: &str) -> Result<T, String> {
    let arg = arg.ok_or_else(|| format!("missing {what}"))?;
    arg.parse::<u64>().map(T::from).map_err(|_| format!("{what} must be a number, got {arg:?}"))
}

fn text(args: &mut Args<'_>, what: &str) -> Result<String, String> {
    let text = args.collect::<Vec<_>>().join(" ");
    if text.is_empty() { Err(format!("missing {what}")) } else { Ok(text) }
}

fn chat_args(args: &mut Args<'_>) -> Result<(AccountId, ChatId), String> {
    Ok((id(args.next(), "account")?, id(args.next(), "chat")?))
}

fn message_args(args: &mut Args<'_>) -> Result<(AccountId, ChatId, MessageId, String), String> {
    let (account, chat) = chat_args(args)?;
    let id = id(args.next(), "message id")?;
    Ok((account, chat, id, text(args, "text")?))
}

fn parse_login(args: &mut Args<'_>) -> Result<Command, String> {
    let account = id(args.next(), "account")?;
    let user = id(args.next(), "user")?;
    let name = args.next().ok_or("missing name")?.to_string();
    let friends = args
        .map(|arg| {
            let (chat, peer) =
                arg.split_once('=').ok_or_else(|| format!("friend must be <chat>=<peer>, got {arg:?}"))?;
            Ok((id(Some(chat), "chat")?, peer.to_string()))
        })
        .collect::<Result<Vec<_>, String>>()?;
    Ok(Command::Login { account, user, name, friends })
}

fn parse_friend(args: &mut Args<'_>) -> Result<Command, String> {
    let (account, chat) = chat_args(args)?;
    Ok(Command::Friend { account, chat, name: text(args, "name")? })
}

fn parse_complete(args: &mut Args<'_>) -> Result<Command, String> {
    let (account, chat) = chat_args(args)?;
    Ok(Command::Complete { account, chat, id: id(args.next(), "message id")? })
}

fn parse_history(args: &mut Args<'_>) -> Result<Command, String> {
    let (account, chat) = chat_args(args)?;
    let count = match args.next() {
        Some(arg) => arg.parse().map_err(|_| format!("count must be a number, got {arg:?}"))?,
        None => DEFAULT_HISTORY_PAGE,
    };
    Ok(Command::History { account, chat, count })
}

fn parse_presence(args: &mut Args<'_>) -> Result<Command, String> {
    let (account, chat) = chat_args(args)?;
    let status = match args.next() {
        Some("online") => Status::Online,
        Some("away") => Status::Away,
        Some("busy") => Status::Busy,
        Some("offline") => Status::Offline,
        Some(other) => return Err(format!("unknown status {other:?}")),
        None => return Err("missing status".to_string()),
    };
    Ok(Command::Presence { account, chat, status })
}
