//! Identifiers and value types shared by every layer.
//!
//! Accounts and chats are referenced by small copyable ids stored in flat
//! maps keyed by [`ChatKey`]. Chat ids are scoped to their owning account,
//! so the pair is the unit of identity everywhere outside a single account.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock time at which a message arrived or a chat was read.
pub type Timestamp = DateTime<Utc>;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Logged-in account.
    AccountId
);
id_type!(
    /// Chat, unique within its account.
    ChatId
);
id_type!(
    /// Any user known to an account, including the account's own user.
    UserId
);
id_type!(
    /// Group conversation.
    GroupId
);
id_type!(
    /// Message id, strictly increasing in arrival order within a chat.
    MessageId
);

/// Globally unique chat reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChatKey {
    /// Owning account.
    pub account: AccountId,
    /// Chat within that account.
    pub chat: ChatId,
}

impl ChatKey {
    /// Key for `chat` owned by `account`.
    pub fn new(account: AccountId, chat: ChatId) -> Self {
        Self { account, chat }
    }
}

impl fmt::Display for ChatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.chat)
    }
}

/// Online presence of an account or a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    /// Reachable.
    Online,
    /// Reachable but idle.
    Away,
    /// Reachable, do not disturb.
    Busy,
    /// Not reachable.
    #[default]
    Offline,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Busy => "busy",
            Self::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// A logged-in identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// The account's own user. Messages from this sender never notify.
    pub user: UserId,
    /// Display name, used in notification suffixes.
    pub name: String,
    /// Own presence.
    pub status: Status,
}

impl Account {
    /// Online account.
    pub fn new(id: AccountId, user: UserId, name: impl Into<String>) -> Self {
        Self { id, user, name: name.into(), status: Status::Online }
    }
}

/// Who is on the other side of a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatPeer {
    /// One-to-one chat with a friend.
    Friend(UserId),
    /// Group conversation.
    Group(GroupId),
}

/// Chat metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    /// Owning account and chat id.
    pub key: ChatKey,
    /// Display name of the peer or group.
    pub name: String,
    /// Peer identity.
    pub peer: ChatPeer,
    /// Last known presence of the peer. Always `Offline` for groups.
    pub presence: Status,
}

impl ChatInfo {
    /// One-to-one chat with `friend`, initially offline.
    pub fn friend(key: ChatKey, friend: UserId, name: impl Into<String>) -> Self {
        Self { key, name: name.into(), peer: ChatPeer::Friend(friend), presence: Status::Offline }
    }

    /// Group chat.
    pub fn group(key: ChatKey, group: GroupId, name: impl Into<String>) -> Self {
        Self { key, name: name.into(), peer: ChatPeer::Group(group), presence: Status::Offline }
    }
}

/// Message flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MessageKind {
    /// Plain text.
    #[default]
    Normal,
    /// `/me` style action.
    Action,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Per-chat id.
    pub id: MessageId,
    /// Author.
    pub sender: UserId,
    /// Text or action.
    pub kind: MessageKind,
    /// Message text.
    pub body: String,
    /// Arrival time.
    pub timestamp: Timestamp,
    /// `false` while a message is still streaming in or awaiting a delivery
    /// receipt.
    pub complete: bool,
}

impl Message {
    /// Fully received text message.
    pub fn new(id: MessageId, sender: UserId, body: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id,
            sender,
            kind: MessageKind::Normal,
            body: body.into(),
            timestamp,
            complete: true,
        }
    }

    /// Mark as an action message.
    #[must_use]
    pub fn action(mut self) -> Self {
        self.kind = MessageKind::Action;
        self
    }

    /// Mark as not yet complete.
    #[must_use]
    pub fn pending(mut self) -> Self {
        self.complete = false;
        self
    }

    /// Text as shown in a notification body.
    pub fn display_text(&self) -> std::borrow::Cow<'_, str> {
        match self.kind {
            MessageKind::Normal => std::borrow::Cow::Borrowed(&self.body),
            MessageKind::Action => std::borrow::Cow::Owned(format!("* {}", self.body)),
        }
    }
}
