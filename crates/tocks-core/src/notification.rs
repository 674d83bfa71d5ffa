//! Notification batching.
//!
//! [`aggregate`] derives the single desktop notification that summarises
//! every unread message across chats and accounts. It is a pure function of
//! the chat and read-state snapshots plus window visibility; nothing here
//! holds state between calls, so the batch can be rebuilt at any time.
//!
//! # Rendering
//!
//! - One chat: `Message received from <chat>` or `<N> messages received from
//!   <chat>`, body is the latest messages oldest first.
//! - Several chats in one account: `<N> messages received from <M> chats`,
//!   body lists the chat names.
//! - Several accounts: `Messages received for multiple accounts`, body has one
//!   line per account built from that account's title.
//!
//! When more than one account is logged in, account titles carry a
//! ` for <account>` suffix.

use std::collections::BTreeMap;

use crate::{
    chat_store::{ChatSnapshot, ChatStoreSnapshot},
    model::{Account, AccountId, ChatKey, Message, MessageId, Timestamp},
    read_state::ReadStateSnapshot,
};

/// Window state reported by the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Visibility {
    /// Whether the main window is shown and focused.
    pub window_visible: bool,
    /// Chat currently open in the window.
    pub active_chat: Option<ChatKey>,
}

impl Visibility {
    /// Whether messages in `key` are already on screen.
    pub fn suppresses(&self, key: ChatKey) -> bool {
        self.window_visible && self.active_chat == Some(key)
    }
}

/// Unit in which the body length budget is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ElisionUnit {
    /// UTF-8 bytes.
    Bytes,
    /// Unicode scalar values.
    #[default]
    Chars,
}

impl ElisionUnit {
    fn len(self, s: &str) -> usize {
        match self {
            Self::Bytes => s.len(),
            Self::Chars => s.chars().count(),
        }
    }

    /// Longest prefix of `s` that fits in `budget` units, ending on a char
    /// boundary.
    fn prefix(self, s: &str, budget: usize) -> &str {
        let end = match self {
            Self::Bytes => {
                let mut end = budget.min(s.len());
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                end
            },
            Self::Chars => s.char_indices().nth(budget).map_or(s.len(), |(idx, _)| idx),
        };
        &s[..end]
    }
}

/// Rendering limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Body length budget, ellipsis and separators included.
    pub max_body_len: usize,
    /// Messages shown in a single-chat body.
    pub max_body_messages: usize,
    /// How `max_body_len` is measured.
    pub elision: ElisionUnit,
    /// Marker appended where a line is cut.
    pub ellipsis: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_body_len: 200,
            max_body_messages: 5,
            elision: ElisionUnit::Chars,
            ellipsis: "...".to_string(),
        }
    }
}

/// Borrowed state the aggregator reads.
#[derive(Debug, Clone, Copy)]
pub struct NotificationInput<'a> {
    /// Logged-in accounts.
    pub accounts: &'a BTreeMap<AccountId, Account>,
    /// Chat histories.
    pub chats: &'a ChatStoreSnapshot,
    /// Read times.
    pub reads: &'a ReadStateSnapshot,
    /// Window state.
    pub visibility: &'a Visibility,
}

/// Unread messages of one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatUnread {
    /// Chat key.
    pub key: ChatKey,
    /// Chat display name.
    pub name: String,
    /// Unread messages from other users, in id order.
    pub messages: Vec<Message>,
}

impl ChatUnread {
    /// Number of unread messages.
    pub fn count(&self) -> usize {
        self.messages.len()
    }

    /// Latest unread timestamp.
    pub fn latest(&self) -> Option<Timestamp> {
        self.messages.iter().map(|m| m.timestamp).max()
    }

    fn title(&self) -> String {
        match self.count() {
            1 => format!("Message received from {}", self.name),
            n => format!("{n} messages received from {}", self.name),
        }
    }
}

/// Unread chats of one account, most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountGroup {
    /// Account id.
    pub account: AccountId,
    /// Account display name.
    pub account_name: String,
    /// Chats with unread messages. Never empty.
    pub chats: Vec<ChatUnread>,
}

impl AccountGroup {
    /// Unread messages across every chat.
    pub fn total(&self) -> usize {
        self.chats.iter().map(ChatUnread::count).sum()
    }

    fn title(&self, with_suffix: bool) -> String {
        let title = match self.chats.as_slice() {
            [chat] => chat.title(),
            chats => format!("{} messages received from {} chats", self.total(), chats.len()),
        };
        if with_suffix { format!("{title} for {}", self.account_name) } else { title }
    }
}

/// Rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationBatch {
    /// Title line.
    pub title: String,
    /// Body text, at most `max_body_len` long.
    pub body: String,
    /// Accounts with unread messages, ascending by id.
    pub groups: Vec<AccountGroup>,
}

impl NotificationBatch {
    /// Whether the batch includes message `id` of `key`.
    pub fn contains(&self, key: ChatKey, id: MessageId) -> bool {
        self.groups
            .iter()
            .filter(|g| g.account == key.account)
            .flat_map(|g| g.chats.iter())
            .filter(|c| c.key == key)
            .any(|c| c.messages.iter().any(|m| m.id == id))
    }

    /// Unread messages across every account.
    pub fn total(&self) -> usize {
        self.groups.iter().map(AccountGroup::total).sum()
    }

    /// Every message the batch summarises.
    pub fn messages(&self) -> impl Iterator<Item = (ChatKey, MessageId)> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.chats.iter())
            .flat_map(|c| c.messages.iter().map(move |m| (c.key, m.id)))
    }
}

/// Build the notification for the current state. `None` when nothing is
/// unread outside the visible chat.
pub fn aggregate(
    input: &NotificationInput<'_>,
    config: &NotificationConfig,
) -> Option<NotificationBatch> {
    let groups: Vec<AccountGroup> = input
        .accounts
        .values()
        .filter_map(|account| group_for(account, input))
        .collect();

    let with_suffix = input.accounts.len() > 1;
    let (title, lines): (String, Vec<String>) = match groups.as_slice() {
        [] => return None,
        [group] => (group.title(with_suffix), single_account_lines(group, config)),
        groups => (
            "Messages received for multiple accounts".to_string(),
            groups.iter().map(|g| g.title(true)).collect(),
        ),
    };

    let body = fill_body(lines.iter().map(String::as_str), config);
    Some(NotificationBatch { title, body, groups })
}

fn group_for(account: &Account, input: &NotificationInput<'_>) -> Option<AccountGroup> {
    let mut chats: Vec<ChatUnread> = input
        .chats
        .for_account(account.id)
        .filter(|chat| !input.visibility.suppresses(chat.key()))
        .filter_map(|chat| chat_unread(chat, account, input.reads))
        .collect();

    if chats.is_empty() {
        return None;
    }

    chats.sort_by(|a, b| b.latest().cmp(&a.latest()).then(a.key.cmp(&b.key)));
    Some(AccountGroup { account: account.id, account_name: account.name.clone(), chats })
}

fn chat_unread(
    chat: &ChatSnapshot,
    account: &Account,
    reads: &ReadStateSnapshot,
) -> Option<ChatUnread> {
    let since = reads.last_read(chat.key());
    if !chat.is_unread(since) {
        return None;
    }

    let messages: Vec<Message> =
        chat.unread_since(since).filter(|m| m.sender != account.user).cloned().collect();
    if messages.is_empty() {
        return None;
    }

    Some(ChatUnread { key: chat.key(), name: chat.info().name.clone(), messages })
}

fn single_account_lines(group: &AccountGroup, config: &NotificationConfig) -> Vec<String> {
    match group.chats.as_slice() {
        [chat] => {
            let skip = chat.messages.len().saturating_sub(config.max_body_messages);
            chat.messages[skip..].iter().map(|m| m.display_text().into_owned()).collect()
        },
        chats => chats.iter().map(|c| c.name.clone()).collect(),
    }
}

/// Join `lines` with newlines within the length budget.
///
/// The first line that does not fit is cut with the ellipsis and nothing
/// after it is added. When not even the ellipsis fits after the separator,
/// the line is dropped and the ellipsis closes the text before it.
fn fill_body<'a>(lines: impl Iterator<Item = &'a str>, config: &NotificationConfig) -> String {
    let unit = config.elision;
    let marker_len = unit.len(&config.ellipsis);
    let mut body = String::new();
    let mut used = 0;
    let mut first = true;

    for line in lines {
        let separator = usize::from(!first);
        let remaining = config.max_body_len.checked_sub(used + separator);
        let len = unit.len(line);

        match remaining {
            Some(remaining) if len <= remaining => {
                if !first {
                    body.push('\n');
                }
                body.push_str(line);
                used += separator + len;
                first = false;
            },
            Some(remaining) if remaining >= marker_len && (first || remaining > 0) => {
                if !first {
                    body.push('\n');
                }
                body.push_str(&elide(line, remaining, config));
                return body;
            },
            _ => return close_with_marker(&body, config),
        }
    }

    body
}

/// Cut `text` to `budget` units, ending with the ellipsis.
fn elide(text: &str, budget: usize, config: &NotificationConfig) -> String {
    let unit = config.elision;
    let marker_len = unit.len(&config.ellipsis);
    if marker_len > budget {
        return unit.prefix(&config.ellipsis, budget).to_string();
    }
    let mut out = unit.prefix(text, budget - marker_len).to_string();
    out.push_str(&config.ellipsis);
    out
}

/// End an already filled body with the ellipsis, cutting it back to make room.
fn close_with_marker(body: &str, config: &NotificationConfig) -> String {
    let unit = config.elision;
    let keep = config.max_body_len.saturating_sub(unit.len(&config.ellipsis));
    let kept = unit.prefix(body, keep).trim_end_matches('\n');
    format!("{kept}{}", unit.prefix(&config.ellipsis, config.max_body_len - unit.len(kept)))
}
