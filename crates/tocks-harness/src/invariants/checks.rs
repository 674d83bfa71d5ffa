//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use super::{Invariant, InvariantResult, StateSnapshot, Violation};

/// Read times must never decrease.
///
/// Every chat's observed `last_read_time` sequence is non-decreasing. A
/// decrease means a stale mark-read or a reordered write was applied.
pub struct ReadTimeMonotonicity;

impl Invariant for ReadTimeMonotonicity {
    fn name(&self) -> &'static str {
        "read_time_monotonicity"
    }

    fn check(&self, state: &StateSnapshot) -> InvariantResult {
        for (key, history) in &state.read_history {
            if let Some(pair) = history.windows(2).find(|pair| pair[1] < pair[0]) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("chat {key}: read time decreased {} → {}", pair[0], pair[1]),
                });
            }
        }
        Ok(())
    }
}

/// A chat is unread iff `last_message_time > last_read_time`.
///
/// Both the unread flag and the unread count must agree with the
/// timestamps.
pub struct UnreadMatchesTimestamps;

impl Invariant for UnreadMatchesTimestamps {
    fn name(&self) -> &'static str {
        "unread_matches_timestamps"
    }

    fn check(&self, state: &StateSnapshot) -> InvariantResult {
        for (key, chat) in &state.chats {
            let expected = chat.last_message_time.is_some_and(|t| t > chat.last_read_time);
            if chat.unread != expected || (chat.unread_count > 0) != expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "chat {key}: unread={} count={} but last_message_time={:?} last_read_time={}",
                        chat.unread, chat.unread_count, chat.last_message_time, chat.last_read_time
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Message ids within a chat are strictly increasing in display order.
///
/// Duplicates must have been dropped and late ids placed by id.
pub struct MessagesSortedUnique;

impl Invariant for MessagesSortedUnique {
    fn name(&self) -> &'static str {
        "messages_sorted_unique"
    }

    fn check(&self, state: &StateSnapshot) -> InvariantResult {
        for (key, chat) in &state.chats {
            if let Some(pair) = chat.message_ids.windows(2).find(|pair| pair[1] <= pair[0]) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("chat {key}: message {} follows {}", pair[1], pair[0]),
                });
            }
        }
        Ok(())
    }
}

/// A shown notification only lists chats that exist and are unread.
///
/// Reading every chat a notification lists must dismiss it.
pub struct ShownNotificationHasUnread;

impl Invariant for ShownNotificationHasUnread {
    fn name(&self) -> &'static str {
        "shown_notification_has_unread"
    }

    fn check(&self, state: &StateSnapshot) -> InvariantResult {
        let Some(keys) = &state.notified_chats else {
            return Ok(());
        };

        if keys.is_empty() {
            return Err(Violation {
                invariant: self.name(),
                message: "notification shown without any chat".to_string(),
            });
        }

        for key in keys {
            match state.chats.get(key) {
                Some(chat) if chat.unread => {},
                Some(_) => {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("notification lists read chat {key}"),
                    });
                },
                None => {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("notification lists unknown chat {key}"),
                    });
                },
            }
        }
        Ok(())
    }
}

/// Unread messages from a peer are notified unless their chat is on screen.
///
/// Every chat with such messages must be listed by the shown notification.
/// A miss means a message can sit unread with nobody told about it.
pub struct UnreadOffScreenIsNotified;

impl Invariant for UnreadOffScreenIsNotified {
    fn name(&self) -> &'static str {
        "unread_off_screen_is_notified"
    }

    fn check(&self, state: &StateSnapshot) -> InvariantResult {
        let missed = state.chats.iter().find(|(key, chat)| {
            chat.notifiable_unread > 0
                && !chat.on_screen
                && !state.notified_chats.as_ref().is_some_and(|keys| keys.contains(key))
        });

        match missed {
            Some((key, chat)) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "chat {key}: {} unread messages off screen but not notified",
                    chat.notifiable_unread
                ),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tocks_core::{AccountId, ChatId, ChatKey, MessageId, Timestamp};

    use super::*;
    use crate::invariants::ChatState;

    fn ts(secs: i64) -> Timestamp {
        chrono::Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn key(chat: u64) -> ChatKey {
        ChatKey::new(AccountId(1), ChatId(chat))
    }

    fn unread_chat() -> ChatState {
        ChatState {
            message_ids: vec![MessageId(1)],
            last_message_time: Some(ts(10)),
            last_read_time: ts(5),
            unread_count: 1,
            unread: true,
            notifiable_unread: 1,
            on_screen: false,
        }
    }

    #[test]
    fn read_time_monotonicity_passes() {
        let mut state = StateSnapshot::empty();
        state.record_read(key(1), ts(1));
        state.record_read(key(1), ts(2));
        state.record_read(key(1), ts(2));
        assert!(ReadTimeMonotonicity.check(&state).is_ok());
    }

    #[test]
    fn read_time_monotonicity_fails() {
        let mut state = StateSnapshot::empty();
        state.record_read(key(1), ts(5));
        state.record_read(key(1), ts(3));

        let result = ReadTimeMonotonicity.check(&state);
        assert!(result.is_err());
        assert!(result.unwrap_err().message.contains("decreased"));
    }

    #[test]
    fn unread_matches_timestamps_passes() {
        let read = ChatState { last_read_time: ts(10), unread_count: 0, unread: false, ..unread_chat() };
        let state = StateSnapshot::empty()
            .with_chat(key(1), unread_chat())
            .with_chat(key(2), read)
            .with_chat(key(3), ChatState::default());
        assert!(UnreadMatchesTimestamps.check(&state).is_ok());
    }

    #[test]
    fn unread_flag_disagreeing_with_timestamps_fails() {
        let wrong = ChatState { unread: false, ..unread_chat() };
        let state = StateSnapshot::empty().with_chat(key(1), wrong);
        assert!(UnreadMatchesTimestamps.check(&state).is_err());
    }

    #[test]
    fn unread_count_disagreeing_with_timestamps_fails() {
        let wrong = ChatState { unread_count: 0, ..unread_chat() };
        let state = StateSnapshot::empty().with_chat(key(1), wrong);
        assert!(UnreadMatchesTimestamps.check(&state).is_err());
    }

    #[test]
    fn messages_sorted_unique_fails_on_duplicate() {
        let chat = ChatState {
            message_ids: vec![MessageId(1), MessageId(3), MessageId(3)],
            ..unread_chat()
        };
        let state = StateSnapshot::empty().with_chat(key(1), chat);

        let result = MessagesSortedUnique.check(&state);
        assert!(result.unwrap_err().message.contains("message 3 follows 3"));
    }

    #[test]
    fn shown_notification_passes_for_unread_chats() {
        let state = StateSnapshot::empty().with_chat(key(1), unread_chat()).with_notification([key(1)]);
        assert!(ShownNotificationHasUnread.check(&state).is_ok());
    }

    #[test]
    fn shown_notification_for_read_chat_fails() {
        let read = ChatState { last_read_time: ts(10), unread_count: 0, unread: false, ..unread_chat() };
        let state = StateSnapshot::empty().with_chat(key(1), read).with_notification([key(1)]);
        assert!(ShownNotificationHasUnread.check(&state).is_err());
    }

    #[test]
    fn shown_notification_for_unknown_chat_fails() {
        let state = StateSnapshot::empty().with_notification([key(9)]);
        assert!(ShownNotificationHasUnread.check(&state).is_err());
    }

    #[test]
    fn off_screen_unread_must_be_notified() {
        let state = StateSnapshot::empty().with_chat(key(1), unread_chat());
        let result = UnreadOffScreenIsNotified.check(&state);
        assert!(result.unwrap_err().message.contains("not notified"));

        let state = state.with_notification([key(1)]);
        assert!(UnreadOffScreenIsNotified.check(&state).is_ok());
    }

    #[test]
    fn on_screen_and_own_unread_need_no_notification() {
        let on_screen = ChatState { on_screen: true, ..unread_chat() };
        let own = ChatState { notifiable_unread: 0, ..unread_chat() };
        let state = StateSnapshot::empty().with_chat(key(1), on_screen).with_chat(key(2), own);
        assert!(UnreadOffScreenIsNotified.check(&state).is_ok());
    }
}
