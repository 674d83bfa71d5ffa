//! Property tests for the chat store and read-state tracker.

use chrono::TimeZone;
use proptest::prelude::*;
use tocks_core::{
    AccountId, ChatId, ChatInfo, ChatKey, ChatStore, MarkRead, Message, MessageId,
    ReadStateTracker, Timestamp, UserId,
};

fn ts(secs: i64) -> Timestamp {
    chrono::Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

fn key() -> ChatKey {
    ChatKey::new(AccountId(1), ChatId(1))
}

fn arb_messages() -> impl Strategy<Value = Vec<(u64, i64)>> {
    prop::collection::vec((1u64..50, 0i64..10_000), 0..64)
}

/// Long histories with late ids, spanning several log chunks.
fn arb_long_history() -> impl Strategy<Value = Vec<(u64, i64)>> {
    prop::collection::vec((1u64..2_000, 0i64..10_000), 100..400)
}

proptest! {
    #[test]
    fn prop_append_keeps_sorted_unique_ids(messages in arb_messages()) {
        let mut store = ChatStore::new();
        store.upsert_chat(ChatInfo::friend(key(), UserId(2), "peer"));

        for (id, secs) in &messages {
            let message = Message::new(MessageId(*id), UserId(2), "m", ts(*secs));
            store.append(key(), message).expect("known chat");
        }

        let chat = store.chat(key()).expect("chat exists");
        let ids: Vec<MessageId> = chat.messages().iter().map(|m| m.id).collect();
        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));

        let max = chat.messages().iter().map(|m| m.timestamp).max();
        prop_assert_eq!(chat.last_message_time(), max);
    }

    #[test]
    fn prop_long_history_matches_sorted_dedup(messages in arb_long_history()) {
        let mut store = ChatStore::new();
        store.upsert_chat(ChatInfo::friend(key(), UserId(2), "peer"));
        let mut expected = std::collections::BTreeSet::new();

        for (id, secs) in &messages {
            let message = Message::new(MessageId(*id), UserId(2), "m", ts(*secs));
            let stored = store.append(key(), message).expect("known chat").is_stored();
            prop_assert_eq!(stored, expected.insert(*id));
        }

        let chat = store.chat(key()).expect("chat exists");
        let ids: Vec<u64> = chat.messages().iter().map(|m| m.id.0).collect();
        prop_assert_eq!(ids, expected.iter().copied().collect::<Vec<_>>());
        for id in &expected {
            prop_assert!(chat.message(MessageId(*id)).is_some());
        }
    }

    #[test]
    fn prop_replay_is_idempotent(messages in arb_messages()) {
        let mut once = ChatStore::new();
        let mut twice = ChatStore::new();
        for store in [&mut once, &mut twice] {
            store.upsert_chat(ChatInfo::friend(key(), UserId(2), "peer"));
        }

        for (id, secs) in &messages {
            let message = Message::new(MessageId(*id), UserId(2), "m", ts(*secs));
            once.append(key(), message.clone()).expect("known chat");
            twice.append(key(), message.clone()).expect("known chat");
            twice.append(key(), message).expect("known chat");
        }

        let once = once.chat(key()).expect("chat exists");
        let twice = twice.chat(key()).expect("chat exists");
        prop_assert_eq!(once.messages(), twice.messages());
        prop_assert_eq!(once.unread_count(Timestamp::MIN_UTC), twice.unread_count(Timestamp::MIN_UTC));
    }

    #[test]
    fn prop_read_time_never_decreases(marks in prop::collection::vec(0i64..10_000, 1..64)) {
        let mut tracker = ReadStateTracker::new();
        let mut high = None;

        for secs in marks {
            let outcome = tracker.mark_read(key(), ts(secs));
            let expected_advance = high.is_none_or(|h| ts(secs) > h);
            prop_assert_eq!(outcome.advanced(), expected_advance);
            if expected_advance {
                high = Some(ts(secs));
            }
            prop_assert_eq!(tracker.last_read(key()), high);
            let stale_below_mark =
                matches!(outcome, MarkRead::Stale { current } if current < ts(secs));
            prop_assert!(!stale_below_mark);
        }
    }

    #[test]
    fn prop_unread_iff_newer_message(
        messages in arb_messages(),
        read_at in 0i64..10_000,
    ) {
        let mut store = ChatStore::new();
        store.upsert_chat(ChatInfo::friend(key(), UserId(2), "peer"));
        for (id, secs) in &messages {
            let message = Message::new(MessageId(*id), UserId(2), "m", ts(*secs));
            store.append(key(), message).expect("known chat");
        }

        let chat = store.chat(key()).expect("chat exists");
        let unread = chat.is_unread(ts(read_at));
        prop_assert_eq!(unread, chat.last_message_time().is_some_and(|t| t > ts(read_at)));
        prop_assert_eq!(unread, chat.unread_count(ts(read_at)) > 0);
    }
}
