//! Integration tests for the Dispatcher state machine.
//!
//! # Oracle Pattern
//!
//! Tests end with oracle checks that verify:
//! - The exact signals emitted for each event
//! - Unread counts and read times in the published snapshot
//! - Whether a notification is showing

use chrono::TimeZone;
use tocks_app::{DispatchError, Dispatcher, Event, Signal};
use tocks_core::{
    Account, AccountId, ChatId, ChatInfo, ChatKey, ChatStoreError, Message, MessageId,
    NotificationBatch, Status, Timestamp, UserId,
};

const ALICE: AccountId = AccountId(1);
const CAROL: AccountId = AccountId(2);
const BOB: ChatId = ChatId(7);
const DAVE: ChatId = ChatId(8);

fn ts(secs: i64) -> Timestamp {
    chrono::Utc.timestamp_opt(secs, 0).single().unwrap()
}

fn login(dispatcher: &mut Dispatcher, account: AccountId, name: &str, chats: &[(ChatId, &str)]) {
    let chats = chats
        .iter()
        .map(|(chat, peer)| {
            ChatInfo::friend(ChatKey::new(account, *chat), UserId(chat.0), *peer)
        })
        .collect();
    dispatcher
        .handle(Event::AccountLoggedIn {
            account: Account::new(account, UserId(account.0 * 100), name),
            chats,
            last_read_times: vec![],
        })
        .unwrap();
}

/// Alice logged in with a single chat with bob.
fn alice_and_bob() -> Dispatcher {
    let mut dispatcher = Dispatcher::default();
    login(&mut dispatcher, ALICE, "alice", &[(BOB, "bob")]);
    dispatcher
}

fn from_peer(chat: ChatId, id: u64, body: &str, secs: i64) -> Message {
    Message::new(MessageId(id), UserId(chat.0), body, ts(secs))
}

fn receive(dispatcher: &mut Dispatcher, account: AccountId, chat: ChatId, message: Message) -> Vec<Signal> {
    dispatcher.handle(Event::MessageReceived { account, chat, message }).unwrap()
}

fn mark_read(dispatcher: &mut Dispatcher, account: AccountId, chat: ChatId, secs: i64) -> Vec<Signal> {
    dispatcher.handle(Event::ChatMarkedRead { account, chat, time: ts(secs) }).unwrap()
}

fn requested(signals: &[Signal]) -> Option<&NotificationBatch> {
    signals.iter().find_map(|s| match s {
        Signal::NotificationRequested(batch) => Some(batch),
        _ => None,
    })
}

#[test]
fn received_message_notifies_and_counts() {
    let mut dispatcher = alice_and_bob();
    let message = from_peer(BOB, 1, "Hello!", 10);

    let signals = receive(&mut dispatcher, ALICE, BOB, message.clone());

    assert_eq!(signals.len(), 4);
    assert_eq!(signals[0], Signal::PersistMessage { account: ALICE, chat: BOB, message });
    assert_eq!(
        signals[1],
        Signal::MessageArrived { account: ALICE, chat: BOB, timestamp: ts(10), foreground: false }
    );
    assert_eq!(signals[2], Signal::UnreadCountChanged { account: ALICE, chat: BOB, count: 1 });

    let batch = requested(&signals).unwrap();
    assert_eq!(batch.title, "Message received from bob");
    assert_eq!(batch.body, "Hello!");

    // ORACLE: snapshot agrees
    let snapshot = dispatcher.snapshot();
    assert!(snapshot.is_unread(ChatKey::new(ALICE, BOB)));
    assert_eq!(snapshot.unread_count(ChatKey::new(ALICE, BOB)), 1);
    assert!(snapshot.notification().is_some());
}

#[test]
fn reading_everything_dismisses_notification() {
    let mut dispatcher = alice_and_bob();
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "Hello!", 10));

    let signals = mark_read(&mut dispatcher, ALICE, BOB, 10);

    assert_eq!(
        signals,
        vec![
            Signal::PersistReadState { account: ALICE, chat: BOB, time: ts(10) },
            Signal::UnreadCountChanged { account: ALICE, chat: BOB, count: 0 },
            Signal::NotificationDismissed,
        ]
    );
    assert!(dispatcher.notification().is_none());
}

#[test]
fn partial_read_updates_shown_notification_silently() {
    let mut dispatcher = alice_and_bob();
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "first", 10));
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 2, "second", 20));

    let signals = mark_read(&mut dispatcher, ALICE, BOB, 10);

    assert_eq!(
        signals,
        vec![
            Signal::PersistReadState { account: ALICE, chat: BOB, time: ts(10) },
            Signal::UnreadCountChanged { account: ALICE, chat: BOB, count: 1 },
        ]
    );
    let shown = dispatcher.notification().unwrap();
    assert_eq!(shown.title, "Message received from bob");
    assert_eq!(shown.body, "second");
}

#[test]
fn stale_and_repeated_mark_read_emit_nothing() {
    let mut dispatcher = alice_and_bob();
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "Hello!", 10));
    mark_read(&mut dispatcher, ALICE, BOB, 10);

    assert!(mark_read(&mut dispatcher, ALICE, BOB, 10).is_empty());
    assert!(mark_read(&mut dispatcher, ALICE, BOB, 5).is_empty());
    assert_eq!(dispatcher.reads().last_read(ChatKey::new(ALICE, BOB)), Some(ts(10)));
}

#[test]
fn foreground_chat_does_not_notify() {
    let mut dispatcher = alice_and_bob();
    let key = ChatKey::new(ALICE, BOB);
    let signals = dispatcher
        .handle(Event::VisibilityChanged { window_visible: true, active_chat: Some(key) })
        .unwrap();
    assert!(signals.is_empty());

    let signals = receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "Hello!", 10));

    assert!(requested(&signals).is_none());
    assert!(signals.contains(&Signal::MessageArrived {
        account: ALICE,
        chat: BOB,
        timestamp: ts(10),
        foreground: true,
    }));
    assert!(signals.contains(&Signal::UnreadCountChanged { account: ALICE, chat: BOB, count: 1 }));
}

#[test]
fn hiding_window_notifies_unread_foreground_message() {
    let mut dispatcher = alice_and_bob();
    let key = ChatKey::new(ALICE, BOB);
    dispatcher
        .handle(Event::VisibilityChanged { window_visible: true, active_chat: Some(key) })
        .unwrap();
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "Hello!", 10));
    assert!(dispatcher.notification().is_none());

    let signals = dispatcher
        .handle(Event::VisibilityChanged { window_visible: false, active_chat: None })
        .unwrap();

    let batch = requested(&signals).unwrap();
    assert_eq!(batch.title, "Message received from bob");
    assert!(batch.contains(key, MessageId(1)));

    // ORACLE: once read, the notification goes away
    let signals = mark_read(&mut dispatcher, ALICE, BOB, 10);
    assert!(signals.contains(&Signal::NotificationDismissed));
}

#[test]
fn switching_chats_notifies_only_newly_uncovered_messages() {
    let mut dispatcher = Dispatcher::default();
    login(&mut dispatcher, ALICE, "alice", &[(BOB, "bob"), (DAVE, "dave")]);
    let bob = ChatKey::new(ALICE, BOB);
    let dave = ChatKey::new(ALICE, DAVE);
    dispatcher
        .handle(Event::VisibilityChanged { window_visible: true, active_chat: Some(bob) })
        .unwrap();
    receive(&mut dispatcher, ALICE, DAVE, from_peer(DAVE, 1, "from dave", 10));
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 2, "from bob", 20));

    // bob's message was on screen and now is not
    let signals = dispatcher
        .handle(Event::VisibilityChanged { window_visible: true, active_chat: Some(dave) })
        .unwrap();
    let batch = requested(&signals).unwrap();
    assert!(batch.contains(bob, MessageId(2)));
    assert!(!batch.contains(dave, MessageId(1)));

    // repeating the same state uncovers nothing new
    let signals = dispatcher
        .handle(Event::VisibilityChanged { window_visible: true, active_chat: Some(dave) })
        .unwrap();
    assert!(requested(&signals).is_none());
}

#[test]
fn hidden_window_notifies_even_for_active_chat() {
    let mut dispatcher = alice_and_bob();
    let key = ChatKey::new(ALICE, BOB);
    dispatcher
        .handle(Event::VisibilityChanged { window_visible: false, active_chat: Some(key) })
        .unwrap();

    let signals = receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "Hello!", 10));

    assert!(requested(&signals).is_some());
}

#[test]
fn duplicate_delivery_is_idempotent() {
    let mut dispatcher = alice_and_bob();
    let message = from_peer(BOB, 1, "Hello!", 10);
    receive(&mut dispatcher, ALICE, BOB, message.clone());

    let signals = receive(&mut dispatcher, ALICE, BOB, message);

    assert!(signals.is_empty());
    assert_eq!(dispatcher.chats().chat(ChatKey::new(ALICE, BOB)).unwrap().messages().len(), 1);
}

#[test]
fn late_message_is_stored_in_id_order() {
    let mut dispatcher = alice_and_bob();
    let key = ChatKey::new(ALICE, BOB);
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 3, "third", 30));

    let signals = receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 2, "second", 20));

    assert!(signals.contains(&Signal::UnreadCountChanged { account: ALICE, chat: BOB, count: 2 }));
    assert_eq!(requested(&signals).unwrap().title, "2 messages received from bob");

    let chat = dispatcher.chats().chat(key).unwrap();
    let ids: Vec<MessageId> = chat.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![MessageId(2), MessageId(3)]);
    assert!(chat.is_out_of_order(MessageId(2)));
    assert_eq!(chat.last_message_time(), Some(ts(30)));
}

#[test]
fn sent_message_marks_chat_read() {
    let mut dispatcher = alice_and_bob();
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "ping", 10));
    let sent = Message::new(MessageId(2), UserId(100), "pong", ts(20)).pending();

    let signals = dispatcher
        .handle(Event::MessageSent { account: ALICE, chat: BOB, message: sent.clone() })
        .unwrap();

    assert_eq!(
        signals,
        vec![
            Signal::PersistMessage { account: ALICE, chat: BOB, message: sent },
            Signal::PersistReadState { account: ALICE, chat: BOB, time: ts(20) },
            Signal::UnreadCountChanged { account: ALICE, chat: BOB, count: 0 },
            Signal::NotificationDismissed,
        ]
    );
}

#[test]
fn completion_persists_updated_message_once() {
    let mut dispatcher = alice_and_bob();
    let sent = Message::new(MessageId(1), UserId(100), "pong", ts(20)).pending();
    dispatcher.handle(Event::MessageSent { account: ALICE, chat: BOB, message: sent }).unwrap();

    let signals = dispatcher
        .handle(Event::MessageCompleted { account: ALICE, chat: BOB, message: MessageId(1) })
        .unwrap();

    let done = Message::new(MessageId(1), UserId(100), "pong", ts(20));
    assert_eq!(signals, vec![Signal::PersistMessage { account: ALICE, chat: BOB, message: done }]);

    let again = dispatcher
        .handle(Event::MessageCompleted { account: ALICE, chat: BOB, message: MessageId(1) })
        .unwrap();
    assert!(again.is_empty());
}

#[test]
fn completing_unknown_message_is_rejected() {
    let mut dispatcher = alice_and_bob();
    let result =
        dispatcher.handle(Event::MessageCompleted { account: ALICE, chat: BOB, message: MessageId(9) });

    assert_eq!(
        result,
        Err(DispatchError::Store(ChatStoreError::UnknownMessage {
            chat: ChatKey::new(ALICE, BOB),
            message: MessageId(9),
        }))
    );
}

#[test]
fn replayed_history_notifies_without_persisting() {
    let mut dispatcher = alice_and_bob();
    let history = vec![from_peer(BOB, 1, "one", 10), from_peer(BOB, 2, "two", 20)];

    let signals = dispatcher
        .handle(Event::HistoryLoaded { account: ALICE, chat: BOB, messages: history.clone() })
        .unwrap();

    assert_eq!(signals.len(), 3);
    assert_eq!(
        signals[0],
        Signal::MessagesLoaded { account: ALICE, chat: BOB, messages: vec![MessageId(1), MessageId(2)] }
    );
    assert_eq!(signals[1], Signal::UnreadCountChanged { account: ALICE, chat: BOB, count: 2 });
    let batch = requested(&signals).unwrap();
    assert_eq!(batch.title, "2 messages received from bob");
    assert_eq!(batch.body, "one\ntwo");

    // ORACLE: replaying the same chunk again adds nothing
    let again = dispatcher
        .handle(Event::HistoryLoaded { account: ALICE, chat: BOB, messages: history })
        .unwrap();
    assert_eq!(again, vec![Signal::MessagesLoaded { account: ALICE, chat: BOB, messages: vec![] }]);
}

#[test]
fn login_merges_durable_read_times() {
    let mut dispatcher = Dispatcher::default();
    let key = ChatKey::new(ALICE, BOB);

    let signals = dispatcher
        .handle(Event::AccountLoggedIn {
            account: Account::new(ALICE, UserId(100), "alice"),
            chats: vec![ChatInfo::friend(key, UserId(7), "bob")],
            last_read_times: vec![(BOB, ts(50)), (ChatId(99), ts(60))],
        })
        .unwrap();

    assert_eq!(signals, vec![Signal::LoadHistory { account: ALICE, chat: BOB, since: ts(50) }]);
    assert_eq!(dispatcher.reads().last_read(key), Some(ts(50)));
    assert!(!dispatcher.reads().is_pending(key));
    assert_eq!(dispatcher.reads().last_read(ChatKey::new(ALICE, ChatId(99))), None);
}

#[test]
fn superseded_write_completion_is_ignored() {
    let mut dispatcher = alice_and_bob();
    let key = ChatKey::new(ALICE, BOB);
    mark_read(&mut dispatcher, ALICE, BOB, 10);
    mark_read(&mut dispatcher, ALICE, BOB, 20);

    let signals = dispatcher
        .handle(Event::ReadStatePersisted { account: ALICE, chat: BOB, time: ts(10) })
        .unwrap();

    assert!(signals.is_empty());
    assert_eq!(dispatcher.reads().last_read(key), Some(ts(20)));
    assert!(dispatcher.reads().is_pending(key));

    dispatcher.handle(Event::ReadStatePersisted { account: ALICE, chat: BOB, time: ts(20) }).unwrap();
    assert!(!dispatcher.reads().is_pending(key));
    assert_eq!(dispatcher.reads().durable(key), Some(ts(20)));
}

#[test]
fn failed_write_surfaces_degraded_state() {
    let mut dispatcher = alice_and_bob();
    mark_read(&mut dispatcher, ALICE, BOB, 10);

    let signals = dispatcher
        .handle(Event::PersistenceFailed {
            account: ALICE,
            chat: BOB,
            time: ts(10),
            attempts: 5,
            reason: "disk full".into(),
        })
        .unwrap();

    assert_eq!(
        signals,
        vec![Signal::PersistenceDegraded {
            account: ALICE,
            chat: BOB,
            time: ts(10),
            attempts: 5,
            reason: "disk full".into(),
        }]
    );
    // In-memory read time stays ahead of storage.
    assert_eq!(dispatcher.reads().last_read(ChatKey::new(ALICE, BOB)), Some(ts(10)));
    assert!(dispatcher.reads().is_pending(ChatKey::new(ALICE, BOB)));
}

#[test]
fn presence_change_is_reported_once() {
    let mut dispatcher = alice_and_bob();
    let event = Event::PresenceChanged { account: ALICE, chat: BOB, status: Status::Online };

    let signals = dispatcher.handle(event.clone()).unwrap();
    assert_eq!(
        signals,
        vec![Signal::PresenceChanged { account: ALICE, chat: BOB, status: Status::Online }]
    );
    assert!(dispatcher.handle(event).unwrap().is_empty());
}

#[test]
fn first_contact_creates_chat() {
    let mut dispatcher = alice_and_bob();
    // Key account is rewritten to the owning account.
    let info = ChatInfo::friend(ChatKey::new(AccountId(42), DAVE), UserId(8), "dave");

    let signals = dispatcher.handle(Event::FriendAdded { account: ALICE, chat: info }).unwrap();

    assert!(signals.is_empty());
    assert!(dispatcher.chats().contains(ChatKey::new(ALICE, DAVE)));
    assert!(!dispatcher.chats().contains(ChatKey::new(AccountId(42), DAVE)));
}

#[test]
fn removing_unread_friend_dismisses_notification() {
    let mut dispatcher = alice_and_bob();
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "Hello!", 10));

    let signals = dispatcher.handle(Event::FriendRemoved { account: ALICE, chat: BOB }).unwrap();

    assert_eq!(
        signals,
        vec![
            Signal::UnreadCountChanged { account: ALICE, chat: BOB, count: 0 },
            Signal::NotificationDismissed,
        ]
    );
    assert!(!dispatcher.chats().contains(ChatKey::new(ALICE, BOB)));

    let again = dispatcher.handle(Event::FriendRemoved { account: ALICE, chat: BOB });
    assert_eq!(
        again,
        Err(DispatchError::Store(ChatStoreError::UnknownChat(ChatKey::new(ALICE, BOB))))
    );
}

#[test]
fn multiple_accounts_share_one_notification() {
    let mut dispatcher = alice_and_bob();
    login(&mut dispatcher, CAROL, "carol", &[(DAVE, "dave")]);

    let first = receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "Hello!", 10));
    let batch = requested(&first).unwrap();
    assert_eq!(batch.title, "Message received from bob for alice");
    assert_eq!(batch.body, "Hello!");

    let second = receive(&mut dispatcher, CAROL, DAVE, from_peer(DAVE, 1, "Hey", 20));
    let batch = requested(&second).unwrap();
    assert_eq!(batch.title, "Messages received for multiple accounts");
    assert_eq!(
        batch.body,
        "Message received from bob for alice\nMessage received from dave for carol"
    );
}

#[test]
fn logout_drops_account_state() {
    let mut dispatcher = alice_and_bob();
    login(&mut dispatcher, CAROL, "carol", &[(DAVE, "dave")]);
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "Hello!", 10));
    receive(&mut dispatcher, CAROL, DAVE, from_peer(DAVE, 1, "Hey", 20));

    let signals = dispatcher.handle(Event::AccountLoggedOut { account: CAROL }).unwrap();

    assert_eq!(signals, vec![Signal::UnreadCountChanged { account: CAROL, chat: DAVE, count: 0 }]);
    assert!(!dispatcher.accounts().contains_key(&CAROL));
    assert!(!dispatcher.chats().contains(ChatKey::new(CAROL, DAVE)));

    // ORACLE: remaining notification covers alice only and drops the suffix
    let shown = dispatcher.notification().unwrap();
    assert_eq!(shown.title, "Message received from bob");
}

#[test]
fn own_messages_never_notify() {
    let mut dispatcher = alice_and_bob();
    let own = Message::new(MessageId(1), UserId(100), "note to self", ts(10));

    let signals = receive(&mut dispatcher, ALICE, BOB, own);

    assert!(requested(&signals).is_none());
    assert!(signals.contains(&Signal::UnreadCountChanged { account: ALICE, chat: BOB, count: 1 }));
}

#[test]
fn events_for_unknown_account_are_rejected() {
    let mut dispatcher = alice_and_bob();
    let result = dispatcher.handle(Event::MessageReceived {
        account: CAROL,
        chat: BOB,
        message: from_peer(BOB, 1, "hi", 10),
    });

    assert_eq!(result, Err(DispatchError::UnknownAccount(CAROL)));
    assert_eq!(dispatcher.unread_count(ChatKey::new(ALICE, BOB)), 0);
}

#[test]
fn notification_follows_two_account_conversation() {
    let mut dispatcher = alice_and_bob();
    login(&mut dispatcher, CAROL, "carol", &[(DAVE, "dave")]);

    let steps = [
        receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 1, "Hello!", 10)),
        receive(&mut dispatcher, CAROL, DAVE, from_peer(DAVE, 1, "Hey", 20)),
        mark_read(&mut dispatcher, ALICE, BOB, 10),
        receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 2, "Again", 30)),
        mark_read(&mut dispatcher, CAROL, DAVE, 20),
        mark_read(&mut dispatcher, ALICE, BOB, 30),
    ];

    let trace: Vec<String> = steps
        .iter()
        .enumerate()
        .map(|(i, signals)| {
            let shown: Vec<String> = signals
                .iter()
                .filter_map(|s| match s {
                    Signal::NotificationRequested(batch) => Some(format!(
                        "requested: {} | {}",
                        batch.title,
                        batch.body.replace('\n', " / ")
                    )),
                    Signal::NotificationDismissed => Some("dismissed".to_string()),
                    _ => None,
                })
                .collect();
            let shown = if shown.is_empty() { "-".to_string() } else { shown.join(", ") };
            format!("{} {shown}", i + 1)
        })
        .collect();

    insta::assert_snapshot!(trace.join("\n"), @r"
    1 requested: Message received from bob for alice | Hello!
    2 requested: Messages received for multiple accounts | Message received from bob for alice / Message received from dave for carol
    3 -
    4 requested: Messages received for multiple accounts | Message received from bob for alice / Message received from dave for carol
    5 -
    6 dismissed
    ");
}

#[test]
fn load_messages_pages_before_oldest_loaded() {
    let mut dispatcher = alice_and_bob();
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 40, "forty", 40));
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 41, "forty-one", 41));

    let signals = dispatcher
        .handle(Event::LoadMessages { account: ALICE, chat: BOB, before: None, limit: 20 })
        .unwrap();
    assert_eq!(
        signals,
        vec![Signal::LoadPage { account: ALICE, chat: BOB, before: Some(MessageId(40)), limit: 20 }]
    );

    let signals = dispatcher
        .handle(Event::LoadMessages {
            account: ALICE,
            chat: BOB,
            before: Some(MessageId(10)),
            limit: 5,
        })
        .unwrap();
    assert_eq!(
        signals,
        vec![Signal::LoadPage { account: ALICE, chat: BOB, before: Some(MessageId(10)), limit: 5 }]
    );
}

#[test]
fn load_messages_for_unknown_chat_is_rejected() {
    let mut dispatcher = alice_and_bob();

    let result = dispatcher.handle(Event::LoadMessages {
        account: ALICE,
        chat: DAVE,
        before: None,
        limit: 20,
    });

    assert_eq!(
        result,
        Err(DispatchError::Store(ChatStoreError::UnknownChat(ChatKey::new(ALICE, DAVE))))
    );
}

#[test]
fn older_read_page_merges_without_notifying() {
    let mut dispatcher = alice_and_bob();
    receive(&mut dispatcher, ALICE, BOB, from_peer(BOB, 40, "forty", 40));
    mark_read(&mut dispatcher, ALICE, BOB, 40);
    let key = ChatKey::new(ALICE, BOB);
    assert!(dispatcher.notification().is_none());

    let page = vec![from_peer(BOB, 38, "old", 38), from_peer(BOB, 39, "older", 39)];
    let signals = dispatcher
        .handle(Event::HistoryLoaded { account: ALICE, chat: BOB, messages: page })
        .unwrap();

    // ORACLE: merged ids are reported, nothing becomes unread
    assert_eq!(
        signals,
        vec![Signal::MessagesLoaded {
            account: ALICE,
            chat: BOB,
            messages: vec![MessageId(38), MessageId(39)],
        }]
    );
    let ids: Vec<u64> =
        dispatcher.chats().chat(key).unwrap().messages().iter().map(|m| m.id.0).collect();
    assert_eq!(ids, vec![38, 39, 40]);
    assert_eq!(dispatcher.unread_count(key), 0);
}

#[test]
fn empty_page_reports_start_of_history() {
    let mut dispatcher = alice_and_bob();

    let signals = dispatcher
        .handle(Event::HistoryLoaded { account: ALICE, chat: BOB, messages: vec![] })
        .unwrap();

    assert_eq!(signals, vec![Signal::MessagesLoaded { account: ALICE, chat: BOB, messages: vec![] }]);
}

#[test]
fn empty_sent_message_is_rejected() {
    let mut dispatcher = alice_and_bob();
    let key = ChatKey::new(ALICE, BOB);
    let message = Message::new(MessageId(1), UserId(100), "", ts(10)).pending();

    let result = dispatcher.handle(Event::MessageSent { account: ALICE, chat: BOB, message });

    assert_eq!(result, Err(DispatchError::EmptyMessage(key)));
    assert!(dispatcher.chats().chat(key).unwrap().messages().is_empty());
    assert_eq!(dispatcher.reads().last_read(key), None);
}
