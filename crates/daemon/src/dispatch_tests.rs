// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use thrum_core::{
    AgentKind, Event, LogRecord, MessageBody, MessageId, Priority, Tag,
};
use thrum_storage::SubscriptionKind;
use tokio::sync::mpsc;

fn test_state() -> (tempfile::TempDir, Arc<State>) {
    let dir = tempfile::tempdir().unwrap();
    let state =
        State::open(dir.path().join("a-sync"), dir.path().join("messages.db")).unwrap();
    (dir, Arc::new(state))
}

fn commit(state: &State, event: Event) {
    state.commit(&LogRecord::new(chrono::Utc::now(), event)).unwrap();
}

fn setup_agent(state: &State, name: &str) -> SessionId {
    commit(
        state,
        Event::AgentRegister {
            agent_id: name.to_string(),
            kind: AgentKind::Agent,
            role: "agent".to_string(),
            module: "m".to_string(),
            display: None,
            hostname: None,
        },
    );
    let session_id = SessionId::new();
    commit(state, Event::SessionStart { session_id, agent_id: name.to_string() });
    session_id
}

fn stored_message(
    state: &State,
    author: &str,
    session: SessionId,
    content: &str,
    scopes: Vec<Tag>,
    refs: Vec<Tag>,
    thread_id: Option<thrum_core::ThreadId>,
) -> Message {
    let message_id = MessageId::new();
    commit(
        state,
        Event::MessageCreate {
            message_id,
            thread_id,
            reply_to: None,
            agent_id: author.to_string(),
            session_id: session,
            body: MessageBody::text(content),
            priority: Priority::Normal,
            authored_by: None,
            scopes,
            refs,
        },
    );
    state.get_message(&message_id).unwrap().unwrap()
}

fn subscription(id: i64, session_id: SessionId, kind: SubscriptionKind) -> Subscription {
    Subscription { id, session_id, kind }
}

#[test]
fn match_order_is_all_scope_mention() {
    let session = SessionId::new();
    let message = Message {
        message_id: MessageId::new(),
        thread_id: None,
        reply_to: None,
        agent_id: "furiosa".to_string(),
        session_id: SessionId::new(),
        body: MessageBody::text("hi"),
        created_at: chrono::Utc::now(),
        updated_at: None,
        deleted_at: None,
        delete_reason: None,
        priority: Priority::Normal,
        authored_by: None,
        scopes: vec![Tag::group("war_boy")],
        refs: vec![Tag::mention("nux")],
    };

    let all = subscription(1, session, SubscriptionKind::All);
    assert_eq!(match_subscription(&all, &message), Some("all"));

    let scope = subscription(2, session, SubscriptionKind::Scope(Tag::group("war_boy")));
    assert_eq!(match_subscription(&scope, &message), Some("scope"));

    let wrong_scope = subscription(3, session, SubscriptionKind::Scope(Tag::group("other")));
    assert_eq!(match_subscription(&wrong_scope, &message), None);

    let mention = subscription(4, session, SubscriptionKind::Mention("nux".to_string()));
    assert_eq!(match_subscription(&mention, &message), Some("mention"));

    let wrong_mention = subscription(5, session, SubscriptionKind::Mention("slit".to_string()));
    assert_eq!(match_subscription(&wrong_mention, &message), None);
}

#[tokio::test]
async fn matched_subscription_receives_envelope() {
    let (_dir, state) = test_state();
    let registry = Arc::new(ClientRegistry::new());

    let author_session = setup_agent(&state, "furiosa");
    let nux_session = setup_agent(&state, "nux");
    state
        .add_subscription(&nux_session, &SubscriptionKind::All, chrono::Utc::now())
        .unwrap();

    let (tx, mut rx) = mpsc::channel(crate::registry::OUTBOUND_QUEUE);
    let conn_id = registry.register(tx);
    registry.bind_session(conn_id, nux_session);

    let message = stored_message(
        &state,
        "furiosa",
        author_session,
        "Auth module complete",
        vec![],
        vec![],
        None,
    );

    let mut dispatcher = Dispatcher::new(Arc::clone(&state), Arc::clone(&registry));
    dispatcher.dispatch(&message);

    let frame = rx.recv().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["method"], NOTIFY_MESSAGE);
    assert_eq!(value["params"]["preview"], "Auth module complete");
    assert_eq!(value["params"]["author"], "furiosa");
    assert_eq!(value["params"]["matched_subscription"]["match_type"], "all");
}

#[tokio::test]
async fn overflow_unregisters_connection() {
    let (_dir, state) = test_state();
    let registry = Arc::new(ClientRegistry::new());

    let author_session = setup_agent(&state, "furiosa");
    let nux_session = setup_agent(&state, "nux");
    state
        .add_subscription(&nux_session, &SubscriptionKind::All, chrono::Utc::now())
        .unwrap();

    // Tiny queue that is never drained.
    let (tx, _rx) = mpsc::channel(1);
    let conn_id = registry.register(tx);
    registry.bind_session(conn_id, nux_session);

    let mut dispatcher = Dispatcher::new(Arc::clone(&state), Arc::clone(&registry));
    let first = stored_message(&state, "furiosa", author_session, "one", vec![], vec![], None);
    let second = stored_message(&state, "furiosa", author_session, "two", vec![], vec![], None);
    dispatcher.dispatch(&first);
    dispatcher.dispatch(&second);

    // The second dispatch overflowed the queue and dropped the client.
    assert_eq!(registry.connection_count(), 0);
}

#[tokio::test]
async fn no_notification_for_ended_session() {
    let (_dir, state) = test_state();
    let registry = Arc::new(ClientRegistry::new());

    let author_session = setup_agent(&state, "furiosa");
    let nux_session = setup_agent(&state, "nux");
    state
        .add_subscription(&nux_session, &SubscriptionKind::All, chrono::Utc::now())
        .unwrap();
    commit(
        &state,
        Event::SessionEnd {
            session_id: nux_session,
            agent_id: "nux".to_string(),
            reason: thrum_core::EndReason::Normal,
        },
    );

    let (tx, mut rx) = mpsc::channel(crate::registry::OUTBOUND_QUEUE);
    let conn_id = registry.register(tx);
    registry.bind_session(conn_id, nux_session);

    let message = stored_message(&state, "furiosa", author_session, "late", vec![], vec![], None);
    let mut dispatcher = Dispatcher::new(Arc::clone(&state), Arc::clone(&registry));
    dispatcher.dispatch(&message);

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn first_thread_delivery_sends_companion() {
    let (_dir, state) = test_state();
    let registry = Arc::new(ClientRegistry::new());

    let author_session = setup_agent(&state, "furiosa");
    let nux_session = setup_agent(&state, "nux");
    state
        .add_subscription(&nux_session, &SubscriptionKind::All, chrono::Utc::now())
        .unwrap();

    let (tx, mut rx) = mpsc::channel(crate::registry::OUTBOUND_QUEUE);
    let conn_id = registry.register(tx);
    registry.bind_session(conn_id, nux_session);

    let thread_id = thrum_core::ThreadId::new();
    commit(
        &state,
        Event::ThreadCreate {
            thread_id,
            title: "rollout".to_string(),
            created_by: "furiosa".to_string(),
        },
    );

    let mut dispatcher = Dispatcher::new(Arc::clone(&state), Arc::clone(&registry));
    let first = stored_message(
        &state, "furiosa", author_session, "t1", vec![], vec![], Some(thread_id),
    );
    dispatcher.dispatch(&first);

    let methods: Vec<String> = [rx.recv().await.unwrap(), rx.recv().await.unwrap()]
        .iter()
        .map(|frame| {
            serde_json::from_str::<serde_json::Value>(frame).unwrap()["method"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(methods, vec![NOTIFY_MESSAGE, NOTIFY_THREAD_UPDATED]);

    // Second message in the same thread: no companion.
    let second = stored_message(
        &state, "furiosa", author_session, "t2", vec![], vec![], Some(thread_id),
    );
    dispatcher.dispatch(&second);
    let frame = rx.recv().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(value["method"], NOTIFY_MESSAGE);
    assert!(rx.try_recv().is_err());
}
