// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the projected state, organized per entity.

mod messages_tests;
mod reads_tests;
mod subscriptions_tests;

use chrono::Utc;
use thrum_core::{
    AgentKind, EndReason, Event, GroupId, GroupMember, LogRecord, MessageBody, MessageId,
    Priority, SessionId, Tag,
};

use crate::state::State;

pub(crate) fn test_state() -> (tempfile::TempDir, State) {
    let dir = tempfile::tempdir().unwrap();
    let state = State::open(dir.path().join("a-sync"), dir.path().join("messages.db")).unwrap();
    (dir, state)
}

pub(crate) fn commit(state: &State, event: Event) -> LogRecord {
    let record = LogRecord::new(Utc::now(), event);
    state.commit(&record).unwrap();
    record
}

pub(crate) fn register(state: &State, name: &str, role: &str, module: &str) {
    commit(
        state,
        Event::AgentRegister {
            agent_id: name.to_string(),
            kind: AgentKind::Agent,
            role: role.to_string(),
            module: module.to_string(),
            display: None,
            hostname: None,
        },
    );
    // Role groups are auto-created on first appearance of a role.
    if !role.is_empty() && state.group_by_name(role).unwrap().is_none() {
        commit(
            state,
            Event::GroupCreate {
                group_id: GroupId::new(),
                name: role.to_string(),
                description: None,
                created_by: "daemon".to_string(),
                members: vec![GroupMember::role(role)],
            },
        );
    }
}

pub(crate) fn start_session(state: &State, agent: &str) -> SessionId {
    let session_id = SessionId::new();
    commit(
        state,
        Event::SessionStart { session_id, agent_id: agent.to_string() },
    );
    session_id
}

pub(crate) fn end_session(state: &State, agent: &str, session_id: SessionId, reason: EndReason) {
    commit(
        state,
        Event::SessionEnd { session_id, agent_id: agent.to_string(), reason },
    );
}

pub(crate) fn send_message(
    state: &State,
    author: &str,
    session_id: SessionId,
    content: &str,
    scopes: Vec<Tag>,
    refs: Vec<Tag>,
) -> MessageId {
    let message_id = MessageId::new();
    commit(
        state,
        Event::MessageCreate {
            message_id,
            thread_id: None,
            reply_to: None,
            agent_id: author.to_string(),
            session_id,
            body: MessageBody::text(content),
            priority: Priority::Normal,
            authored_by: None,
            scopes,
            refs,
        },
    );
    message_id
}
