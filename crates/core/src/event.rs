// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable event set and its on-disk record format.
//!
//! Every durable state change is one of these events, appended as a single
//! JSON line before the SQLite projection is touched. The set is closed:
//! an unknown `type` tag is a replay error, not an extension point, so the
//! log and the projection can never silently diverge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentKind;
use crate::group::GroupMember;
use crate::id::{GroupId, MessageId, SessionId, ThreadId, TokenId};
use crate::message::{MessageBody, Priority, Tag};
use crate::session::EndReason;

/// Current record version, written as `v` on every line.
pub const EVENT_VERSION: u32 = 1;

/// Events that mutate durable state.
///
/// Serializes with `{"type": "event.name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- agent --
    #[serde(rename = "agent.register")]
    AgentRegister {
        agent_id: String,
        kind: AgentKind,
        role: String,
        module: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hostname: Option<String>,
    },

    #[serde(rename = "agent.session.start")]
    SessionStart { session_id: SessionId, agent_id: String },

    #[serde(rename = "agent.session.end")]
    SessionEnd {
        session_id: SessionId,
        agent_id: String,
        reason: EndReason,
    },

    /// Liveness plus optional intent/task updates. Also emitted by
    /// `session.setIntent` / `session.setTask`.
    #[serde(rename = "agent.session.heartbeat")]
    SessionHeartbeat {
        session_id: SessionId,
        agent_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_task: Option<String>,
    },

    /// Batch close of idle sessions, recorded once per swept agent.
    #[serde(rename = "agent.cleanup")]
    AgentCleanup {
        agent_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        session_ids: Vec<SessionId>,
    },

    // -- message --
    #[serde(rename = "message.create")]
    MessageCreate {
        message_id: MessageId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thread_id: Option<ThreadId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<MessageId>,
        agent_id: String,
        session_id: SessionId,
        body: MessageBody,
        #[serde(default)]
        priority: Priority,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        authored_by: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        scopes: Vec<Tag>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        refs: Vec<Tag>,
    },

    #[serde(rename = "message.edit")]
    MessageEdit {
        message_id: MessageId,
        /// Author shard this message lives in (the original author).
        agent_id: String,
        content: String,
    },

    #[serde(rename = "message.delete")]
    MessageDelete {
        message_id: MessageId,
        agent_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    // -- thread --
    #[serde(rename = "thread.create")]
    ThreadCreate {
        thread_id: ThreadId,
        title: String,
        created_by: String,
    },

    // -- group --
    #[serde(rename = "group.create")]
    GroupCreate {
        group_id: GroupId,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        created_by: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        members: Vec<GroupMember>,
    },

    #[serde(rename = "group.member.add")]
    GroupMemberAdd { group: String, member: GroupMember },

    #[serde(rename = "group.member.remove")]
    GroupMemberRemove { group: String, member: GroupMember },

    // -- user --
    #[serde(rename = "user.register")]
    UserRegister {
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display: Option<String>,
        token: TokenId,
    },

    // -- sync --
    #[serde(rename = "sync.checkpoint")]
    SyncCheckpoint {
        peer: String,
        shard: String,
        offset: u64,
    },
}

impl Event {
    /// The author shard a message event belongs to, or `None` for events
    /// that go to `events.jsonl`.
    pub fn message_shard(&self) -> Option<&str> {
        match self {
            Event::MessageCreate { agent_id, .. }
            | Event::MessageEdit { agent_id, .. }
            | Event::MessageDelete { agent_id, .. } => Some(agent_id),
            _ => None,
        }
    }
}

/// One line of the event log: envelope fields plus the flattened event.
///
/// `event_id` is a bare ULID; replay merges all shards and sorts by it,
/// which recovers commit order across files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub event_id: String,
    pub v: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl LogRecord {
    pub fn new(timestamp: DateTime<Utc>, event: Event) -> Self {
        Self {
            event_id: crate::id::event_id(),
            v: EVENT_VERSION,
            timestamp,
            event,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
