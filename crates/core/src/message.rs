// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages and their scope/ref tags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{MessageId, SessionId, ThreadId};

/// Scope type used for group addressing (`group/{name}`).
pub const SCOPE_GROUP: &str = "group";

/// Ref type for direct mentions. Values are agent *names* only.
pub const REF_MENTION: &str = "mention";

/// Ref type linking a message to the one it replies to.
pub const REF_REPLY: &str = "reply";

/// Ref type carrying a worktree path; on sessions it drives work-context
/// extraction during heartbeats.
pub const REF_WORKTREE: &str = "worktree";

/// Body format of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    #[default]
    Markdown,
    Plain,
    Json,
}

/// Message priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// A `{type, value}` tag. Scopes and refs share this shape; scopes are
/// addressing (`group`, `module`, `task`), refs are associative links
/// (`mention`, `pr`, `file`, `reply`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "type")]
    pub tag_type: String,
    pub value: String,
}

impl Tag {
    pub fn new(tag_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self { tag_type: tag_type.into(), value: value.into() }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(SCOPE_GROUP, name)
    }

    pub fn mention(name: impl Into<String>) -> Self {
        Self::new(REF_MENTION, name)
    }
}

/// Message body: format tag, text content, optional structured payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default)]
    pub format: BodyFormat,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<serde_json::Value>,
}

impl MessageBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self { format: BodyFormat::default(), content: content.into(), structured: None }
    }
}

/// A stored message. Append-only apart from the edit counter and the
/// soft-delete metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    pub agent_id: String,
    pub session_id: SessionId,
    pub body: MessageBody,
    pub created_at: DateTime<Utc>,
    /// Edit counter: absent until the first edit, then incremented per edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_reason: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Set only when a user impersonated an agent; the impersonator's ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authored_by: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<Tag>,
}

impl Message {
    /// The identity allowed to edit or delete this message: the
    /// impersonator when one is recorded, otherwise the author agent.
    pub fn owner(&self) -> &str {
        self.authored_by.as_deref().unwrap_or(&self.agent_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True when the message carries no addressing at all: no scopes and
    /// no mention refs. Such messages route as legacy broadcasts.
    pub fn is_broadcast(&self) -> bool {
        self.scopes.is_empty() && !self.refs.iter().any(|r| r.tag_type == REF_MENTION)
    }

    /// First `n` characters of the content, for notification previews.
    pub fn preview(&self, n: usize) -> &str {
        let content = &self.body.content;
        match content.char_indices().nth(n) {
            Some((idx, _)) => &content[..idx],
            None => content,
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
