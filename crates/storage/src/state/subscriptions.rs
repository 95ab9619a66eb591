// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriptions. Local-only; they die with their session.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use thrum_core::{SessionId, Tag};

use super::State;
use crate::db::StateError;

/// Exactly one discriminator per subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Every committed message.
    All,
    /// Messages carrying this scope.
    Scope(Tag),
    /// Messages with a mention ref equal to this value (an agent name,
    /// or a legacy role string).
    Mention(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub session_id: SessionId,
    pub kind: SubscriptionKind,
}

fn row_to_subscription(row: &Row) -> rusqlite::Result<Subscription> {
    let scope_type: Option<String> = row.get("scope_type")?;
    let scope_value: Option<String> = row.get("scope_value")?;
    let mention_role: Option<String> = row.get("mention_role")?;
    let all: bool = row.get("all_messages")?;
    let kind = if all {
        SubscriptionKind::All
    } else if let Some(mention) = mention_role {
        SubscriptionKind::Mention(mention)
    } else {
        SubscriptionKind::Scope(Tag {
            tag_type: scope_type.unwrap_or_default(),
            value: scope_value.unwrap_or_default(),
        })
    };
    Ok(Subscription {
        id: row.get("id")?,
        session_id: SessionId::from_string(row.get::<_, String>("session_id")?),
        kind,
    })
}

impl State {
    /// Create a subscription, or return the existing ID when the same
    /// session already holds an identical one.
    pub fn add_subscription(
        &self,
        session_id: &SessionId,
        kind: &SubscriptionKind,
        now: DateTime<Utc>,
    ) -> Result<i64, StateError> {
        let (scope_type, scope_value, mention, all) = match kind {
            SubscriptionKind::All => (None, None, None, true),
            SubscriptionKind::Scope(tag) => {
                (Some(tag.tag_type.clone()), Some(tag.value.clone()), None, false)
            }
            SubscriptionKind::Mention(value) => (None, None, Some(value.clone()), false),
        };
        self.db().with_write(|tx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM subscriptions WHERE session_id = ?1
                     AND scope_type IS ?2 AND scope_value IS ?3
                     AND mention_role IS ?4 AND all_messages = ?5",
                    params![session_id.as_str(), scope_type, scope_value, mention, all],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                return Ok(id);
            }
            tx.execute(
                "INSERT INTO subscriptions
                     (session_id, scope_type, scope_value, mention_role, all_messages, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session_id.as_str(),
                    scope_type,
                    scope_value,
                    mention,
                    all,
                    now.to_rfc3339()
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    pub fn get_subscription(&self, id: i64) -> Result<Option<Subscription>, StateError> {
        self.db().with_read(|conn| {
            Ok(conn
                .query_row("SELECT * FROM subscriptions WHERE id = ?1", [id], row_to_subscription)
                .optional()?)
        })
    }

    pub fn remove_subscription(&self, id: i64) -> Result<(), StateError> {
        self.db().with_write(|tx| {
            tx.execute("DELETE FROM subscriptions WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    pub fn subscriptions_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Subscription>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt =
                conn.prepare("SELECT * FROM subscriptions WHERE session_id = ?1 ORDER BY id")?;
            let subs = stmt
                .query_map([session_id.as_str()], row_to_subscription)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(subs)
        })
    }

    /// Every subscription whose owning session is still open, in ID
    /// order. The dispatcher walks this after each commit.
    pub fn active_subscriptions(&self) -> Result<Vec<Subscription>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT sub.* FROM subscriptions sub
                 JOIN sessions s ON s.session_id = sub.session_id
                 WHERE s.ended_at IS NULL ORDER BY sub.id",
            )?;
            let subs = stmt
                .query_map([], row_to_subscription)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(subs)
        })
    }
}
