// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message rows, scope/ref tags, and the `for_agent` routing predicate.

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use thrum_core::{
    BodyFormat, Event, LogRecord, Message, MessageBody, MessageId, Priority, SessionId, Tag,
    ThreadId,
};

use super::agents::{parse_opt_ts, parse_ts};
use super::State;
use crate::db::StateError;

pub(crate) fn apply(tx: &Transaction, record: &LogRecord) -> Result<(), StateError> {
    let ts = record.timestamp.to_rfc3339();
    match &record.event {
        Event::MessageCreate {
            message_id,
            thread_id,
            reply_to,
            agent_id,
            session_id,
            body,
            priority,
            authored_by,
            scopes,
            refs,
        } => {
            let format = match body.format {
                BodyFormat::Markdown => "markdown",
                BodyFormat::Plain => "plain",
                BodyFormat::Json => "json",
            };
            let structured = body
                .structured
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            let priority = match priority {
                Priority::Low => "low",
                Priority::Normal => "normal",
                Priority::High => "high",
            };
            tx.execute(
                "INSERT OR IGNORE INTO messages
                     (message_id, thread_id, reply_to, agent_id, session_id,
                      format, content, structured, created_at, priority, authored_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    message_id.as_str(),
                    thread_id.as_ref().map(|t| t.as_str()),
                    reply_to.as_ref().map(|r| r.as_str()),
                    agent_id,
                    session_id.as_str(),
                    format,
                    body.content,
                    structured,
                    ts,
                    priority,
                    authored_by,
                ],
            )?;
            for scope in scopes {
                tx.execute(
                    "INSERT INTO message_scopes (message_id, scope_type, value) VALUES (?1, ?2, ?3)",
                    params![message_id.as_str(), scope.tag_type, scope.value],
                )?;
            }
            for r in refs {
                tx.execute(
                    "INSERT INTO message_refs (message_id, ref_type, value) VALUES (?1, ?2, ?3)",
                    params![message_id.as_str(), r.tag_type, r.value],
                )?;
            }
        }

        Event::MessageEdit { message_id, content, .. } => {
            tx.execute(
                "UPDATE messages SET content = ?2, updated_at = COALESCE(updated_at, 0) + 1
                 WHERE message_id = ?1",
                params![message_id.as_str(), content],
            )?;
        }

        Event::MessageDelete { message_id, reason, .. } => {
            tx.execute(
                "UPDATE messages SET deleted_at = ?2, delete_reason = ?3
                 WHERE message_id = ?1 AND deleted_at IS NULL",
                params![message_id.as_str(), ts, reason],
            )?;
        }

        _ => {}
    }
    Ok(())
}

/// Sort key for `message.list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filter set for `message.list`. Everything is conjunctive.
#[derive(Debug, Default, Clone)]
pub struct MessageFilter {
    pub thread_id: Option<ThreadId>,
    pub author: Option<String>,
    pub scope: Option<Tag>,
    pub reference: Option<Tag>,
    pub mentions: Option<String>,
    /// Routing predicate: direct mention ∨ group membership ∨ broadcast.
    pub for_agent: Option<String>,
    /// Enables the role arm of group membership.
    pub for_agent_role: Option<String>,
    pub unread_only: bool,
    pub include_deleted: bool,
    /// Drop messages authored by this caller.
    pub exclude_self: Option<String>,
    /// Identity whose read rows drive `is_read` and the unread count.
    pub reader: Option<String>,
    pub sort: SortKey,
    pub order: SortOrder,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// One page of listed messages plus the unread count over the whole
/// filtered set.
#[derive(Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub read_flags: Vec<bool>,
    pub unread: u64,
    pub total: u64,
}

/// The disjunction at the heart of routing. Parameterized on the agent
/// name (twice) and role; wildcard membership applies regardless of role.
const FOR_AGENT_SQL: &str = "(
    EXISTS (SELECT 1 FROM message_refs fr
            WHERE fr.message_id = m.message_id
              AND fr.ref_type = 'mention' AND fr.value = ?)
    OR EXISTS (SELECT 1 FROM message_scopes fs
               JOIN groups fg ON fg.name = fs.value
               JOIN group_members fgm ON fgm.group_id = fg.group_id
               WHERE fs.message_id = m.message_id AND fs.scope_type = 'group'
                 AND ((fgm.member_type = 'agent' AND fgm.member_value = ?)
                   OR (fgm.member_type = 'role'
                       AND (fgm.member_value = '*' OR fgm.member_value = ?))))
    OR (NOT EXISTS (SELECT 1 FROM message_scopes bs WHERE bs.message_id = m.message_id)
        AND NOT EXISTS (SELECT 1 FROM message_refs br
                        WHERE br.message_id = m.message_id AND br.ref_type = 'mention'))
)";

fn build_where(filter: &MessageFilter) -> (String, Vec<String>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<String> = Vec::new();

    if let Some(thread_id) = &filter.thread_id {
        clauses.push("m.thread_id = ?".into());
        args.push(thread_id.to_string());
    }
    if let Some(author) = &filter.author {
        clauses.push("m.agent_id = ?".into());
        args.push(author.clone());
    }
    if let Some(scope) = &filter.scope {
        clauses.push(
            "EXISTS (SELECT 1 FROM message_scopes s WHERE s.message_id = m.message_id
                 AND s.scope_type = ? AND s.value = ?)"
                .into(),
        );
        args.push(scope.tag_type.clone());
        args.push(scope.value.clone());
    }
    if let Some(reference) = &filter.reference {
        clauses.push(
            "EXISTS (SELECT 1 FROM message_refs r WHERE r.message_id = m.message_id
                 AND r.ref_type = ? AND r.value = ?)"
                .into(),
        );
        args.push(reference.tag_type.clone());
        args.push(reference.value.clone());
    }
    if let Some(mentions) = &filter.mentions {
        clauses.push(
            "EXISTS (SELECT 1 FROM message_refs r WHERE r.message_id = m.message_id
                 AND r.ref_type = 'mention' AND r.value = ?)"
                .into(),
        );
        args.push(mentions.clone());
    }
    if let Some(agent) = &filter.for_agent {
        clauses.push(FOR_AGENT_SQL.into());
        args.push(agent.clone());
        args.push(agent.clone());
        // An empty role matches no role-typed member; wildcard still applies.
        args.push(filter.for_agent_role.clone().unwrap_or_default());
    }
    if filter.unread_only {
        clauses.push(
            "NOT EXISTS (SELECT 1 FROM message_reads ur WHERE ur.message_id = m.message_id
                 AND ur.agent_id = ?)"
                .into(),
        );
        args.push(reader_id(filter));
    }
    if !filter.include_deleted {
        clauses.push("m.deleted_at IS NULL".into());
    }
    if let Some(caller) = &filter.exclude_self {
        clauses.push("m.agent_id != ?".into());
        args.push(caller.clone());
    }

    let where_sql = if clauses.is_empty() {
        "1=1".to_string()
    } else {
        clauses.join(" AND ")
    };
    (where_sql, args)
}

/// The identity whose read rows answer `is_read`: an explicit reader, or
/// the routed-to agent.
fn reader_id(filter: &MessageFilter) -> String {
    filter
        .reader
        .clone()
        .or_else(|| filter.for_agent.clone())
        .unwrap_or_default()
}

pub(crate) fn row_to_message(row: &Row) -> rusqlite::Result<Message> {
    let format: String = row.get("format")?;
    let structured: Option<String> = row.get("structured")?;
    let priority: String = row.get("priority")?;
    let thread_id: Option<String> = row.get("thread_id")?;
    let reply_to: Option<String> = row.get("reply_to")?;
    Ok(Message {
        message_id: MessageId::from_string(row.get::<_, String>("message_id")?),
        thread_id: thread_id.map(ThreadId::from_string),
        reply_to: reply_to.map(MessageId::from_string),
        agent_id: row.get("agent_id")?,
        session_id: SessionId::from_string(row.get::<_, String>("session_id")?),
        body: MessageBody {
            format: match format.as_str() {
                "plain" => BodyFormat::Plain,
                "json" => BodyFormat::Json,
                _ => BodyFormat::Markdown,
            },
            content: row.get("content")?,
            structured: structured.and_then(|s| serde_json::from_str(&s).ok()),
        },
        created_at: parse_ts(row, "created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: parse_opt_ts(row, "deleted_at")?,
        delete_reason: row.get("delete_reason")?,
        priority: match priority.as_str() {
            "low" => Priority::Low,
            "high" => Priority::High,
            _ => Priority::Normal,
        },
        authored_by: row.get("authored_by")?,
        scopes: Vec::new(),
        refs: Vec::new(),
    })
}

pub(crate) fn load_tags(conn: &Connection, message: &mut Message) -> Result<(), StateError> {
    let mut stmt = conn.prepare(
        "SELECT scope_type, value FROM message_scopes WHERE message_id = ?1",
    )?;
    message.scopes = stmt
        .query_map([message.message_id.as_str()], |row| {
            Ok(Tag { tag_type: row.get(0)?, value: row.get(1)? })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt =
        conn.prepare("SELECT ref_type, value FROM message_refs WHERE message_id = ?1")?;
    message.refs = stmt
        .query_map([message.message_id.as_str()], |row| {
            Ok(Tag { tag_type: row.get(0)?, value: row.get(1)? })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(())
}

impl State {
    pub fn get_message(&self, message_id: &MessageId) -> Result<Option<Message>, StateError> {
        self.db().with_read(|conn| {
            let message = conn
                .query_row(
                    "SELECT * FROM messages WHERE message_id = ?1",
                    [message_id.as_str()],
                    row_to_message,
                )
                .optional()?;
            match message {
                Some(mut message) => {
                    load_tags(conn, &mut message)?;
                    Ok(Some(message))
                }
                None => Ok(None),
            }
        })
    }

    pub fn list_messages(&self, filter: &MessageFilter) -> Result<MessagePage, StateError> {
        let page_size = match filter.page_size {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        let page = filter.page.max(1);
        let offset = (page - 1) as u64 * page_size as u64;

        let (where_sql, args) = build_where(filter);
        let reader = reader_id(filter);

        let sort_col = match filter.sort {
            SortKey::CreatedAt => "m.created_at",
            SortKey::UpdatedAt => "m.updated_at",
        };
        let sort_dir = match filter.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        self.db().with_read(|conn| {
            // is_read flag leads the param list; WHERE params follow.
            let sql = format!(
                "SELECT m.*, EXISTS (SELECT 1 FROM message_reads mr
                     WHERE mr.message_id = m.message_id AND mr.agent_id = ?) AS is_read
                 FROM messages m WHERE {where_sql}
                 ORDER BY {sort_col} {sort_dir}, m.message_id {sort_dir}
                 LIMIT {page_size} OFFSET {offset}"
            );
            let mut all_args = vec![reader.clone()];
            all_args.extend(args.iter().cloned());

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(all_args.iter()), |row| {
                    let message = row_to_message(row)?;
                    let is_read: bool = row.get("is_read")?;
                    Ok((message, is_read))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut messages = Vec::with_capacity(rows.len());
            let mut read_flags = Vec::with_capacity(rows.len());
            for (mut message, is_read) in rows {
                load_tags(conn, &mut message)?;
                messages.push(message);
                read_flags.push(is_read);
            }

            let total: u64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM messages m WHERE {where_sql}"),
                rusqlite::params_from_iter(args.iter()),
                |row| row.get(0),
            )?;

            let unread_sql = format!(
                "SELECT COUNT(*) FROM messages m WHERE {where_sql}
                 AND NOT EXISTS (SELECT 1 FROM message_reads mr
                     WHERE mr.message_id = m.message_id AND mr.agent_id = ?)"
            );
            let mut unread_args = args.clone();
            unread_args.push(reader);
            let unread: u64 = conn.query_row(
                &unread_sql,
                rusqlite::params_from_iter(unread_args.iter()),
                |row| row.get(0),
            )?;

            Ok(MessagePage { messages, read_flags, unread, total })
        })
    }
}
