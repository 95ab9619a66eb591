// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thread rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Transaction};
use thrum_core::{Event, LogRecord, Thread, ThreadId};

use super::agents::parse_ts;
use super::messages::{load_tags, row_to_message};
use super::State;
use crate::db::StateError;

pub(crate) fn apply(tx: &Transaction, record: &LogRecord) -> Result<(), StateError> {
    if let Event::ThreadCreate { thread_id, title, created_by } = &record.event {
        tx.execute(
            "INSERT OR IGNORE INTO threads (thread_id, title, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![thread_id.as_str(), title, created_by, record.timestamp.to_rfc3339()],
        )?;
    }
    Ok(())
}

/// A thread with its aggregate activity, for `thread.list`.
#[derive(Debug, Clone)]
pub struct ThreadSummary {
    pub thread: Thread,
    pub message_count: u64,
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl State {
    pub fn get_thread(&self, thread_id: &ThreadId) -> Result<Option<Thread>, StateError> {
        self.db().with_read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT * FROM threads WHERE thread_id = ?1",
                    [thread_id.as_str()],
                    |row| {
                        Ok(Thread {
                            thread_id: ThreadId::from_string(row.get::<_, String>("thread_id")?),
                            title: row.get("title")?,
                            created_by: row.get("created_by")?,
                            created_at: parse_ts(row, "created_at")?,
                        })
                    },
                )
                .optional()?)
        })
    }

    pub fn list_threads(&self) -> Result<Vec<ThreadSummary>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT t.*,
                        (SELECT COUNT(*) FROM messages m
                            WHERE m.thread_id = t.thread_id AND m.deleted_at IS NULL) AS message_count,
                        (SELECT MAX(m.created_at) FROM messages m
                            WHERE m.thread_id = t.thread_id AND m.deleted_at IS NULL) AS last_activity
                 FROM threads t ORDER BY t.created_at",
            )?;
            let threads = stmt
                .query_map([], |row| {
                    let last_activity: Option<String> = row.get("last_activity")?;
                    Ok(ThreadSummary {
                        thread: Thread {
                            thread_id: ThreadId::from_string(row.get::<_, String>("thread_id")?),
                            title: row.get("title")?,
                            created_by: row.get("created_by")?,
                            created_at: parse_ts(row, "created_at")?,
                        },
                        message_count: row.get("message_count")?,
                        last_activity_at: last_activity.and_then(|s| {
                            DateTime::parse_from_rfc3339(&s)
                                .map(|t| t.with_timezone(&Utc))
                                .ok()
                        }),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(threads)
        })
    }

    /// Messages in a thread in creation order, soft-deleted excluded.
    pub fn thread_messages(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Vec<thrum_core::Message>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM messages
                 WHERE thread_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at, message_id",
            )?;
            let rows = stmt
                .query_map([thread_id.as_str()], row_to_message)?
                .collect::<Result<Vec<_>, _>>()?;
            let mut messages = rows;
            for message in &mut messages {
                load_tags(conn, message)?;
            }
            Ok(messages)
        })
    }
}
