// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session read records. Local-only: never logged, never replayed.

use chrono::{DateTime, Utc};
use rusqlite::params;
use thrum_core::{MessageId, SessionId};

use super::State;
use crate::db::StateError;

impl State {
    /// Record that a session read a message. Idempotent: the second mark
    /// from the same session is a no-op.
    pub fn mark_read(
        &self,
        message_id: &MessageId,
        session_id: &SessionId,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        self.db().with_write(|tx| {
            tx.execute(
                "INSERT OR IGNORE INTO message_reads (message_id, session_id, agent_id, read_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![message_id.as_str(), session_id.as_str(), agent_id, now.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Distinct agents with any read row for this message.
    pub fn also_read_by(&self, message_id: &MessageId) -> Result<Vec<String>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT agent_id FROM message_reads
                 WHERE message_id = ?1 ORDER BY agent_id",
            )?;
            let agents = stmt
                .query_map([message_id.as_str()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(agents)
        })
    }

    /// A message is read by an agent if any of that agent's sessions
    /// recorded a read.
    pub fn is_read_by(&self, message_id: &MessageId, agent_id: &str) -> Result<bool, StateError> {
        self.db().with_read(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM message_reads WHERE message_id = ?1 AND agent_id = ?2",
                params![message_id.as_str(), agent_id],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }
}
