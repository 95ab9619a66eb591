// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session rows: start, end, heartbeat, cleanup.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use thrum_core::{EndReason, Event, LogRecord, Session, SessionId};

use super::agents::{parse_opt_ts, parse_ts};
use super::State;
use crate::db::StateError;

pub(crate) fn apply(tx: &Transaction, record: &LogRecord) -> Result<(), StateError> {
    let ts = record.timestamp.to_rfc3339();
    match &record.event {
        Event::SessionStart { session_id, agent_id } => {
            tx.execute(
                "INSERT OR IGNORE INTO sessions (session_id, agent_id, started_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![session_id.as_str(), agent_id, ts],
            )?;
            touch_agent(tx, agent_id, &ts)?;
        }

        Event::SessionEnd { session_id, agent_id, reason } => {
            close_session(tx, session_id, *reason, &ts)?;
            touch_agent(tx, agent_id, &ts)?;
        }

        Event::SessionHeartbeat { session_id, agent_id, intent, current_task } => {
            tx.execute(
                "UPDATE sessions SET last_seen_at = ?2 WHERE session_id = ?1",
                params![session_id.as_str(), ts],
            )?;
            if let Some(intent) = intent {
                tx.execute(
                    "UPDATE sessions SET intent = ?2, intent_updated_at = ?3 WHERE session_id = ?1",
                    params![session_id.as_str(), intent, ts],
                )?;
            }
            if let Some(task) = current_task {
                tx.execute(
                    "UPDATE sessions SET current_task = ?2, task_updated_at = ?3 WHERE session_id = ?1",
                    params![session_id.as_str(), task, ts],
                )?;
            }
            touch_agent(tx, agent_id, &ts)?;
        }

        Event::AgentCleanup { session_ids, .. } => {
            for session_id in session_ids {
                close_session(tx, session_id, EndReason::Crash, &ts)?;
            }
        }

        _ => {}
    }
    Ok(())
}

fn close_session(
    tx: &Transaction,
    session_id: &SessionId,
    reason: EndReason,
    ts: &str,
) -> Result<(), StateError> {
    tx.execute(
        "UPDATE sessions SET ended_at = ?2, end_reason = ?3
         WHERE session_id = ?1 AND ended_at IS NULL",
        params![session_id.as_str(), ts, reason.to_string()],
    )?;
    // Subscriptions die with their session.
    tx.execute(
        "DELETE FROM subscriptions WHERE session_id = ?1",
        [session_id.as_str()],
    )?;
    Ok(())
}

fn touch_agent(tx: &Transaction, agent_id: &str, ts: &str) -> Result<(), StateError> {
    tx.execute(
        "UPDATE agents SET last_seen_at = ?2 WHERE agent_id = ?1",
        params![agent_id, ts],
    )?;
    Ok(())
}

pub(crate) fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
    let end_reason: Option<String> = row.get("end_reason")?;
    Ok(Session {
        session_id: SessionId::from_string(row.get::<_, String>("session_id")?),
        agent_id: row.get("agent_id")?,
        started_at: parse_ts(row, "started_at")?,
        ended_at: parse_opt_ts(row, "ended_at")?,
        end_reason: end_reason.as_deref().map(|r| match r {
            "crash" => EndReason::Crash,
            "superseded" => EndReason::Superseded,
            _ => EndReason::Normal,
        }),
        last_seen_at: parse_ts(row, "last_seen_at")?,
        intent: row.get("intent")?,
        intent_updated_at: parse_opt_ts(row, "intent_updated_at")?,
        current_task: row.get("current_task")?,
        task_updated_at: parse_opt_ts(row, "task_updated_at")?,
    })
}

impl State {
    pub fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, StateError> {
        self.db().with_read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT * FROM sessions WHERE session_id = ?1",
                    [session_id.as_str()],
                    row_to_session,
                )
                .optional()?)
        })
    }

    /// All still-open sessions for an agent, oldest first.
    pub fn open_sessions_for(&self, agent_id: &str) -> Result<Vec<Session>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM sessions WHERE agent_id = ?1 AND ended_at IS NULL
                 ORDER BY started_at",
            )?;
            let sessions = stmt
                .query_map([agent_id], row_to_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
    }

    /// The newest open session for an agent, if any. Message attribution
    /// resolves the caller through this.
    pub fn active_session_for(&self, agent_id: &str) -> Result<Option<Session>, StateError> {
        self.db().with_read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT * FROM sessions WHERE agent_id = ?1 AND ended_at IS NULL
                     ORDER BY started_at DESC LIMIT 1",
                    [agent_id],
                    row_to_session,
                )
                .optional()?)
        })
    }

    pub fn list_sessions(
        &self,
        agent_id: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<Session>, StateError> {
        self.db().with_read(|conn| {
            let mut sql = String::from("SELECT * FROM sessions WHERE 1=1");
            let mut args: Vec<String> = Vec::new();
            if let Some(agent_id) = agent_id {
                sql.push_str(" AND agent_id = ?");
                args.push(agent_id.to_string());
            }
            if active_only {
                sql.push_str(" AND ended_at IS NULL");
            }
            sql.push_str(" ORDER BY started_at DESC");
            let mut stmt = conn.prepare(&sql)?;
            let sessions = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), row_to_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
    }

    /// Open sessions not seen since `cutoff`, for `agent.cleanup`.
    pub fn idle_open_sessions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM sessions WHERE ended_at IS NULL AND last_seen_at < ?1
                 ORDER BY agent_id, started_at",
            )?;
            let sessions = stmt
                .query_map([cutoff.to_rfc3339()], row_to_session)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(sessions)
        })
    }

    /// Aggregate counts for `health`.
    pub fn health_counts(&self) -> Result<(u64, u64), StateError> {
        self.db().with_read(|conn| {
            let agents: u64 =
                conn.query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))?;
            let open_sessions: u64 = conn.query_row(
                "SELECT COUNT(*) FROM sessions WHERE ended_at IS NULL",
                [],
                |row| row.get(0),
            )?;
            Ok((agents, open_sessions))
        })
    }
}
