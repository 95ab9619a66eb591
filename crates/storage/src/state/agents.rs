// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent and user-principal rows.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, Transaction};
use thrum_core::{Agent, AgentKind, Event, LogRecord, TokenId};

use super::State;
use crate::db::StateError;

pub(crate) fn apply(tx: &Transaction, record: &LogRecord) -> Result<(), StateError> {
    let ts = record.timestamp.to_rfc3339();
    match &record.event {
        Event::AgentRegister { agent_id, kind, role, module, display, hostname } => {
            let kind = match kind {
                AgentKind::Agent => "agent",
                AgentKind::User => "user",
            };
            tx.execute(
                "INSERT INTO agents (agent_id, kind, role, module, display, hostname, registered_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(agent_id) DO UPDATE SET
                     role = excluded.role,
                     module = excluded.module,
                     display = excluded.display,
                     hostname = excluded.hostname,
                     last_seen_at = excluded.last_seen_at",
                params![agent_id, kind, role, module, display, hostname, ts],
            )?;
        }

        Event::UserRegister { user_id, display, token } => {
            tx.execute(
                "INSERT INTO agents (agent_id, kind, role, module, display, registered_at, last_seen_at)
                 VALUES (?1, 'user', '', '', ?2, ?3, ?3)
                 ON CONFLICT(agent_id) DO UPDATE SET
                     display = excluded.display,
                     last_seen_at = excluded.last_seen_at",
                params![user_id, display, ts],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO user_tokens (token, user_id, created_at) VALUES (?1, ?2, ?3)",
                params![token.as_str(), user_id, ts],
            )?;
        }

        _ => {}
    }
    Ok(())
}

pub(crate) fn row_to_agent(row: &Row) -> rusqlite::Result<Agent> {
    let kind: String = row.get("kind")?;
    Ok(Agent {
        agent_id: row.get("agent_id")?,
        kind: if kind == "user" { AgentKind::User } else { AgentKind::Agent },
        role: row.get("role")?,
        module: row.get("module")?,
        display: row.get("display")?,
        hostname: row.get("hostname")?,
        registered_at: parse_ts(row, "registered_at")?,
        last_seen_at: parse_ts(row, "last_seen_at")?,
    })
}

pub(crate) fn parse_ts(row: &Row, col: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(col)?;
    Ok(parse_rfc3339(&raw))
}

pub(crate) fn parse_opt_ts(row: &Row, col: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(col)?;
    Ok(raw.map(|s| parse_rfc3339(&s)))
}

fn parse_rfc3339(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Filters for `agent.list`.
#[derive(Debug, Default, Clone)]
pub struct AgentFilter {
    pub role: Option<String>,
    pub module: Option<String>,
    /// Only agents seen within this many seconds of `now`.
    pub active_within_secs: Option<u64>,
}

impl State {
    pub fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>, StateError> {
        self.db().with_read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT * FROM agents WHERE agent_id = ?1",
                    [agent_id],
                    row_to_agent,
                )
                .optional()?)
        })
    }

    pub fn agent_exists(&self, agent_id: &str) -> Result<bool, StateError> {
        Ok(self.get_agent(agent_id)?.is_some())
    }

    /// Any registered agent carries this role?
    pub fn role_in_use(&self, role: &str) -> Result<bool, StateError> {
        self.db().with_read(|conn| {
            let count: u32 = conn.query_row(
                "SELECT COUNT(*) FROM agents WHERE role = ?1 AND role != ''",
                [role],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn list_agents(
        &self,
        filter: &AgentFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Agent>, StateError> {
        self.db().with_read(|conn| {
            let mut sql = String::from("SELECT * FROM agents WHERE 1=1");
            let mut args: Vec<String> = Vec::new();
            if let Some(role) = &filter.role {
                sql.push_str(" AND role = ?");
                args.push(role.clone());
            }
            if let Some(module) = &filter.module {
                sql.push_str(" AND module = ?");
                args.push(module.clone());
            }
            if let Some(secs) = filter.active_within_secs {
                let cutoff = now - chrono::Duration::seconds(secs as i64);
                sql.push_str(" AND last_seen_at >= ?");
                args.push(cutoff.to_rfc3339());
            }
            sql.push_str(" ORDER BY agent_id");
            let mut stmt = conn.prepare(&sql)?;
            let agents = stmt
                .query_map(rusqlite::params_from_iter(args.iter()), row_to_agent)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(agents)
        })
    }

    /// Remove an agent and its sessions from the local projection.
    ///
    /// There is no corresponding event: deletion is operational cleanup
    /// on this machine, and replay resurrects the registration.
    pub fn delete_agent_local(&self, agent_id: &str) -> Result<(), StateError> {
        self.db().with_write(|tx| {
            tx.execute(
                "DELETE FROM subscriptions WHERE session_id IN
                     (SELECT session_id FROM sessions WHERE agent_id = ?1)",
                [agent_id],
            )?;
            tx.execute("DELETE FROM work_contexts WHERE session_id IN
                     (SELECT session_id FROM sessions WHERE agent_id = ?1)", [agent_id])?;
            tx.execute("DELETE FROM sessions WHERE agent_id = ?1", [agent_id])?;
            tx.execute("DELETE FROM agents WHERE agent_id = ?1", [agent_id])?;
            Ok(())
        })
    }

    /// Resolve a bearer token to its user ID.
    pub fn user_for_token(&self, token: &TokenId) -> Result<Option<String>, StateError> {
        self.db().with_read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT user_id FROM user_tokens WHERE token = ?1",
                    [token.as_str()],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }
}
