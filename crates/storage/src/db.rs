// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite projection database: open, migrate, single-writer discipline.
//!
//! All mutating statements funnel through one connection behind a mutex;
//! readers take connections from a separate pool and see WAL snapshots.
//! Downgrade is unsupported: a database ahead of this binary refuses to
//! open.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, Transaction};
use thiserror::Error;

use crate::log::LogError;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("log error: {0}")]
    Log(#[from] LogError),

    #[error("database schema v{0} is newer than this daemon supports (v{1})")]
    SchemaTooNew(u32, u32),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),
}

/// Numbered forward-only migrations. Index 0 is schema version 1.
const MIGRATIONS: &[&str] = &[
    // v1: base schema. Foreign keys are declared but the engine pragma
    // stays off so replay may ingest out-of-order partial state.
    r#"
    CREATE TABLE agents (
        agent_id      TEXT PRIMARY KEY,
        kind          TEXT NOT NULL DEFAULT 'agent',
        role          TEXT NOT NULL DEFAULT '',
        module        TEXT NOT NULL DEFAULT '',
        display       TEXT,
        hostname      TEXT,
        registered_at TEXT NOT NULL,
        last_seen_at  TEXT NOT NULL
    );
    CREATE TABLE sessions (
        session_id   TEXT PRIMARY KEY,
        agent_id     TEXT NOT NULL REFERENCES agents(agent_id),
        started_at   TEXT NOT NULL,
        ended_at     TEXT,
        end_reason   TEXT,
        last_seen_at TEXT NOT NULL
    );
    CREATE TABLE threads (
        thread_id  TEXT PRIMARY KEY,
        title      TEXT NOT NULL,
        created_by TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE messages (
        message_id    TEXT PRIMARY KEY,
        thread_id     TEXT REFERENCES threads(thread_id),
        reply_to      TEXT REFERENCES messages(message_id),
        agent_id      TEXT NOT NULL REFERENCES agents(agent_id),
        session_id    TEXT NOT NULL REFERENCES sessions(session_id),
        format        TEXT NOT NULL DEFAULT 'markdown',
        content       TEXT NOT NULL,
        structured    TEXT,
        created_at    TEXT NOT NULL,
        updated_at    INTEGER,
        deleted_at    TEXT,
        delete_reason TEXT
    );
    CREATE TABLE message_scopes (
        message_id TEXT NOT NULL REFERENCES messages(message_id),
        scope_type TEXT NOT NULL,
        value      TEXT NOT NULL
    );
    CREATE TABLE message_refs (
        message_id TEXT NOT NULL REFERENCES messages(message_id),
        ref_type   TEXT NOT NULL,
        value      TEXT NOT NULL
    );
    CREATE TABLE groups (
        group_id    TEXT PRIMARY KEY,
        name        TEXT NOT NULL UNIQUE,
        description TEXT,
        created_by  TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );
    CREATE TABLE group_members (
        group_id     TEXT NOT NULL REFERENCES groups(group_id),
        member_type  TEXT NOT NULL,
        member_value TEXT NOT NULL,
        UNIQUE (group_id, member_type, member_value)
    );
    CREATE TABLE message_reads (
        message_id TEXT NOT NULL,
        session_id TEXT NOT NULL,
        agent_id   TEXT NOT NULL,
        read_at    TEXT NOT NULL,
        PRIMARY KEY (message_id, session_id)
    );
    CREATE TABLE subscriptions (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id   TEXT NOT NULL,
        scope_type   TEXT,
        scope_value  TEXT,
        mention_role TEXT,
        all_messages INTEGER NOT NULL DEFAULT 0,
        created_at   TEXT NOT NULL
    );
    CREATE TABLE sync_checkpoints (
        peer       TEXT NOT NULL,
        shard      TEXT NOT NULL,
        offset     INTEGER NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (peer, shard)
    );
    CREATE TABLE projection_meta (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    "#,
    // v2: session intent/task, message priority + impersonation, user tokens.
    r#"
    ALTER TABLE sessions ADD COLUMN intent TEXT;
    ALTER TABLE sessions ADD COLUMN intent_updated_at TEXT;
    ALTER TABLE sessions ADD COLUMN current_task TEXT;
    ALTER TABLE sessions ADD COLUMN task_updated_at TEXT;
    ALTER TABLE messages ADD COLUMN priority TEXT NOT NULL DEFAULT 'normal';
    ALTER TABLE messages ADD COLUMN authored_by TEXT;
    CREATE TABLE user_tokens (
        token      TEXT PRIMARY KEY,
        user_id    TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    "#,
    // v3: work contexts and the routing-path indexes.
    r#"
    CREATE TABLE work_contexts (
        session_id   TEXT PRIMARY KEY REFERENCES sessions(session_id),
        context      TEXT NOT NULL,
        extracted_at TEXT NOT NULL
    );
    CREATE INDEX idx_message_scopes_message ON message_scopes(message_id);
    CREATE INDEX idx_message_scopes_value ON message_scopes(scope_type, value);
    CREATE INDEX idx_message_refs_message ON message_refs(message_id);
    CREATE INDEX idx_message_refs_value ON message_refs(ref_type, value);
    CREATE INDEX idx_messages_thread ON messages(thread_id);
    CREATE INDEX idx_messages_created ON messages(created_at);
    CREATE INDEX idx_sessions_agent ON sessions(agent_id);
    CREATE INDEX idx_message_reads_agent ON message_reads(message_id, agent_id);
    "#,
];

/// Latest schema version this build writes.
pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

/// Meta key set once the projection is known to cover the full log.
const META_PROJECTED: &str = "projected";

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// The projection database.
pub struct Database {
    path: PathBuf,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
}

impl Database {
    /// Open (creating and migrating as needed) the database at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(LogError::Io)?;
        }
        let writer = Connection::open(&path)?;
        configure(&writer)?;
        migrate(&writer)?;
        Ok(Self { path, writer: Mutex::new(writer), readers: Mutex::new(Vec::new()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside a write transaction on the single writer
    /// connection. Rolls back on error.
    pub fn with_write<T>(
        &self,
        f: impl FnOnce(&Transaction) -> Result<T, StateError>,
    ) -> Result<T, StateError> {
        let mut conn = self.writer.lock();
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Run `f` on a pooled read connection. Reads see WAL snapshots and
    /// never contend with the writer.
    pub fn with_read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StateError>,
    ) -> Result<T, StateError> {
        let conn = match self.readers.lock().pop() {
            Some(conn) => conn,
            None => self.open_reader()?,
        };
        let result = f(&conn);
        self.readers.lock().push(conn);
        result
    }

    fn open_reader(&self) -> Result<Connection, StateError> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    /// True when the projection has been marked complete against the log.
    /// Absent on fresh databases and after interrupted rebuilds, which
    /// triggers a replay at startup.
    pub fn is_projected(&self) -> Result<bool, StateError> {
        let conn = self.writer.lock();
        let flag: Option<String> = conn
            .query_row(
                "SELECT value FROM projection_meta WHERE key = ?1",
                [META_PROJECTED],
                |row| row.get(0),
            )
            .optional()?;
        Ok(flag.is_some())
    }

    pub fn mark_projected(&self) -> Result<(), StateError> {
        self.with_write(|tx| {
            tx.execute(
                "INSERT INTO projection_meta (key, value) VALUES (?1, '1')
                 ON CONFLICT(key) DO UPDATE SET value = '1'",
                [META_PROJECTED],
            )?;
            Ok(())
        })
    }

    /// Drop all projected rows ahead of a replay. Local-only tables
    /// (`message_reads`, `subscriptions`, `sync_checkpoints`,
    /// `work_contexts`) are cleared too: they belong to this process and
    /// restart empty.
    pub fn clear_for_rebuild(&self) -> Result<(), StateError> {
        self.with_write(|tx| {
            for table in [
                "message_reads",
                "subscriptions",
                "sync_checkpoints",
                "work_contexts",
                "message_scopes",
                "message_refs",
                "messages",
                "threads",
                "group_members",
                "groups",
                "user_tokens",
                "sessions",
                "agents",
                "projection_meta",
            ] {
                tx.execute(&format!("DELETE FROM {table}"), [])?;
            }
            Ok(())
        })
    }

    /// Checkpoint the WAL into the main file, used at shutdown.
    pub fn checkpoint(&self) -> Result<(), StateError> {
        let conn = self.writer.lock();
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}

fn configure(conn: &Connection) -> Result<(), StateError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA foreign_keys=OFF;",
    )?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

fn migrate(conn: &Connection) -> Result<(), StateError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > SCHEMA_VERSION {
        return Err(StateError::SchemaTooNew(current, SCHEMA_VERSION));
    }

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let version = idx as u32 + 1;
        if version <= current {
            continue;
        }
        conn.execute_batch(&format!("BEGIN; {sql} COMMIT;"))?;
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
        )?;
        tracing::info!(version, "applied schema migration");
    }
    Ok(())
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
