// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Projected state: apply dispatch plus per-entity query modules.

pub mod agents;
pub mod groups;
pub mod messages;
pub mod reads;
pub mod sessions;
pub mod subscriptions;
pub mod sync;
pub mod threads;
pub mod workctx;

use rusqlite::Transaction;
use thrum_core::{Event, LogRecord};

use crate::db::{Database, StateError};
use crate::log::EventLog;

/// The durable state pair: log plus projection.
///
/// Single-writer discipline lives in [`Database`]; this type enforces the
/// commit protocol: append + flush the log line first, then apply the
/// same record to SQLite inside one transaction.
pub struct State {
    log: EventLog,
    db: Database,
}

impl State {
    pub fn open(
        log_dir: impl Into<std::path::PathBuf>,
        db_path: impl Into<std::path::PathBuf>,
    ) -> Result<Self, StateError> {
        let log = EventLog::open(log_dir)?;
        let db = Database::open(db_path)?;
        Ok(Self { log, db })
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Commit one durable event: log first, then projection.
    ///
    /// If the append fails the RPC aborts with no state change. If the
    /// projection apply fails after a successful append, the database
    /// transaction rolls back and the log line stays; replay converges
    /// on it at the next rebuild.
    pub fn commit(&self, record: &LogRecord) -> Result<(), StateError> {
        self.log.append(record)?;
        self.db.with_write(|tx| apply_record(tx, record))
    }

    /// Commit several records as one projection transaction. Each line is
    /// flushed to the log before any database change.
    pub fn commit_all(&self, records: &[LogRecord]) -> Result<(), StateError> {
        for record in records {
            self.log.append(record)?;
        }
        self.db.with_write(|tx| {
            for record in records {
                apply_record(tx, record)?;
            }
            Ok(())
        })
    }
}

/// Apply an event to derive projection changes.
///
/// Events are facts about what happened; rows are derived from those
/// facts. Handlers must stay idempotent where uniqueness allows it
/// (`INSERT OR IGNORE` / upserts) because bootstrap events can reappear
/// across restarts.
pub(crate) fn apply_record(tx: &Transaction, record: &LogRecord) -> Result<(), StateError> {
    match &record.event {
        Event::AgentRegister { .. } | Event::UserRegister { .. } => agents::apply(tx, record),

        Event::SessionStart { .. }
        | Event::SessionEnd { .. }
        | Event::SessionHeartbeat { .. }
        | Event::AgentCleanup { .. } => sessions::apply(tx, record),

        Event::MessageCreate { .. } | Event::MessageEdit { .. } | Event::MessageDelete { .. } => {
            messages::apply(tx, record)
        }

        Event::ThreadCreate { .. } => threads::apply(tx, record),

        Event::GroupCreate { .. }
        | Event::GroupMemberAdd { .. }
        | Event::GroupMemberRemove { .. } => groups::apply(tx, record),

        Event::SyncCheckpoint { .. } => sync::apply(tx, record),
    }
}

#[cfg(test)]
#[path = "../state_tests/mod.rs"]
mod tests;
