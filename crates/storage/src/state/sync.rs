// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sync checkpoints: last-known log offsets per peer.
//!
//! The `sync.checkpoint` event is durable (it rides the log so peers can
//! see each other's progress), but the local table is process-owned and
//! recreated empty on rebuild.

use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction};
use thrum_core::{Event, LogRecord};

use super::State;
use crate::db::StateError;

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub peer: String,
    pub shard: String,
    pub offset: u64,
    pub updated_at: DateTime<Utc>,
}

pub(crate) fn apply(tx: &Transaction, record: &LogRecord) -> Result<(), StateError> {
    if let Event::SyncCheckpoint { peer, shard, offset } = &record.event {
        tx.execute(
            "INSERT INTO sync_checkpoints (peer, shard, offset, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(peer, shard) DO UPDATE SET
                 offset = excluded.offset,
                 updated_at = excluded.updated_at",
            params![peer, shard, *offset as i64, record.timestamp.to_rfc3339()],
        )?;
    }
    Ok(())
}

impl State {
    pub fn checkpoints(&self) -> Result<Vec<Checkpoint>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT peer, shard, offset, updated_at FROM sync_checkpoints
                 ORDER BY peer, shard",
            )?;
            let checkpoints = stmt
                .query_map([], |row| {
                    let updated_at: String = row.get(3)?;
                    Ok(Checkpoint {
                        peer: row.get(0)?,
                        shard: row.get(1)?,
                        offset: row.get::<_, i64>(2)? as u64,
                        updated_at: DateTime::parse_from_rfc3339(&updated_at)
                            .map(|t| t.with_timezone(&Utc))
                            .unwrap_or_default(),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(checkpoints)
        })
    }
}
