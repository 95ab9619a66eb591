// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Projection rebuild: stream the log into a fresh SQLite state.

use thrum_core::Event;
use tracing::info;

use crate::db::StateError;
use crate::state::{apply_record, State};

/// Rebuild the projection from the log.
///
/// Clears every projected table (local-only tables restart empty), then
/// replays all shards merged in `event_id` order inside one write
/// transaction, and finally sets the completeness flag. Interrupting a
/// rebuild leaves the flag absent, so the next startup replays again.
pub fn rebuild(state: &State) -> Result<(), StateError> {
    let records = state.log().read_all()?;
    state.db().clear_for_rebuild()?;

    let mut applied = 0usize;
    state.db().with_write(|tx| {
        for record in &records {
            // Checkpoint rows are process-local; peers' checkpoints do
            // not belong in this machine's table.
            if matches!(record.event, Event::SyncCheckpoint { .. }) {
                continue;
            }
            apply_record(tx, record)?;
            applied += 1;
        }
        Ok(())
    })?;
    state.db().mark_projected()?;

    info!(records = records.len(), applied, "rebuilt projection from log");
    Ok(())
}
