// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-context rows: one per session, overwritten on each heartbeat.
//! Local-only: git output is not reconstructible from the event log.

use rusqlite::{params, OptionalExtension};
use thrum_core::{SessionId, WorkContext};

use super::State;
use crate::db::StateError;

impl State {
    pub fn store_work_context(
        &self,
        session_id: &SessionId,
        context: &WorkContext,
    ) -> Result<(), StateError> {
        let encoded = serde_json::to_string(context)?;
        let extracted_at = context
            .extracted_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        self.db().with_write(|tx| {
            tx.execute(
                "INSERT INTO work_contexts (session_id, context, extracted_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET
                     context = excluded.context,
                     extracted_at = excluded.extracted_at",
                params![session_id.as_str(), encoded, extracted_at],
            )?;
            Ok(())
        })
    }

    pub fn work_context(&self, session_id: &SessionId) -> Result<Option<WorkContext>, StateError> {
        self.db().with_read(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT context FROM work_contexts WHERE session_id = ?1",
                    [session_id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            match raw {
                Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
                None => Ok(None),
            }
        })
    }
}
