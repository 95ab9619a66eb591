// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Threads: named anchors that messages attach to by `thread_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::ThreadId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: ThreadId,
    pub title: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
