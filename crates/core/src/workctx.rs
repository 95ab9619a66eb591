// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git-derived work context attached to a live session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-file change stats within the unmerged range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub additions: u32,
    pub deletions: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_at: Option<DateTime<Utc>>,
}

/// Snapshot of a worktree's git state, overwritten on each heartbeat that
/// carries a worktree ref. A non-git directory yields the `Default` value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkContext {
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub worktree_path: String,
    /// `{hash} {subject}` lines for commits not on the base branch.
    #[serde(default)]
    pub unmerged_commits: Vec<String>,
    /// Paths with uncommitted modifications (`status --porcelain`).
    #[serde(default)]
    pub uncommitted_files: Vec<String>,
    /// Paths changed between the base branch and HEAD.
    #[serde(default)]
    pub changed_files: Vec<String>,
    #[serde(default)]
    pub file_changes: Vec<FileChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
}

impl WorkContext {
    pub fn is_empty(&self) -> bool {
        self.branch.is_empty()
            && self.unmerged_commits.is_empty()
            && self.uncommitted_files.is_empty()
            && self.changed_files.is_empty()
    }
}
