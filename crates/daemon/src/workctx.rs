// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-context extraction: shell out to git from the heartbeat path.
//!
//! Git is treated as an untrusted external process. Every call carries
//! its own timeout, and any failure degrades to empty fields instead of
//! erroring. A broken or absent git must never take down a heartbeat.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thrum_core::{FileChange, WorkContext};
use tracing::debug;

/// Cap on per-commit and per-file detail calls so a long-lived branch
/// cannot turn one heartbeat into hundreds of subprocesses.
const MAX_DETAILED: usize = 20;

/// Run one git command with an independent timeout. Any failure
/// (spawn error, non-zero exit, timeout) yields `None`.
async fn git(dir: &Path, args: &[&str], timeout: Duration) -> Option<String> {
    let child = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .kill_on_drop(true)
        .output();
    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!(?args, error = %e, "git spawn failed");
            return None;
        }
        Err(_) => {
            debug!(?args, "git call timed out");
            return None;
        }
    };
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Some(text)
}

fn lines(raw: Option<String>) -> Vec<String> {
    raw.map(|s| s.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
        .unwrap_or_default()
}

/// Determine the base branch to diff against: `origin/main`, then
/// `origin/master`, then a fixed-depth fallback.
async fn base_branch(dir: &Path, timeout: Duration) -> String {
    for candidate in ["origin/main", "origin/master"] {
        if git(dir, &["rev-parse", "--verify", "--quiet", candidate], timeout)
            .await
            .is_some()
        {
            return candidate.to_string();
        }
    }
    "HEAD~10".to_string()
}

/// Extract the git work context for a worktree.
///
/// A directory that is not inside a git repository yields the
/// zero-valued struct with only `worktree_path` and `extracted_at` set.
pub async fn extract(worktree: &Path, timeout: Duration, now: DateTime<Utc>) -> WorkContext {
    let mut ctx = WorkContext {
        worktree_path: worktree.display().to_string(),
        extracted_at: Some(now),
        ..WorkContext::default()
    };

    if git(worktree, &["rev-parse", "--show-toplevel"], timeout).await.is_none() {
        return ctx;
    }

    ctx.branch = git(worktree, &["branch", "--show-current"], timeout)
        .await
        .unwrap_or_default();

    let base = base_branch(worktree, timeout).await;

    ctx.unmerged_commits = lines(
        git(
            worktree,
            &["log", &format!("{base}..HEAD"), "--format=%H %s"],
            timeout,
        )
        .await,
    );

    ctx.changed_files = lines(
        git(
            worktree,
            &["diff", "--name-only", &format!("{base}...HEAD")],
            timeout,
        )
        .await,
    );

    ctx.uncommitted_files = lines(git(worktree, &["status", "--porcelain"], timeout).await)
        .into_iter()
        .filter_map(|line| {
            // porcelain: "XY path" (or "XY old -> new" for renames)
            let path = line.get(2..)?.trim();
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            Some(path.to_string())
        })
        .collect();

    ctx.file_changes = file_changes(worktree, &base, timeout).await;
    ctx
}

/// Per-file numstat plus last-commit timestamps for the changed set.
async fn file_changes(worktree: &Path, base: &str, timeout: Duration) -> Vec<FileChange> {
    let numstat = lines(
        git(
            worktree,
            &["diff", "--numstat", &format!("{base}...HEAD")],
            timeout,
        )
        .await,
    );

    let mut changes = Vec::new();
    for line in numstat.iter().take(MAX_DETAILED) {
        let mut parts = line.split_whitespace();
        let additions = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
        let deletions = parts.next().and_then(|n| n.parse().ok()).unwrap_or(0);
        let path = match parts.next() {
            Some(p) => p.to_string(),
            None => continue,
        };
        let last_commit_at = git(
            worktree,
            &["log", "-1", "--format=%cI", "--", &path],
            timeout,
        )
        .await
        .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
        .map(|t| t.with_timezone(&Utc));
        changes.push(FileChange { path, additions, deletions, last_commit_at });
    }
    changes
}

#[cfg(test)]
#[path = "workctx_tests.rs"]
mod tests;
