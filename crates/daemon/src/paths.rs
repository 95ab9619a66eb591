// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem layout: locate the effective `.thrum/` directory and the
//! sync-log directory next to the git common dir.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathsError {
    #[error("not inside a repository (no .git or .thrum above {0})")]
    NoRepo(PathBuf),

    #[error("redirect at {0} points to a directory that redirects again: {1}")]
    DoubleRedirect(PathBuf, PathBuf),

    #[error("redirect at {0} must contain an absolute path, got {1:?}")]
    RelativeRedirect(PathBuf, String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolved repository paths. `dot_dir` is the *effective* `.thrum/`
/// after following at most one `redirect` hop.
#[derive(Debug, Clone)]
pub struct ThrumPaths {
    pub repo_root: PathBuf,
    pub dot_dir: PathBuf,
}

impl ThrumPaths {
    /// Walk up from `start` to the first directory containing `.thrum`
    /// or `.git`, then resolve the effective `.thrum/`.
    pub fn discover(start: &Path) -> Result<Self, PathsError> {
        let mut dir = start.to_path_buf();
        loop {
            if dir.join(".thrum").is_dir() || dir.join(".git").exists() {
                return Self::at_repo_root(&dir);
            }
            if !dir.pop() {
                return Err(PathsError::NoRepo(start.to_path_buf()));
            }
        }
    }

    /// Resolve the effective `.thrum/` for a known repository root.
    ///
    /// A `redirect` file holds one absolute path to the real `.thrum/`
    /// (shared daemons across worktrees). One hop only; a redirect that
    /// lands on another redirect is a fatal misconfiguration.
    pub fn at_repo_root(repo_root: &Path) -> Result<Self, PathsError> {
        let local = repo_root.join(".thrum");
        let dot_dir = match read_redirect(&local)? {
            None => local,
            Some(target) => {
                if read_redirect(&target)?.is_some() {
                    return Err(PathsError::DoubleRedirect(local.join("redirect"), target));
                }
                target
            }
        };
        Ok(Self { repo_root: repo_root.to_path_buf(), dot_dir })
    }

    pub fn var_dir(&self) -> PathBuf {
        self.dot_dir.join("var")
    }

    pub fn socket_path(&self) -> PathBuf {
        self.var_dir().join("thrum.sock")
    }

    /// Advisory lock file held for the daemon's lifetime. Kernel-released
    /// on any process exit, including SIGKILL.
    pub fn lock_path(&self) -> PathBuf {
        self.var_dir().join("thrum.sock.lock")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.var_dir().join("thrum.pid")
    }

    pub fn ws_port_path(&self) -> PathBuf {
        self.var_dir().join("ws.port")
    }

    pub fn db_path(&self) -> PathBuf {
        self.var_dir().join("messages.db")
    }

    pub fn config_path(&self) -> PathBuf {
        self.dot_dir.join("config.json")
    }

    pub fn identities_dir(&self) -> PathBuf {
        self.dot_dir.join("identities")
    }

    pub fn context_dir(&self) -> PathBuf {
        self.dot_dir.join("context")
    }

    pub fn context_file(&self, agent: &str) -> PathBuf {
        self.context_dir().join(format!("{agent}.md"))
    }

    /// The event-log directory: `thrum-sync/a-sync/` alongside the git
    /// common dir, so every worktree of a repository shares one log.
    /// Outside git, the log nests under the effective `.thrum/`.
    pub fn sync_log_dir(&self) -> PathBuf {
        match git_common_dir(&self.repo_root) {
            Some(common) => match common.parent() {
                Some(parent) => parent.join("thrum-sync").join("a-sync"),
                None => self.dot_dir.join("thrum-sync").join("a-sync"),
            },
            None => self.dot_dir.join("thrum-sync").join("a-sync"),
        }
    }
}

fn read_redirect(dot_dir: &Path) -> Result<Option<PathBuf>, PathsError> {
    let redirect = dot_dir.join("redirect");
    if !redirect.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&redirect)?;
    let target = raw.trim();
    if target.is_empty() {
        return Ok(None);
    }
    let path = PathBuf::from(target);
    if !path.is_absolute() {
        return Err(PathsError::RelativeRedirect(redirect, target.to_string()));
    }
    Ok(Some(path))
}

/// Locate the git common dir without shelling out: `.git` as a directory
/// is the common dir itself; `.git` as a file (linked worktree) names the
/// per-worktree dir, whose `commondir` file points at the shared one.
fn git_common_dir(repo_root: &Path) -> Option<PathBuf> {
    let dot_git = repo_root.join(".git");
    if dot_git.is_dir() {
        return Some(dot_git);
    }
    if dot_git.is_file() {
        let raw = std::fs::read_to_string(&dot_git).ok()?;
        let gitdir = raw.strip_prefix("gitdir:")?.trim();
        let gitdir = if Path::new(gitdir).is_absolute() {
            PathBuf::from(gitdir)
        } else {
            repo_root.join(gitdir)
        };
        let common_raw = std::fs::read_to_string(gitdir.join("commondir")).ok()?;
        let common = common_raw.trim();
        let common = if Path::new(common).is_absolute() {
            PathBuf::from(common)
        } else {
            gitdir.join(common)
        };
        return common.canonicalize().ok();
    }
    None
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
