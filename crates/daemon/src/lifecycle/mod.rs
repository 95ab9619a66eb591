// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

mod startup;
pub use startup::startup;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use thrum_storage::StateError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::handlers::HandlerCtx;
use crate::paths::{PathsError, ThrumPaths};

/// Contents of `{.thrum}/var/thrum.pid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidFile {
    pub pid: u32,
    pub repo_path: PathBuf,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub socket_path: PathBuf,
}

/// Running daemon: shared handler context plus the supervisor's
/// resources.
impl std::fmt::Debug for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonState").finish_non_exhaustive()
    }
}

pub struct DaemonState {
    pub handlers: Arc<HandlerCtx>,
    /// Root token; cancelling fans out to every accept loop, connection
    /// task, and the dispatcher.
    pub cancel: CancellationToken,
    pub ws_port: u16,
    pub tasks: Vec<tokio::task::JoinHandle<()>>,
    // NOTE(lifetime): held to maintain the exclusive lock; kernel
    // releases it on any exit, including SIGKILL.
    #[allow(dead_code)]
    lock_file: File,
    guard: CleanupGuard,
}

/// Removes the runtime files on drop, so cleanup runs on every exit
/// path including panic unwinds. Disarmed only if the files were
/// already removed by a clean shutdown.
struct CleanupGuard {
    paths: ThrumPaths,
    armed: bool,
}

impl CleanupGuard {
    fn cleanup(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        for path in [
            self.paths.socket_path(),
            self.paths.pid_path(),
            self.paths.ws_port_path(),
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove runtime file");
                }
            }
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl DaemonState {
    /// Shutdown: stop transports, flush and checkpoint storage, remove
    /// runtime files. The lock releases when `self` drops.
    pub async fn shutdown(mut self) {
        info!("shutting down daemon");
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        if let Err(e) = self.handlers.state.db().checkpoint() {
            warn!(error = %e, "failed to checkpoint database on shutdown");
        }
        self.guard.cleanup();
        info!("daemon shutdown complete");
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Paths(#[from] PathsError),

    #[error("another daemon owns this repository (pid {pid}, repo {repo})")]
    AlreadyRunning { pid: u32, repo: String },

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("no free WebSocket port starting at {0}")]
    NoFreePort(u16),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
