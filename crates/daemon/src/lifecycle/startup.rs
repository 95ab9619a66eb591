// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use thrum_core::{Event, GroupId, GroupMember, SystemClock, EVERYONE_GROUP};
use thrum_storage::{rebuild, State};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{CleanupGuard, DaemonState, LifecycleError, PidFile};
use crate::config::{DaemonConfig, PortStrategy};
use crate::dispatch::Dispatcher;
use crate::handlers::HandlerCtx;
use crate::listener;
use crate::paths::ThrumPaths;
use crate::env;
use crate::registry::ClientRegistry;

/// Dispatcher inbox depth. Handlers `try_send` into it and never block.
const DISPATCH_QUEUE: usize = 256;

/// Start the daemon for an already-resolved repository.
pub async fn startup(paths: ThrumPaths, config: DaemonConfig) -> Result<DaemonState, LifecycleError> {
    match startup_inner(paths.clone(), config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Don't clean up if another daemon holds the lock; those
            // files belong to it.
            if !matches!(e, LifecycleError::AlreadyRunning { .. } | LifecycleError::LockFailed(_)) {
                cleanup_on_failure(&paths);
            }
            Err(e)
        }
    }
}

async fn startup_inner(
    paths: ThrumPaths,
    config: DaemonConfig,
) -> Result<DaemonState, LifecycleError> {
    // 1. Runtime directory.
    std::fs::create_dir_all(paths.var_dir())?;

    // 2. Single-instance lock FIRST. Open without truncating so a
    //    failed acquisition never clobbers the owner's files.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(paths.lock_path())?;
    if let Err(e) = lock_file.try_lock_exclusive() {
        return Err(match read_owner(&paths) {
            Some(owner) => LifecycleError::AlreadyRunning {
                pid: owner.pid,
                repo: owner.repo_path.display().to_string(),
            },
            None => LifecycleError::LockFailed(e),
        });
    }

    // 3. PID file, now that the lock is ours.
    let pid_file = PidFile {
        pid: std::process::id(),
        repo_path: paths.repo_root.clone(),
        started_at: chrono::Utc::now(),
        socket_path: paths.socket_path(),
    };
    let mut file = std::fs::File::create(paths.pid_path())?;
    writeln!(file, "{}", serde_json::to_string(&pid_file).map_err(std::io::Error::other)?)?;

    // 4. Open or rebuild the projection. A missing database or an
    //    absent completeness flag replays the log.
    let state = State::open(paths.sync_log_dir(), paths.db_path())?;
    if !state.db().is_projected()? {
        info!("projection missing or incomplete; rebuilding from log");
        rebuild(&state)?;
    }
    let state = Arc::new(state);

    // 5. Well-known everyone group.
    ensure_everyone_group(&state)?;

    // 6. Transports. Remove a stale socket left by a SIGKILLed daemon
    //    (the lock, not the socket file, is the instance guard).
    let socket_path = paths.socket_path();
    if socket_path.exists() {
        std::fs::remove_file(&socket_path)?;
    }
    let unix_listener = UnixListener::bind(&socket_path)
        .map_err(|e| LifecycleError::BindFailed(socket_path.clone(), e))?;
    set_socket_mode(&socket_path)?;

    let (ws_listener, ws_port) = bind_ws(&config).await?;
    std::fs::write(paths.ws_port_path(), format!("{ws_port}\n"))?;

    // 7. Shared context, dispatcher, accept loops.
    let registry = Arc::new(ClientRegistry::new());
    let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_QUEUE);
    let handlers = Arc::new(HandlerCtx {
        state: Arc::clone(&state),
        registry: Arc::clone(&registry),
        dispatch_tx,
        paths: paths.clone(),
        config,
        clock: SystemClock,
        start_time: Instant::now(),
    });

    let cancel = CancellationToken::new();
    let tasks = vec![
        Dispatcher::new(state, registry).spawn(dispatch_rx, cancel.clone()),
        listener::unix::spawn(unix_listener, Arc::clone(&handlers), cancel.clone()),
        listener::ws::spawn(ws_listener, Arc::clone(&handlers), cancel.clone()),
    ];

    info!(
        socket = %socket_path.display(),
        ws_port,
        version = env::PROTOCOL_VERSION,
        "daemon started"
    );

    Ok(DaemonState {
        handlers,
        cancel,
        ws_port,
        tasks,
        lock_file,
        guard: CleanupGuard { paths, armed: true },
    })
}

fn read_owner(paths: &ThrumPaths) -> Option<PidFile> {
    let raw = std::fs::read_to_string(paths.pid_path()).ok()?;
    serde_json::from_str(raw.trim()).ok()
}

fn ensure_everyone_group(state: &State) -> Result<(), LifecycleError> {
    if state.group_by_name(EVERYONE_GROUP)?.is_some() {
        return Ok(());
    }
    let record = thrum_core::LogRecord::new(
        chrono::Utc::now(),
        Event::GroupCreate {
            group_id: GroupId::new(),
            name: EVERYONE_GROUP.to_string(),
            description: Some("every registered agent".to_string()),
            created_by: "daemon".to_string(),
            members: vec![GroupMember::wildcard()],
        },
    );
    state.commit(&record)?;
    Ok(())
}

fn set_socket_mode(path: &std::path::Path) -> Result<(), LifecycleError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}

/// Bind the WebSocket listener on loopback: env override, fixed config
/// port, or the first free port scanning up from the base.
async fn bind_ws(config: &DaemonConfig) -> Result<(TcpListener, u16), LifecycleError> {
    let strategy = match env::ws_port() {
        Some(port) => PortStrategy::Fixed(port),
        None => config.ws_port,
    };
    match strategy {
        PortStrategy::Fixed(port) => {
            let listener = TcpListener::bind(("127.0.0.1", port)).await?;
            Ok((listener, port))
        }
        PortStrategy::Auto => {
            let base = DaemonConfig::WS_PORT_BASE;
            for port in base..base.saturating_add(100) {
                match TcpListener::bind(("127.0.0.1", port)).await {
                    Ok(listener) => return Ok((listener, port)),
                    Err(_) => continue,
                }
            }
            Err(LifecycleError::NoFreePort(base))
        }
    }
}

/// Clean up resources on startup failure.
fn cleanup_on_failure(paths: &ThrumPaths) {
    for path in [paths.socket_path(), paths.pid_path(), paths.ws_port_path()] {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "cleanup failed");
            }
        }
    }
}
