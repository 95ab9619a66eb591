// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for handler tests.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use thrum_core::{SessionId, SystemClock};
use thrum_storage::State;
use thrum_wire::RpcError;
use tokio::sync::mpsc;

use super::{dispatch, HandlerCtx};
use crate::caller::{Caller, Transport};
use crate::config::DaemonConfig;
use crate::dispatch::CommitNotice;
use crate::paths::ThrumPaths;
use crate::registry::ClientRegistry;

pub(crate) struct TestDaemon {
    #[allow(dead_code)]
    pub dir: tempfile::TempDir,
    pub ctx: HandlerCtx,
    pub notices: mpsc::Receiver<CommitNotice>,
}

pub(crate) fn test_daemon() -> TestDaemon {
    test_daemon_with(DaemonConfig::default())
}

pub(crate) fn test_daemon_with(config: DaemonConfig) -> TestDaemon {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join(".thrum")).unwrap();
    let paths = ThrumPaths::at_repo_root(dir.path()).unwrap();
    let state = State::open(paths.sync_log_dir(), paths.db_path()).unwrap();
    let (dispatch_tx, notices) = mpsc::channel(256);
    let ctx = HandlerCtx {
        state: Arc::new(state),
        registry: Arc::new(ClientRegistry::new()),
        dispatch_tx,
        paths,
        config,
        clock: SystemClock,
        start_time: Instant::now(),
    };
    TestDaemon { dir, ctx, notices }
}

pub(crate) fn agent_caller(name: &str) -> Caller {
    Caller::new(Transport::Unix, Some(name.to_string()), 1)
}

pub(crate) fn user_caller(user_id: &str) -> Caller {
    Caller::new(Transport::WebSocket, Some(user_id.to_string()), 2)
}

pub(crate) fn ws_anonymous() -> Caller {
    Caller::new(Transport::WebSocket, None, 3)
}

pub(crate) async fn call(
    ctx: &HandlerCtx,
    caller: &Caller,
    method: &str,
    params: Value,
) -> Result<Value, RpcError> {
    dispatch(ctx, caller, method, Some(params)).await
}

/// Register an agent and open a session for it.
pub(crate) async fn online_agent(ctx: &HandlerCtx, name: &str, role: &str) -> SessionId {
    let caller = agent_caller(name);
    call(
        ctx,
        &caller,
        "agent.register",
        json!({ "name": name, "role": role, "module": "m" }),
    )
    .await
    .unwrap();
    let result = call(ctx, &caller, "session.start", json!({})).await.unwrap();
    SessionId::from_string(result["session_id"].as_str().unwrap())
}
