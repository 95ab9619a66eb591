// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::time::Duration;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity hint for Unix-socket callers: the agent name to attribute
/// the connection to when several identity files exist.
pub fn thrum_name() -> Option<String> {
    std::env::var("THRUM_NAME").ok().filter(|s| !s.is_empty())
}

/// Per-frame IPC timeout on the Unix socket write path.
pub fn ipc_timeout() -> Duration {
    std::env::var("THRUM_IPC_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Timeout for each individual git subprocess on the heartbeat path.
pub fn git_timeout() -> Duration {
    std::env::var("THRUM_GIT_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(3))
}

/// WebSocket port override. Takes precedence over config.json.
pub fn ws_port() -> Option<u16> {
    std::env::var("THRUM_WS_PORT").ok().and_then(|s| s.parse::<u16>().ok())
}
