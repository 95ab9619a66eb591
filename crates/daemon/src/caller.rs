// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Caller context: the identity a transport attaches to a connection.
//!
//! The Unix socket trusts the process and resolves identity at accept
//! time; the WebSocket starts anonymous and earns identity through
//! `agent.register` / `user.register`. Handlers only ever see this
//! type and never introspect the transport.

use thrum_wire::RpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Unix,
    WebSocket,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transport::Unix => write!(f, "unix"),
            Transport::WebSocket => write!(f, "websocket"),
        }
    }
}

/// Per-request caller snapshot.
#[derive(Debug, Clone)]
pub struct Caller {
    pub transport: Transport,
    /// Agent name, or `user:{username}`. `None` until the connection
    /// has an attributed identity.
    pub identity: Option<String>,
    pub conn_id: u64,
}

impl Caller {
    pub fn new(transport: Transport, identity: Option<String>, conn_id: u64) -> Self {
        Self { transport, identity, conn_id }
    }

    /// The attributed identity, or the error every identity-requiring
    /// method returns to anonymous connections.
    pub fn require_identity(&self) -> Result<&str, RpcError> {
        self.identity.as_deref().ok_or_else(|| {
            RpcError::generic("no identity attached to this connection; register first")
        })
    }

    pub fn is_user(&self) -> bool {
        self.identity
            .as_deref()
            .is_some_and(thrum_core::user::is_user_id)
    }
}
