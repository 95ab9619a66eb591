// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client registry: live connections and their outbound queues.
//!
//! Each connection owns a bounded queue of serialized outbound frames.
//! The dispatcher pushes notifications with `try_send`; a full or closed
//! queue marks the connection for unregistration; overflow never
//! back-pressures into the dispatcher.

use std::collections::HashMap;

use parking_lot::RwLock;
use thrum_core::SessionId;
use tokio::sync::mpsc;
use tracing::debug;

/// Bound on each connection's outbound queue, in frames.
pub const OUTBOUND_QUEUE: usize = 32;

#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub conn_id: u64,
    pub tx: mpsc::Sender<String>,
}

#[derive(Default)]
struct Inner {
    clients: HashMap<u64, ClientHandle>,
    /// session → connection binding, set by `session.start`.
    sessions: HashMap<SessionId, u64>,
    next_id: u64,
}

/// Shared connection map, guarded by a reader-writer lock.
#[derive(Default)]
pub struct ClientRegistry {
    inner: RwLock<Inner>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return its ID.
    pub fn register(&self, tx: mpsc::Sender<String>) -> u64 {
        let mut inner = self.inner.write();
        inner.next_id += 1;
        let conn_id = inner.next_id;
        inner.clients.insert(conn_id, ClientHandle { conn_id, tx });
        conn_id
    }

    /// Drop a connection and every session bound to it.
    pub fn unregister(&self, conn_id: u64) {
        let mut inner = self.inner.write();
        inner.clients.remove(&conn_id);
        inner.sessions.retain(|_, bound| *bound != conn_id);
        debug!(conn_id, "unregistered connection");
    }

    /// Bind a session to the connection that started it. Notifications
    /// for the session's subscriptions flow to this connection.
    pub fn bind_session(&self, conn_id: u64, session_id: SessionId) {
        self.inner.write().sessions.insert(session_id, conn_id);
    }

    pub fn unbind_session(&self, session_id: &SessionId) {
        self.inner.write().sessions.remove(session_id);
    }

    pub fn handle_for_session(&self, session_id: &SessionId) -> Option<ClientHandle> {
        let inner = self.inner.read();
        let conn_id = inner.sessions.get(session_id)?;
        inner.clients.get(conn_id).cloned()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.read().clients.len()
    }
}
