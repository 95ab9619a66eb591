// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC handlers: one function per method over a shared context.
//!
//! Dispatch is a match on the method name (no reflection). Handlers
//! validate their own params, mutate state through the commit protocol,
//! and return plain JSON values; the transport layer wraps them into
//! JSON-RPC envelopes.

pub mod agents;
pub mod groups;
pub mod messages;
pub mod sessions;
pub mod subscriptions;
pub mod sync;
pub mod threads;
pub mod users;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thrum_core::{Clock, Event, LogRecord, Message, SystemClock};
use thrum_storage::State;
use thrum_wire::RpcError;
use tokio::sync::mpsc;
use tracing::error;

use crate::caller::Caller;
use crate::config::DaemonConfig;
use crate::dispatch::CommitNotice;
use crate::env::PROTOCOL_VERSION;
use crate::identity::IdentityStore;
use crate::paths::ThrumPaths;
use crate::registry::ClientRegistry;

/// Shared context for all request handlers.
pub struct HandlerCtx {
    pub state: Arc<State>,
    pub registry: Arc<ClientRegistry>,
    pub dispatch_tx: mpsc::Sender<CommitNotice>,
    pub paths: ThrumPaths,
    pub config: DaemonConfig,
    pub clock: SystemClock,
    pub start_time: Instant,
}

impl HandlerCtx {
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    pub fn identities(&self) -> IdentityStore {
        IdentityStore::new(self.paths.identities_dir())
    }

    /// Commit one durable event through the log-then-projection path.
    pub fn commit(&self, event: Event) -> Result<LogRecord, RpcError> {
        let record = LogRecord::new(self.now(), event);
        self.state.commit(&record).map_err(internal)?;
        Ok(record)
    }

    /// Commit several events as one projection transaction.
    pub fn commit_all(&self, events: Vec<Event>) -> Result<Vec<LogRecord>, RpcError> {
        let now = self.now();
        let records: Vec<LogRecord> =
            events.into_iter().map(|event| LogRecord::new(now, event)).collect();
        self.state.commit_all(&records).map_err(internal)?;
        Ok(records)
    }

    /// Hand a committed message to the dispatcher. Never blocks: a full
    /// dispatcher channel drops the notice, and clients reconcile by
    /// listing.
    pub fn notify(&self, message: Message) {
        if self.dispatch_tx.try_send(CommitNotice { message }).is_err() {
            error!("dispatcher channel full; dropping commit notice");
        }
    }
}

/// Map a storage failure into the detail-free internal error.
pub(crate) fn internal(err: impl std::fmt::Display) -> RpcError {
    error!(error = %err, "internal error");
    RpcError::internal()
}

/// Parse params into a typed struct; `null`/absent params become `{}`.
pub(crate) fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let value = match params {
        Some(Value::Null) | None => json!({}),
        Some(value) => value,
    };
    serde_json::from_value(value).map_err(RpcError::invalid_params)
}

/// Route one request to its handler.
pub async fn dispatch(
    ctx: &HandlerCtx,
    caller: &Caller,
    method: &str,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    match method {
        "health" => health(ctx),

        "agent.register" => agents::register(ctx, caller, params),
        "agent.list" => agents::list(ctx, params),
        "agent.whoami" => agents::whoami(ctx, caller),
        "agent.listContext" => agents::list_context(ctx, params),
        "agent.delete" => agents::delete(ctx, caller, params),
        "agent.cleanup" => agents::cleanup(ctx, params),

        "session.start" => sessions::start(ctx, caller, params),
        "session.end" => sessions::end(ctx, caller, params),
        "session.heartbeat" => sessions::heartbeat(ctx, caller, params).await,
        "session.setIntent" => sessions::set_intent(ctx, caller, params),
        "session.setTask" => sessions::set_task(ctx, caller, params),
        "session.list" => sessions::list(ctx, params),

        "message.send" => messages::send(ctx, caller, params),
        "message.get" => messages::get(ctx, caller, params),
        "message.list" => messages::list(ctx, caller, params),
        "message.edit" => messages::edit(ctx, caller, params),
        "message.delete" => messages::delete(ctx, caller, params),
        "message.markRead" => messages::mark_read(ctx, caller, params),

        "thread.create" => threads::create(ctx, caller, params),
        "thread.list" => threads::list(ctx),
        "thread.get" => threads::get(ctx, params),

        "group.create" => groups::create(ctx, caller, params),
        "group.list" => groups::list(ctx),
        "group.addMember" => groups::add_member(ctx, caller, params),
        "group.removeMember" => groups::remove_member(ctx, caller, params),

        "subscribe" => subscriptions::subscribe(ctx, caller, params),
        "unsubscribe" => subscriptions::unsubscribe(ctx, caller, params),
        "subscriptions.list" => subscriptions::list(ctx, caller),

        "user.register" => users::register(ctx, caller, params),
        "user.identify" => users::identify(ctx, params),

        "sync.status" => sync::status(ctx),
        "sync.force" => sync::force(ctx),

        other => Err(RpcError::method_not_found(other)),
    }
}

fn health(ctx: &HandlerCtx) -> Result<Value, RpcError> {
    let (agents, sessions) = ctx.state.health_counts().map_err(internal)?;
    Ok(json!({
        "status": "ok",
        "version": PROTOCOL_VERSION,
        "uptime_secs": ctx.start_time.elapsed().as_secs(),
        "agents": agents,
        "sessions": sessions,
        "connections": ctx.registry.connection_count(),
    }))
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
