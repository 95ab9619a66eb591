// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! session.* handlers.

use serde::Deserialize;
use serde_json::{json, Value};
use thrum_core::{EndReason, Event, Session, SessionId, Tag, REF_WORKTREE};
use thrum_wire::RpcError;

use super::{internal, parse_params, HandlerCtx};
use crate::caller::Caller;
use crate::env;

#[derive(Deserialize)]
struct StartParams {
    agent_id: Option<String>,
}

pub fn start(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: StartParams = parse_params(params)?;

    let agent_id = p.agent_id.unwrap_or_else(|| identity.to_string());
    if agent_id != identity && !caller.is_user() {
        return Err(RpcError::not_author(
            "agents may only start sessions for themselves",
        ));
    }
    if !ctx.state.agent_exists(&agent_id).map_err(internal)? {
        return Err(RpcError::unknown_agent(format!("{agent_id:?} is not registered")));
    }

    // Orphan recovery: sessions left open by a dead process close with
    // reason `crash` before the new one exists.
    let orphans = ctx.state.open_sessions_for(&agent_id).map_err(internal)?;
    let mut events: Vec<Event> = orphans
        .iter()
        .map(|session| Event::SessionEnd {
            session_id: session.session_id,
            agent_id: agent_id.clone(),
            reason: EndReason::Crash,
        })
        .collect();

    let session_id = SessionId::new();
    events.push(Event::SessionStart { session_id, agent_id: agent_id.clone() });
    ctx.commit_all(events)?;

    for orphan in &orphans {
        ctx.registry.unbind_session(&orphan.session_id);
    }
    ctx.registry.bind_session(caller.conn_id, session_id);

    let recovered: Vec<SessionId> = orphans.iter().map(|s| s.session_id).collect();
    Ok(json!({
        "session_id": session_id,
        "agent_id": agent_id,
        "recovered": recovered,
    }))
}

#[derive(Deserialize)]
struct EndParams {
    session_id: Option<SessionId>,
    reason: Option<EndReason>,
}

pub fn end(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: EndParams = parse_params(params)?;

    let session = resolve_session(ctx, identity, p.session_id)?;
    if session.agent_id != identity && !caller.is_user() {
        return Err(RpcError::not_author("session belongs to another agent"));
    }

    ctx.commit(Event::SessionEnd {
        session_id: session.session_id,
        agent_id: session.agent_id.clone(),
        reason: p.reason.unwrap_or(EndReason::Normal),
    })?;
    ctx.registry.unbind_session(&session.session_id);

    Ok(json!({ "session_id": session.session_id, "ended": true }))
}

#[derive(Deserialize)]
struct HeartbeatParams {
    session_id: Option<SessionId>,
    intent: Option<String>,
    current_task: Option<String>,
    #[serde(default)]
    refs: Vec<Tag>,
}

pub async fn heartbeat(
    ctx: &HandlerCtx,
    caller: &Caller,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: HeartbeatParams = parse_params(params)?;

    let session = resolve_session(ctx, identity, p.session_id)?;
    if session.agent_id != identity && !caller.is_user() {
        return Err(RpcError::not_author("session belongs to another agent"));
    }

    ctx.commit(Event::SessionHeartbeat {
        session_id: session.session_id,
        agent_id: session.agent_id.clone(),
        intent: p.intent,
        current_task: p.current_task,
    })?;

    // A worktree ref triggers fresh work-context extraction. Bounded by
    // per-call git timeouts; extraction failure degrades, never errors.
    let mut work_context = None;
    if let Some(worktree) = p.refs.iter().find(|r| r.tag_type == REF_WORKTREE) {
        let context = crate::workctx::extract(
            std::path::Path::new(&worktree.value),
            env::git_timeout(),
            ctx.now(),
        )
        .await;
        ctx.state
            .store_work_context(&session.session_id, &context)
            .map_err(internal)?;
        work_context = Some(context);
    }

    Ok(json!({ "session_id": session.session_id, "work_context": work_context }))
}

#[derive(Deserialize)]
struct SetIntentParams {
    session_id: Option<SessionId>,
    intent: String,
}

pub fn set_intent(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: SetIntentParams = parse_params(params)?;
    let session = resolve_session(ctx, identity, p.session_id)?;
    if session.agent_id != identity && !caller.is_user() {
        return Err(RpcError::not_author("session belongs to another agent"));
    }
    ctx.commit(Event::SessionHeartbeat {
        session_id: session.session_id,
        agent_id: session.agent_id,
        intent: Some(p.intent.clone()),
        current_task: None,
    })?;
    Ok(json!({ "session_id": session.session_id, "intent": p.intent }))
}

#[derive(Deserialize)]
struct SetTaskParams {
    session_id: Option<SessionId>,
    task: String,
}

pub fn set_task(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: SetTaskParams = parse_params(params)?;
    let session = resolve_session(ctx, identity, p.session_id)?;
    if session.agent_id != identity && !caller.is_user() {
        return Err(RpcError::not_author("session belongs to another agent"));
    }
    ctx.commit(Event::SessionHeartbeat {
        session_id: session.session_id,
        agent_id: session.agent_id,
        intent: None,
        current_task: Some(p.task.clone()),
    })?;
    Ok(json!({ "session_id": session.session_id, "current_task": p.task }))
}

#[derive(Deserialize)]
struct SessionListParams {
    agent_id: Option<String>,
    #[serde(default)]
    active_only: bool,
}

pub fn list(ctx: &HandlerCtx, params: Option<Value>) -> Result<Value, RpcError> {
    let p: SessionListParams = parse_params(params)?;
    let sessions = ctx
        .state
        .list_sessions(p.agent_id.as_deref(), p.active_only)
        .map_err(internal)?;
    Ok(json!({ "sessions": sessions }))
}

/// The explicit session, or the caller's active one. An ended or absent
/// session is a precondition failure.
fn resolve_session(
    ctx: &HandlerCtx,
    identity: &str,
    session_id: Option<SessionId>,
) -> Result<Session, RpcError> {
    let session = match session_id {
        Some(session_id) => ctx
            .state
            .get_session(&session_id)
            .map_err(internal)?
            .ok_or_else(|| RpcError::generic(format!("unknown session {session_id}")))?,
        None => ctx
            .state
            .active_session_for(identity)
            .map_err(internal)?
            .ok_or_else(|| RpcError::generic("no active session; call session.start first"))?,
    };
    if !session.is_open() {
        return Err(RpcError::generic(format!(
            "session {} has already ended",
            session.session_id
        )));
    }
    Ok(session)
}
