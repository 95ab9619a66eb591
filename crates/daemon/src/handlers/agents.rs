// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agent.* handlers.

use serde::Deserialize;
use serde_json::{json, Value};
use thrum_core::{
    validate_agent_name, Agent, AgentKind, EndReason, Event, GroupId, GroupMember, Session,
};
use thrum_storage::AgentFilter;
use thrum_wire::RpcError;

use super::{internal, parse_params, HandlerCtx};
use crate::caller::Caller;
use crate::identity::Identity;

#[derive(Deserialize)]
struct RegisterParams {
    role: String,
    module: String,
    name: Option<String>,
    display: Option<String>,
    hostname: Option<String>,
    #[serde(default)]
    force: bool,
    #[serde(default)]
    re_register: bool,
}

pub fn register(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let p: RegisterParams = parse_params(params)?;

    let name = match p.name.or_else(|| caller.identity.clone()) {
        Some(name) => name,
        None => return Err(RpcError::invalid_params("name is required")),
    };

    validate_agent_name(&name).map_err(|e| RpcError::generic(e.to_string()))?;
    validate_agent_name(&p.role)
        .map_err(|e| RpcError::generic(format!("invalid role: {e}")))?;
    if name == p.role {
        return Err(RpcError::generic(format!(
            "agent name may not equal its own role: {name:?}"
        )));
    }

    let existing = ctx.state.get_agent(&name).map_err(internal)?;

    // Addressing-ambiguity invariant: a name may not equal any
    // registered role, and a role may not equal any registered name.
    if existing.is_none() && ctx.state.role_in_use(&name).map_err(internal)? {
        return Err(RpcError::generic(format!(
            "name {name:?} collides with an existing role"
        )));
    }
    let role_is_new = !ctx.state.role_in_use(&p.role).map_err(internal)?;
    if role_is_new && ctx.state.agent_exists(&p.role).map_err(internal)? {
        return Err(RpcError::generic(format!(
            "role {:?} collides with an existing agent name",
            p.role
        )));
    }

    if let Some(existing) = &existing {
        let differs = existing.role != p.role || existing.module != p.module;
        if differs && !p.force && !p.re_register {
            return Ok(json!({
                "agent_id": name,
                "registered": false,
                "conflict": {
                    "existing_role": existing.role,
                    "existing_module": existing.module,
                },
            }));
        }
        if p.re_register {
            // Reconnecting under the stored identity: no event.
            save_identity(ctx, &name, &existing.role, &existing.module, p.display.as_deref())?;
            return Ok(json!({
                "agent_id": name,
                "role": existing.role,
                "module": existing.module,
                "registered": true,
            }));
        }
    }

    let mut events = vec![Event::AgentRegister {
        agent_id: name.clone(),
        kind: AgentKind::Agent,
        role: p.role.clone(),
        module: p.module.clone(),
        display: p.display.clone(),
        hostname: p.hostname.clone(),
    }];

    // First appearance of a role auto-creates the role group, whose sole
    // member is the role pattern.
    if ctx.state.group_by_name(&p.role).map_err(internal)?.is_none() {
        events.push(Event::GroupCreate {
            group_id: GroupId::new(),
            name: p.role.clone(),
            description: None,
            created_by: "daemon".to_string(),
            members: vec![GroupMember::role(&p.role)],
        });
    }

    ctx.commit_all(events)?;
    save_identity(ctx, &name, &p.role, &p.module, p.display.as_deref())?;

    Ok(json!({
        "agent_id": name,
        "role": p.role,
        "module": p.module,
        "registered": true,
    }))
}

fn save_identity(
    ctx: &HandlerCtx,
    name: &str,
    role: &str,
    module: &str,
    display: Option<&str>,
) -> Result<(), RpcError> {
    ctx.identities()
        .save(&Identity {
            name: name.to_string(),
            role: role.to_string(),
            module: module.to_string(),
            display: display.map(str::to_string),
        })
        .map_err(internal)
}

#[derive(Deserialize)]
struct ListParams {
    role: Option<String>,
    module: Option<String>,
    active_within_secs: Option<u64>,
}

pub fn list(ctx: &HandlerCtx, params: Option<Value>) -> Result<Value, RpcError> {
    let p: ListParams = parse_params(params)?;
    let agents = ctx
        .state
        .list_agents(
            &AgentFilter {
                role: p.role,
                module: p.module,
                active_within_secs: p.active_within_secs,
            },
            ctx.now(),
        )
        .map_err(internal)?;
    Ok(json!({ "agents": agents }))
}

pub fn whoami(ctx: &HandlerCtx, caller: &Caller) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let agent = ctx
        .state
        .get_agent(identity)
        .map_err(internal)?
        .ok_or_else(|| RpcError::unknown_agent(format!("{identity:?} is not registered")))?;
    let session = ctx.state.active_session_for(identity).map_err(internal)?;
    Ok(json!({
        "agent_id": agent.agent_id,
        "kind": agent.kind,
        "role": agent.role,
        "module": agent.module,
        "transport": caller.transport.to_string(),
        "session": session.map(session_summary),
    }))
}

fn session_summary(session: Session) -> Value {
    json!({
        "session_id": session.session_id,
        "started_at": session.started_at,
        "last_seen_at": session.last_seen_at,
        "intent": session.intent,
        "current_task": session.current_task,
    })
}

#[derive(Deserialize)]
struct ListContextParams {
    agent_id: Option<String>,
}

pub fn list_context(ctx: &HandlerCtx, params: Option<Value>) -> Result<Value, RpcError> {
    let p: ListContextParams = parse_params(params)?;
    let agents: Vec<Agent> = match &p.agent_id {
        Some(agent_id) => ctx
            .state
            .get_agent(agent_id)
            .map_err(internal)?
            .map(|a| vec![a])
            .ok_or_else(|| RpcError::unknown_agent(format!("{agent_id:?} is not registered")))?,
        None => ctx
            .state
            .list_agents(&AgentFilter::default(), ctx.now())
            .map_err(internal)?,
    };

    let mut contexts = Vec::with_capacity(agents.len());
    for agent in agents {
        let file = ctx.paths.context_file(&agent.agent_id);
        let notes = std::fs::read_to_string(&file).ok();
        let session = ctx.state.active_session_for(&agent.agent_id).map_err(internal)?;
        let work_context = match &session {
            Some(session) => ctx.state.work_context(&session.session_id).map_err(internal)?,
            None => None,
        };
        contexts.push(json!({
            "agent_id": agent.agent_id,
            "role": agent.role,
            "module": agent.module,
            "notes": notes,
            "intent": session.as_ref().and_then(|s| s.intent.clone()),
            "current_task": session.as_ref().and_then(|s| s.current_task.clone()),
            "work_context": work_context,
        }));
    }
    Ok(json!({ "contexts": contexts }))
}

#[derive(Deserialize)]
struct DeleteParams {
    agent_id: String,
}

pub fn delete(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    caller.require_identity()?;
    let p: DeleteParams = parse_params(params)?;

    if !ctx.state.agent_exists(&p.agent_id).map_err(internal)? {
        return Err(RpcError::unknown_agent(format!("{:?} is not registered", p.agent_id)));
    }

    // Close open sessions durably, then drop the projection rows. The
    // registration itself has no tombstone event: replay resurrects the
    // agent, deletion is local cleanup.
    let open = ctx.state.open_sessions_for(&p.agent_id).map_err(internal)?;
    let events: Vec<Event> = open
        .iter()
        .map(|session| Event::SessionEnd {
            session_id: session.session_id,
            agent_id: p.agent_id.clone(),
            reason: EndReason::Normal,
        })
        .collect();
    if !events.is_empty() {
        ctx.commit_all(events)?;
    }
    for session in &open {
        ctx.registry.unbind_session(&session.session_id);
    }

    ctx.state.delete_agent_local(&p.agent_id).map_err(internal)?;
    ctx.identities().remove(&p.agent_id).map_err(internal)?;

    Ok(json!({ "agent_id": p.agent_id, "deleted": true, "sessions_closed": open.len() }))
}

#[derive(Deserialize)]
struct CleanupParams {
    idle_secs: Option<u64>,
}

pub fn cleanup(ctx: &HandlerCtx, params: Option<Value>) -> Result<Value, RpcError> {
    let p: CleanupParams = parse_params(params)?;
    let idle_secs = p.idle_secs.unwrap_or(ctx.config.cleanup_idle_secs);
    let cutoff = ctx.now() - chrono::Duration::seconds(idle_secs as i64);

    let idle = ctx.state.idle_open_sessions(cutoff).map_err(internal)?;
    let mut by_agent: Vec<(String, Vec<thrum_core::SessionId>)> = Vec::new();
    for session in &idle {
        match by_agent.iter().position(|(agent, _)| *agent == session.agent_id) {
            Some(idx) => by_agent[idx].1.push(session.session_id),
            None => by_agent.push((session.agent_id.clone(), vec![session.session_id])),
        }
    }

    let closed = idle.len();
    let agents: Vec<String> = by_agent.iter().map(|(agent, _)| agent.clone()).collect();
    let events: Vec<Event> = by_agent
        .into_iter()
        .map(|(agent_id, session_ids)| Event::AgentCleanup { agent_id, session_ids })
        .collect();
    if !events.is_empty() {
        ctx.commit_all(events)?;
    }
    for session in &idle {
        ctx.registry.unbind_session(&session.session_id);
    }

    Ok(json!({ "sessions_closed": closed, "agents": agents }))
}
