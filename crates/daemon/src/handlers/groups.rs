// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! group.* handlers.

use serde::Deserialize;
use serde_json::{json, Value};
use thrum_core::{
    validate_agent_name, Event, GroupId, GroupMember, MemberType, EVERYONE_GROUP, WILDCARD_ROLE,
};
use thrum_wire::RpcError;

use super::{internal, parse_params, HandlerCtx};
use crate::caller::Caller;

#[derive(Deserialize)]
struct CreateParams {
    name: String,
    description: Option<String>,
    #[serde(default)]
    members: Vec<GroupMember>,
}

pub fn create(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: CreateParams = parse_params(params)?;

    // Group names share the mention namespace with agent names.
    validate_agent_name(&p.name).map_err(|e| RpcError::generic(format!("invalid group name: {e}")))?;
    if ctx.state.group_by_name(&p.name).map_err(internal)?.is_some() {
        return Err(RpcError::generic(format!("group {:?} already exists", p.name)));
    }

    let group_id = GroupId::new();
    ctx.commit(Event::GroupCreate {
        group_id,
        name: p.name.clone(),
        description: p.description.clone(),
        created_by: identity.to_string(),
        members: p.members.clone(),
    })?;

    Ok(json!({
        "group_id": group_id,
        "name": p.name,
        "members": p.members,
    }))
}

pub fn list(ctx: &HandlerCtx) -> Result<Value, RpcError> {
    let groups = ctx.state.list_groups().map_err(internal)?;
    let mut out = Vec::with_capacity(groups.len());
    for (group, member_count) in groups {
        let members = ctx.state.group_members(&group.name).map_err(internal)?;
        out.push(json!({
            "group_id": group.group_id,
            "name": group.name,
            "description": group.description,
            "created_by": group.created_by,
            "created_at": group.created_at,
            "member_count": member_count,
            "members": members,
        }));
    }
    Ok(json!({ "groups": out }))
}

#[derive(Deserialize)]
struct MemberParams {
    group: String,
    #[serde(rename = "type")]
    member_type: MemberType,
    value: String,
}

pub fn add_member(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    caller.require_identity()?;
    let p: MemberParams = parse_params(params)?;
    require_group(ctx, &p.group)?;

    let member = GroupMember { member_type: p.member_type, value: p.value };
    if member.member_type == MemberType::Agent
        && !ctx.state.agent_exists(&member.value).map_err(internal)?
    {
        return Err(RpcError::unknown_agent(format!(
            "{:?} is not registered",
            member.value
        )));
    }

    ctx.commit(Event::GroupMemberAdd { group: p.group.clone(), member: member.clone() })?;
    Ok(json!({ "group": p.group, "member": member, "added": true }))
}

pub fn remove_member(
    ctx: &HandlerCtx,
    caller: &Caller,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    caller.require_identity()?;
    let p: MemberParams = parse_params(params)?;
    require_group(ctx, &p.group)?;

    // The everyone group keeps its wildcard; removing it would silently
    // stop broadcast coverage.
    if p.group == EVERYONE_GROUP
        && p.member_type == MemberType::Role
        && p.value == WILDCARD_ROLE
    {
        return Err(RpcError::generic("the everyone group keeps its wildcard member"));
    }

    let member = GroupMember { member_type: p.member_type, value: p.value };
    ctx.commit(Event::GroupMemberRemove { group: p.group.clone(), member: member.clone() })?;
    Ok(json!({ "group": p.group, "member": member, "removed": true }))
}

fn require_group(ctx: &HandlerCtx, name: &str) -> Result<(), RpcError> {
    match ctx.state.group_by_name(name).map_err(internal)? {
        Some(_) => Ok(()),
        None => Err(RpcError::generic(format!("unknown group {name:?}"))),
    }
}
