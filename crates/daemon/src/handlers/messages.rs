// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! message.* handlers: send with mention expansion, list, edit,
//! soft-delete, read marks.

use serde::Deserialize;
use serde_json::{json, Value};
use thrum_core::{
    user, BodyFormat, Event, Message, MessageBody, MessageId, Priority, Session, Tag, ThreadId,
    REF_MENTION, REF_REPLY, SCOPE_GROUP,
};
use thrum_storage::{MessageFilter, SortKey, SortOrder};
use thrum_wire::RpcError;

use super::{internal, parse_params, HandlerCtx};
use crate::caller::Caller;

#[derive(Deserialize)]
struct SendParams {
    content: String,
    format: Option<BodyFormat>,
    structured: Option<Value>,
    #[serde(default)]
    mentions: Vec<String>,
    #[serde(default)]
    scopes: Vec<Tag>,
    #[serde(default)]
    refs: Vec<Tag>,
    priority: Option<Priority>,
    reply_to: Option<MessageId>,
    thread_id: Option<ThreadId>,
    acting_as: Option<String>,
    #[serde(default)]
    disclose: bool,
}

/// Resolution of one mention literal.
enum Resolved {
    Group(String),
    Mention(String),
    Unknown(String),
}

pub fn send(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: SendParams = parse_params(params)?;
    if p.content.is_empty() {
        return Err(RpcError::invalid_params("content must not be empty"));
    }

    // Impersonation: only a user may act as an agent. authored_by then
    // records the impersonator.
    let (author, authored_by) = match &p.acting_as {
        None => (identity.to_string(), None),
        Some(target) => {
            if !caller.is_user() {
                return Err(RpcError::wrong_transport("only users can impersonate"));
            }
            if user::is_user_id(target) {
                return Err(RpcError::wrong_transport(
                    "acting_as target must be an agent",
                ));
            }
            if !ctx.state.agent_exists(target).map_err(internal)? {
                return Err(RpcError::unknown_agent(format!("{target:?} is not registered")));
            }
            (target.clone(), Some(identity.to_string()))
        }
    };

    let session = active_session(ctx, &author)?;

    // Expand mentions: a group name lifts to a group scope, an agent
    // name or role records a mention ref, anything else is an unknown
    // recipient and fails the whole send atomically.
    let mut scopes = p.scopes.clone();
    let mut refs = p.refs.clone();
    let mut unknown: Vec<String> = Vec::new();
    for literal in &p.mentions {
        match resolve_mention(ctx, literal)? {
            Resolved::Group(name) => {
                let tag = Tag::group(&name);
                if !scopes.contains(&tag) {
                    scopes.push(tag);
                }
            }
            Resolved::Mention(name) => {
                let tag = Tag::mention(&name);
                if !refs.contains(&tag) {
                    refs.push(tag);
                }
            }
            Resolved::Unknown(literal) => unknown.push(format!("@{literal}")),
        }
    }
    if !unknown.is_empty() {
        return Err(RpcError::with_data(
            thrum_wire::error_codes::UNKNOWN_AGENT,
            format!("unknown recipients: {}", unknown.join(", ")),
            json!({ "unknown": unknown }),
        ));
    }

    // A reply joins its parent's thread unless overridden.
    let thread_id = match (p.thread_id, &p.reply_to) {
        (Some(thread_id), _) => Some(thread_id),
        (None, Some(reply_to)) => ctx
            .state
            .get_message(reply_to)
            .map_err(internal)?
            .and_then(|parent| parent.thread_id),
        (None, None) => None,
    };
    if let Some(reply_to) = &p.reply_to {
        let tag = Tag::new(REF_REPLY, reply_to.as_str());
        if !refs.contains(&tag) {
            refs.push(tag);
        }
    }

    let resolved_to = count_recipients(ctx, &scopes, &refs)?;

    let message_id = MessageId::new();
    let body = MessageBody {
        format: p.format.unwrap_or_default(),
        content: p.content,
        structured: p.structured,
    };
    let priority = p.priority.unwrap_or_default();
    let record = ctx.commit(Event::MessageCreate {
        message_id,
        thread_id,
        reply_to: p.reply_to,
        agent_id: author.clone(),
        session_id: session.session_id,
        body: body.clone(),
        priority,
        authored_by: authored_by.clone(),
        scopes: scopes.clone(),
        refs: refs.clone(),
    })?;

    ctx.notify(Message {
        message_id,
        thread_id,
        reply_to: p.reply_to,
        agent_id: author,
        session_id: session.session_id,
        body,
        created_at: record.timestamp,
        updated_at: None,
        deleted_at: None,
        delete_reason: None,
        priority,
        authored_by,
        scopes,
        refs,
    });

    Ok(json!({
        "message_id": message_id,
        "thread_id": thread_id,
        "resolved_to": resolved_to,
        "disclosed": p.disclose,
    }))
}

fn resolve_mention(ctx: &HandlerCtx, literal: &str) -> Result<Resolved, RpcError> {
    let name = literal.trim_start_matches('@');
    if name.is_empty() {
        return Ok(Resolved::Unknown(String::new()));
    }
    if ctx.state.group_by_name(name).map_err(internal)?.is_some() {
        return Ok(Resolved::Group(name.to_string()));
    }
    if ctx.state.agent_exists(name).map_err(internal)?
        || ctx.state.role_in_use(name).map_err(internal)?
    {
        return Ok(Resolved::Mention(name.to_string()));
    }
    Ok(Resolved::Unknown(name.to_string()))
}

/// Distinct agents the message resolves to: mention refs plus expanded
/// group scopes.
fn count_recipients(ctx: &HandlerCtx, scopes: &[Tag], refs: &[Tag]) -> Result<u64, RpcError> {
    let mut recipients: Vec<String> = refs
        .iter()
        .filter(|r| r.tag_type == REF_MENTION)
        .map(|r| r.value.clone())
        .collect();
    for scope in scopes.iter().filter(|s| s.tag_type == SCOPE_GROUP) {
        recipients.extend(ctx.state.expand_group(&scope.value).map_err(internal)?);
    }
    recipients.sort();
    recipients.dedup();
    Ok(recipients.len() as u64)
}

fn active_session(ctx: &HandlerCtx, agent_id: &str) -> Result<Session, RpcError> {
    ctx.state
        .active_session_for(agent_id)
        .map_err(internal)?
        .ok_or_else(|| {
            RpcError::generic(format!("{agent_id:?} has no active session; call session.start"))
        })
}

#[derive(Deserialize)]
struct GetParams {
    message_id: MessageId,
}

pub fn get(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let p: GetParams = parse_params(params)?;
    let message = ctx
        .state
        .get_message(&p.message_id)
        .map_err(internal)?
        .ok_or_else(|| RpcError::generic(format!("unknown message {}", p.message_id)))?;
    let is_read = match &caller.identity {
        Some(identity) => ctx.state.is_read_by(&p.message_id, identity).map_err(internal)?,
        None => false,
    };
    let also_read_by = ctx.state.also_read_by(&p.message_id).map_err(internal)?;
    Ok(json!({ "message": message, "is_read": is_read, "also_read_by": also_read_by }))
}

#[derive(Deserialize)]
struct ListParams {
    thread_id: Option<ThreadId>,
    author: Option<String>,
    scope: Option<Tag>,
    #[serde(rename = "ref")]
    reference: Option<Tag>,
    mentions: Option<String>,
    #[serde(default)]
    unread: bool,
    for_agent: Option<String>,
    for_agent_role: Option<String>,
    #[serde(default)]
    include_deleted: bool,
    #[serde(default)]
    exclude_self: bool,
    sort: Option<String>,
    order: Option<String>,
    page: Option<u32>,
    page_size: Option<u32>,
}

pub fn list(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let p: ListParams = parse_params(params)?;

    let sort = match p.sort.as_deref() {
        None | Some("created_at") => SortKey::CreatedAt,
        Some("updated_at") => SortKey::UpdatedAt,
        Some(other) => {
            return Err(RpcError::invalid_params(format!(
                "sort must be created_at or updated_at, got {other:?}"
            )))
        }
    };
    let order = match p.order.as_deref() {
        None | Some("asc") => SortOrder::Asc,
        Some("desc") => SortOrder::Desc,
        Some(other) => {
            return Err(RpcError::invalid_params(format!(
                "order must be asc or desc, got {other:?}"
            )))
        }
    };

    let filter = MessageFilter {
        thread_id: p.thread_id,
        author: p.author,
        scope: p.scope,
        reference: p.reference,
        mentions: p.mentions,
        for_agent: p.for_agent,
        for_agent_role: p.for_agent_role,
        unread_only: p.unread,
        include_deleted: p.include_deleted,
        exclude_self: p.exclude_self.then(|| caller.identity.clone()).flatten(),
        reader: caller.identity.clone(),
        sort,
        order,
        page: p.page.unwrap_or(1),
        page_size: p.page_size.unwrap_or(0),
    };

    let page = ctx.state.list_messages(&filter).map_err(internal)?;
    let messages: Vec<Value> = page
        .messages
        .iter()
        .zip(&page.read_flags)
        .map(|(message, is_read)| {
            let mut value = serde_json::to_value(message).unwrap_or(Value::Null);
            if let Value::Object(map) = &mut value {
                map.insert("is_read".to_string(), json!(is_read));
            }
            value
        })
        .collect();

    Ok(json!({
        "messages": messages,
        "unread": page.unread,
        "total": page.total,
    }))
}

#[derive(Deserialize)]
struct EditParams {
    message_id: MessageId,
    content: String,
}

pub fn edit(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: EditParams = parse_params(params)?;

    let message = ctx
        .state
        .get_message(&p.message_id)
        .map_err(internal)?
        .ok_or_else(|| RpcError::generic(format!("unknown message {}", p.message_id)))?;
    if message.is_deleted() {
        return Err(RpcError::generic("cannot edit a deleted message"));
    }
    if message.owner() != identity {
        return Err(RpcError::not_author("only the author may edit this message"));
    }

    ctx.commit(Event::MessageEdit {
        message_id: p.message_id,
        agent_id: message.agent_id,
        content: p.content,
    })?;

    Ok(json!({
        "message_id": p.message_id,
        "updated_at": message.updated_at.unwrap_or(0) + 1,
    }))
}

#[derive(Deserialize)]
struct DeleteParams {
    message_id: MessageId,
    reason: Option<String>,
}

pub fn delete(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: DeleteParams = parse_params(params)?;

    let message = ctx
        .state
        .get_message(&p.message_id)
        .map_err(internal)?
        .ok_or_else(|| RpcError::generic(format!("unknown message {}", p.message_id)))?;
    if message.owner() != identity {
        return Err(RpcError::not_author("only the author may delete this message"));
    }
    if message.is_deleted() {
        return Ok(json!({ "message_id": p.message_id, "deleted": true }));
    }

    ctx.commit(Event::MessageDelete {
        message_id: p.message_id,
        agent_id: message.agent_id,
        reason: p.reason,
    })?;

    Ok(json!({ "message_id": p.message_id, "deleted": true }))
}

#[derive(Deserialize)]
struct MarkReadParams {
    #[serde(default)]
    message_ids: Vec<MessageId>,
    #[serde(default)]
    all_for_agent: bool,
}

pub fn mark_read(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: MarkReadParams = parse_params(params)?;
    let session = active_session(ctx, identity)?;

    let mut targets = p.message_ids;
    if p.all_for_agent {
        let role = ctx
            .state
            .get_agent(identity)
            .map_err(internal)?
            .map(|a| a.role)
            .unwrap_or_default();
        loop {
            let page = ctx
                .state
                .list_messages(&MessageFilter {
                    for_agent: Some(identity.to_string()),
                    for_agent_role: Some(role.clone()),
                    unread_only: true,
                    reader: Some(identity.to_string()),
                    page_size: thrum_storage::MAX_PAGE_SIZE,
                    ..Default::default()
                })
                .map_err(internal)?;
            if page.messages.is_empty() {
                break;
            }
            targets.extend(page.messages.iter().map(|m| m.message_id));
            // Marking happens below; loop again in case more than one
            // page was unread.
            for message in &page.messages {
                ctx.state
                    .mark_read(&message.message_id, &session.session_id, identity, ctx.now())
                    .map_err(internal)?;
            }
        }
        targets.sort();
        targets.dedup();
    }

    // Read-state writes are best-effort: unknown IDs are skipped, never
    // an error back to the caller.
    let mut results = Vec::with_capacity(targets.len());
    for message_id in &targets {
        if ctx.state.get_message(message_id).map_err(internal)?.is_none() {
            continue;
        }
        ctx.state
            .mark_read(message_id, &session.session_id, identity, ctx.now())
            .map_err(internal)?;
        let also_read_by = ctx.state.also_read_by(message_id).map_err(internal)?;
        results.push(json!({ "message_id": message_id, "also_read_by": also_read_by }));
    }

    Ok(json!({ "read": results }))
}
