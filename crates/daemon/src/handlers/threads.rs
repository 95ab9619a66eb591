// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! thread.* handlers.

use serde::Deserialize;
use serde_json::{json, Value};
use thrum_core::{Event, ThreadId};
use thrum_wire::RpcError;

use super::{internal, parse_params, HandlerCtx};
use crate::caller::Caller;

#[derive(Deserialize)]
struct CreateParams {
    title: String,
}

pub fn create(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: CreateParams = parse_params(params)?;
    if p.title.trim().is_empty() {
        return Err(RpcError::invalid_params("title must not be empty"));
    }

    let thread_id = ThreadId::new();
    ctx.commit(Event::ThreadCreate {
        thread_id,
        title: p.title.clone(),
        created_by: identity.to_string(),
    })?;

    Ok(json!({ "thread_id": thread_id, "title": p.title, "created_by": identity }))
}

pub fn list(ctx: &HandlerCtx) -> Result<Value, RpcError> {
    let threads = ctx.state.list_threads().map_err(internal)?;
    let threads: Vec<Value> = threads
        .into_iter()
        .map(|summary| {
            json!({
                "thread_id": summary.thread.thread_id,
                "title": summary.thread.title,
                "created_by": summary.thread.created_by,
                "created_at": summary.thread.created_at,
                "message_count": summary.message_count,
                "last_activity_at": summary.last_activity_at,
            })
        })
        .collect();
    Ok(json!({ "threads": threads }))
}

#[derive(Deserialize)]
struct GetParams {
    thread_id: ThreadId,
}

pub fn get(ctx: &HandlerCtx, params: Option<Value>) -> Result<Value, RpcError> {
    let p: GetParams = parse_params(params)?;
    let thread = ctx
        .state
        .get_thread(&p.thread_id)
        .map_err(internal)?
        .ok_or_else(|| RpcError::generic(format!("unknown thread {}", p.thread_id)))?;
    let messages = ctx.state.thread_messages(&p.thread_id).map_err(internal)?;
    Ok(json!({ "thread": thread, "messages": messages }))
}
