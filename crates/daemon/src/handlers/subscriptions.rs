// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! subscribe / unsubscribe / subscriptions.list handlers.

use serde::Deserialize;
use serde_json::{json, Value};
use thrum_core::Tag;
use thrum_storage::{Subscription, SubscriptionKind};
use thrum_wire::RpcError;

use super::{internal, parse_params, HandlerCtx};
use crate::caller::Caller;

#[derive(Deserialize)]
struct SubscribeParams {
    scope: Option<Tag>,
    mention_role: Option<String>,
    #[serde(default)]
    all: bool,
}

pub fn subscribe(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: SubscribeParams = parse_params(params)?;

    // Exactly one discriminator.
    let kind = match (p.scope, p.mention_role, p.all) {
        (Some(scope), None, false) => SubscriptionKind::Scope(scope),
        (None, Some(mention), false) => SubscriptionKind::Mention(mention),
        (None, None, true) => SubscriptionKind::All,
        _ => {
            return Err(RpcError::invalid_params(
                "exactly one of scope, mention_role, all is required",
            ))
        }
    };

    let session = ctx
        .state
        .active_session_for(identity)
        .map_err(internal)?
        .ok_or_else(|| RpcError::generic("no active session; call session.start first"))?;

    let id = ctx
        .state
        .add_subscription(&session.session_id, &kind, ctx.now())
        .map_err(internal)?;

    // Notifications flow to the connection that subscribed.
    ctx.registry.bind_session(caller.conn_id, session.session_id);

    Ok(json!({ "subscription_id": id, "session_id": session.session_id }))
}

#[derive(Deserialize)]
struct UnsubscribeParams {
    subscription_id: i64,
}

pub fn unsubscribe(
    ctx: &HandlerCtx,
    caller: &Caller,
    params: Option<Value>,
) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let p: UnsubscribeParams = parse_params(params)?;

    let subscription = ctx
        .state
        .get_subscription(p.subscription_id)
        .map_err(internal)?
        .ok_or_else(|| {
            RpcError::generic(format!("unknown subscription {}", p.subscription_id))
        })?;

    let session = ctx
        .state
        .get_session(&subscription.session_id)
        .map_err(internal)?;
    let owner = session.map(|s| s.agent_id).unwrap_or_default();
    if owner != identity {
        return Err(RpcError::not_author("subscription belongs to another session"));
    }

    ctx.state.remove_subscription(p.subscription_id).map_err(internal)?;
    Ok(json!({ "subscription_id": p.subscription_id, "removed": true }))
}

pub fn list(ctx: &HandlerCtx, caller: &Caller) -> Result<Value, RpcError> {
    let identity = caller.require_identity()?;
    let session = ctx
        .state
        .active_session_for(identity)
        .map_err(internal)?
        .ok_or_else(|| RpcError::generic("no active session; call session.start first"))?;

    let subscriptions = ctx
        .state
        .subscriptions_for_session(&session.session_id)
        .map_err(internal)?;
    let subscriptions: Vec<Value> = subscriptions.iter().map(describe).collect();
    Ok(json!({ "session_id": session.session_id, "subscriptions": subscriptions }))
}

fn describe(subscription: &Subscription) -> Value {
    match &subscription.kind {
        SubscriptionKind::All => json!({
            "subscription_id": subscription.id,
            "all": true,
        }),
        SubscriptionKind::Scope(tag) => json!({
            "subscription_id": subscription.id,
            "scope": tag,
        }),
        SubscriptionKind::Mention(value) => json!({
            "subscription_id": subscription.id,
            "mention_role": value,
        }),
    }
}
