// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! user.* handlers. Registration is WebSocket-only: Unix-socket callers
//! are already attributed from the process, and a user identity minted
//! there would bypass the declared-identity model.

use serde::Deserialize;
use serde_json::{json, Value};
use thrum_core::{user, Event, TokenId};
use thrum_wire::RpcError;

use super::{internal, parse_params, HandlerCtx};
use crate::caller::{Caller, Transport};

#[derive(Deserialize)]
struct RegisterParams {
    username: String,
    display: Option<String>,
}

pub fn register(ctx: &HandlerCtx, caller: &Caller, params: Option<Value>) -> Result<Value, RpcError> {
    if caller.transport != Transport::WebSocket {
        return Err(RpcError::wrong_transport(
            "user.register is only available over the WebSocket transport",
        ));
    }
    let p: RegisterParams = parse_params(params)?;
    user::validate_username(&p.username).map_err(|e| RpcError::generic(e.to_string()))?;

    let user_id = user::user_id(&p.username);
    let token = TokenId::new();
    ctx.commit(Event::UserRegister {
        user_id: user_id.clone(),
        display: p.display,
        token,
    })?;

    Ok(json!({ "user_id": user_id, "token": token, "registered": true }))
}

#[derive(Deserialize)]
struct IdentifyParams {
    token: TokenId,
}

pub fn identify(ctx: &HandlerCtx, params: Option<Value>) -> Result<Value, RpcError> {
    let p: IdentifyParams = parse_params(params)?;
    let user_id = ctx
        .state
        .user_for_token(&p.token)
        .map_err(internal)?
        .ok_or_else(|| RpcError::generic("unknown token"))?;
    Ok(json!({ "user_id": user_id }))
}
