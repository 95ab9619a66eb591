// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport layer: accept loops and per-connection serving.
//!
//! Both transports share [`handle_frame`]: parse one inbound line or
//! text frame (single request or batch), dispatch each request, and
//! build the outbound frame. Responses ride the same bounded outbound
//! queue as push notifications, so a connection's frames stay ordered.

pub mod unix;
pub mod ws;

use serde_json::Value;
use thrum_wire::{Incoming, RpcError, RpcResponse};
use tracing::debug;

use crate::caller::Caller;
use crate::handlers::{self, HandlerCtx};

/// Handle one raw inbound frame. Returns the serialized response frame,
/// or `None` when nothing should be written (notification-only input).
pub(crate) async fn handle_frame(
    ctx: &HandlerCtx,
    caller: &mut Caller,
    raw: &str,
) -> Option<String> {
    let incoming = match Incoming::parse(raw) {
        Ok(incoming) => incoming,
        Err(e) => {
            debug!(error = %e, "unparseable frame");
            let response = RpcResponse::failure(None, RpcError::parse_error());
            return serde_json::to_string(&response).ok();
        }
    };

    let is_batch = incoming.is_batch();
    let requests = incoming.into_requests();
    if requests.is_empty() {
        let response = RpcResponse::failure(None, RpcError::invalid_request());
        return serde_json::to_string(&response).ok();
    }

    let mut responses: Vec<RpcResponse> = Vec::with_capacity(requests.len());
    for request in requests {
        if !request.is_valid() {
            responses.push(RpcResponse::failure(request.id, RpcError::invalid_request()));
            continue;
        }
        let id = request.id;
        debug!(method = %request.method, "dispatching request");
        match handlers::dispatch(ctx, caller, &request.method, request.params).await {
            Ok(value) => {
                attribute_connection(caller, &request.method, &value);
                // Requests without an id are notifications: no response.
                if id.is_some() {
                    responses.push(RpcResponse::success(id, value));
                }
            }
            Err(error) => {
                if id.is_some() {
                    responses.push(RpcResponse::failure(id, error));
                }
            }
        }
    }

    if responses.is_empty() {
        return None;
    }
    if is_batch {
        serde_json::to_string(&responses).ok()
    } else {
        serde_json::to_string(&responses[0]).ok()
    }
}

/// Registration earns the connection its identity. The WebSocket starts
/// anonymous and picks it up here; a Unix connection may upgrade from
/// ambiguous-anonymous the same way.
fn attribute_connection(caller: &mut Caller, method: &str, result: &Value) {
    let identity = match method {
        "agent.register" if result["registered"] == Value::Bool(true) => {
            result["agent_id"].as_str()
        }
        "user.register" => result["user_id"].as_str(),
        "user.identify" if caller.identity.is_none() => result["user_id"].as_str(),
        _ => None,
    };
    if let Some(identity) = identity {
        caller.identity = Some(identity.to_string());
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
