// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sync.* handlers: log-shard offsets and checkpoints. The transport
//! that moves shards between machines lives outside the daemon; these
//! methods expose its bookkeeping.

use serde_json::{json, Value};
use thrum_core::Event;
use thrum_wire::RpcError;

use super::{internal, HandlerCtx};

pub fn status(ctx: &HandlerCtx) -> Result<Value, RpcError> {
    let shards = ctx.state.log().shard_offsets().map_err(internal)?;
    let shards: Vec<Value> = shards
        .iter()
        .map(|(shard, bytes)| json!({ "shard": shard, "bytes": bytes }))
        .collect();
    let checkpoints = ctx.state.checkpoints().map_err(internal)?;
    let checkpoints: Vec<Value> = checkpoints
        .iter()
        .map(|cp| {
            json!({
                "peer": cp.peer,
                "shard": cp.shard,
                "offset": cp.offset,
                "updated_at": cp.updated_at,
            })
        })
        .collect();
    Ok(json!({
        "configured": ctx.config.sync_configured(),
        "peer": ctx.config.sync_peer,
        "shards": shards,
        "checkpoints": checkpoints,
    }))
}

pub fn force(ctx: &HandlerCtx) -> Result<Value, RpcError> {
    let Some(peer) = ctx.config.sync_peer.clone() else {
        return Err(RpcError::generic("no sync backend configured"));
    };

    let shards = ctx.state.log().shard_offsets().map_err(internal)?;
    let events: Vec<Event> = shards
        .iter()
        .map(|(shard, bytes)| Event::SyncCheckpoint {
            peer: peer.clone(),
            shard: shard.clone(),
            offset: *bytes,
        })
        .collect();
    let count = events.len();
    if !events.is_empty() {
        ctx.commit_all(events)?;
    }
    Ok(json!({ "peer": peer, "checkpointed": count }))
}
