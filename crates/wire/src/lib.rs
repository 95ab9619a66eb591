// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 protocol for daemon communication.
//!
//! Wire format: one JSON-RPC message per newline-terminated line on the
//! Unix socket, one message per text frame on the WebSocket. Batches are
//! JSON arrays of requests.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod frame;
mod rpc;

pub use frame::{read_line, write_line, ProtocolError, MAX_LINE_BYTES};
pub use rpc::{
    error_codes, Incoming, Notification, RpcError, RpcId, RpcRequest, RpcResponse,
};
