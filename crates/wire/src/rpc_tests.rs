// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn request_id_round_trips_number_and_string() {
    let req: RpcRequest =
        serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"method":"health"}"#).unwrap();
    assert_eq!(req.id, Some(RpcId::Number(7)));

    let req: RpcRequest =
        serde_json::from_str(r#"{"jsonrpc":"2.0","id":"abc","method":"health"}"#).unwrap();
    assert_eq!(req.id, Some(RpcId::String("abc".to_string())));

    let out = serde_json::to_value(RpcResponse::success(req.id, json!({"ok":true}))).unwrap();
    assert_eq!(out["id"], "abc");
}

#[test]
fn notification_requests_have_no_id() {
    let req: RpcRequest =
        serde_json::from_str(r#"{"jsonrpc":"2.0","method":"session.heartbeat"}"#).unwrap();
    assert_eq!(req.id, None);
    assert!(req.is_valid());
}

#[test]
fn wrong_version_is_invalid() {
    let req: RpcRequest =
        serde_json::from_str(r#"{"jsonrpc":"1.0","id":1,"method":"health"}"#).unwrap();
    assert!(!req.is_valid());
}

#[test]
fn response_has_exactly_one_of_result_or_error() {
    let ok = RpcResponse::success(Some(RpcId::Number(1)), json!(1));
    let json_ok = serde_json::to_value(&ok).unwrap();
    assert!(json_ok.get("result").is_some());
    assert!(json_ok.get("error").is_none());

    let err = RpcResponse::failure(Some(RpcId::Number(1)), RpcError::internal());
    let json_err = serde_json::to_value(&err).unwrap();
    assert!(json_err.get("result").is_none());
    assert_eq!(json_err["error"]["code"], -32603);
}

#[test]
fn thrum_error_constructors_use_reserved_range() {
    assert_eq!(RpcError::generic("x").code, -32000);
    assert_eq!(RpcError::wrong_transport("x").code, -32001);
    assert_eq!(RpcError::unknown_agent("x").code, -32002);
    assert_eq!(RpcError::not_author("x").code, -32003);
    assert_eq!(RpcError::invalid_params("bad").code, -32602);
    assert_eq!(RpcError::parse_error().code, -32700);
}

#[test]
fn internal_error_carries_no_detail() {
    let err = RpcError::internal();
    assert_eq!(err.message, "Internal error");
    assert!(err.data.is_none());
}

#[test]
fn incoming_parses_single_and_batch() {
    let single = Incoming::parse(r#"{"jsonrpc":"2.0","id":1,"method":"health"}"#).unwrap();
    assert!(!single.is_batch());
    assert_eq!(single.into_requests().len(), 1);

    let batch = Incoming::parse(
        r#"[{"jsonrpc":"2.0","id":1,"method":"health"},{"jsonrpc":"2.0","id":2,"method":"agent.list"}]"#,
    )
    .unwrap();
    assert!(batch.is_batch());
    let reqs = batch.into_requests();
    assert_eq!(reqs.len(), 2);
    assert_eq!(reqs[1].method, "agent.list");
}

#[test]
fn error_with_data_serializes_payload() {
    let err = RpcError::with_data(
        error_codes::GENERIC,
        "unknown recipients",
        json!({"unknown": ["@nonexistent"]}),
    );
    let value = serde_json::to_value(&err).unwrap();
    assert_eq!(value["data"]["unknown"][0], "@nonexistent");
}
