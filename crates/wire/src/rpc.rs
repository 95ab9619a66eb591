// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON-RPC 2.0 envelope types and Thrum's error-code vocabulary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error codes: the JSON-RPC 2.0 standard set plus the Thrum range.
pub mod error_codes {
    /// Malformed JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// Not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// Unknown method name.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Params failed shape validation.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal failure; carries no detail.
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Generic domain error.
    pub const GENERIC: i32 = -32000;
    /// Method not available on this transport, or caller class mismatch
    /// (e.g. only users can impersonate).
    pub const WRONG_TRANSPORT: i32 = -32001;
    /// Addressed agent does not exist.
    pub const UNKNOWN_AGENT: i32 = -32002;
    /// Caller is not the author / lacks permission on the target.
    pub const NOT_AUTHOR: i32 = -32003;
}

/// JSON-RPC 2.0 request ID. Round-trips unchanged into the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RpcId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcId::Number(n) => write!(f, "{}", n),
            RpcId::String(s) => write!(f, "{}", s),
        }
    }
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    /// Absent for client-side notifications; such requests get no response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RpcId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: RpcId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self { jsonrpc: "2.0".to_string(), id: Some(id), method: method.into(), params }
    }

    /// A request is well-formed when it declares version "2.0" and a
    /// non-empty method.
    pub fn is_valid(&self) -> bool {
        self.jsonrpc == "2.0" && !self.method.is_empty()
    }
}

/// JSON-RPC 2.0 response. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Option<RpcId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: Option<RpcId>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    pub fn failure(id: Option<RpcId>, error: RpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(error) }
    }
}

/// Server-initiated push message (no `id`): subscription notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), method: method.into(), params: Some(params) }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self { code, message: message.into(), data: Some(data) }
    }

    pub fn parse_error() -> Self {
        Self::new(error_codes::PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(error_codes::INVALID_REQUEST, "Invalid Request")
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(error_codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl std::fmt::Display) -> Self {
        Self::new(error_codes::INVALID_PARAMS, format!("Invalid params: {message}"))
    }

    /// Internal error. Deliberately detail-free so nothing from the
    /// storage layer leaks to clients.
    pub fn internal() -> Self {
        Self::new(error_codes::INTERNAL_ERROR, "Internal error")
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(error_codes::GENERIC, message)
    }

    pub fn wrong_transport(message: impl Into<String>) -> Self {
        Self::new(error_codes::WRONG_TRANSPORT, message)
    }

    pub fn unknown_agent(message: impl Into<String>) -> Self {
        Self::new(error_codes::UNKNOWN_AGENT, message)
    }

    pub fn not_author(message: impl Into<String>) -> Self {
        Self::new(error_codes::NOT_AUTHOR, message)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// One inbound line/frame: a single request or a batch array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    Batch(Vec<RpcRequest>),
    Single(RpcRequest),
}

impl Incoming {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn into_requests(self) -> Vec<RpcRequest> {
        match self {
            Incoming::Single(req) => vec![req],
            Incoming::Batch(reqs) => reqs,
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Incoming::Batch(_))
    }
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
