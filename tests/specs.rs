// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end scenarios against a live daemon.
//!
//! Each test starts a real daemon in a temp repository and talks to it
//! the way clients do: line-delimited JSON-RPC over the Unix socket,
//! or through the shared handler context where a WebSocket-registered
//! user is needed.

use serde_json::{json, Value};
use serial_test::serial;
use thrum_daemon::caller::{Caller, Transport};
use thrum_daemon::config::{DaemonConfig, PortStrategy};
use thrum_daemon::handlers;
use thrum_daemon::{startup, DaemonState, ThrumPaths};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

struct TestRepo {
    _dir: tempfile::TempDir,
    paths: ThrumPaths,
    port: u16,
}

impl TestRepo {
    fn new(port: u16) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".thrum")).unwrap();
        let paths = ThrumPaths::at_repo_root(dir.path()).unwrap();
        Self { _dir: dir, paths, port }
    }

    async fn start(&self) -> DaemonState {
        let config = DaemonConfig {
            ws_port: PortStrategy::Fixed(self.port),
            ..Default::default()
        };
        startup(self.paths.clone(), config).await.unwrap()
    }
}

/// A Unix-socket client speaking line-delimited JSON-RPC.
struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: i64,
}

impl Client {
    async fn connect(paths: &ThrumPaths) -> Self {
        let stream = UnixStream::connect(paths.socket_path()).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self { reader: BufReader::new(read_half), next_id: 0, writer }
    }

    async fn read_frame(&mut self) -> Value {
        let mut line = String::new();
        let n = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            self.reader.read_line(&mut line),
        )
        .await
        .expect("read timed out")
        .unwrap();
        assert!(n > 0, "connection closed");
        serde_json::from_str(line.trim()).unwrap()
    }

    /// Send one request and wait for its response, queueing up nothing:
    /// push notifications that arrive first are skipped by callers that
    /// expect them via [`Client::notification`].
    async fn call(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id;
        let request =
            json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let mut frame = request.to_string();
        frame.push('\n');
        self.writer.write_all(frame.as_bytes()).await.unwrap();

        loop {
            let value = self.read_frame().await;
            if value["id"] == json!(id) {
                return value;
            }
        }
    }

    async fn expect_ok(&mut self, method: &str, params: Value) -> Value {
        let response = self.call(method, params).await;
        assert!(
            response["error"].is_null(),
            "{method} failed: {}",
            response["error"]
        );
        response["result"].clone()
    }

    /// The next server-push frame (a request-less message).
    async fn notification(&mut self) -> Value {
        loop {
            let value = self.read_frame().await;
            if value.get("method").is_some() {
                return value;
            }
        }
    }

    /// Register + start a session, returning the session id.
    async fn go_online(&mut self, name: &str, role: &str, module: &str) -> String {
        self.expect_ok(
            "agent.register",
            json!({ "name": name, "role": role, "module": module }),
        )
        .await;
        let session = self.expect_ok("session.start", json!({})).await;
        session["session_id"].as_str().unwrap().to_string()
    }
}

// Scenario: register, send to an existing agent, see the push arrive.
#[tokio::test]
#[serial]
async fn quickstart_send_and_notify() {
    let repo = TestRepo::new(19901);
    let daemon = repo.start().await;

    let mut coord = Client::connect(&repo.paths).await;
    coord.go_online("coord_main", "coordinator", "core").await;
    coord
        .expect_ok("subscribe", json!({ "mention_role": "coord_main" }))
        .await;

    let mut furiosa = Client::connect(&repo.paths).await;
    furiosa.go_online("furiosa", "implementer", "auth").await;
    let result = furiosa
        .expect_ok(
            "message.send",
            json!({ "content": "Auth module complete", "mentions": ["@coord_main"] }),
        )
        .await;
    assert_eq!(result["resolved_to"], 1);
    assert!(result["message_id"].as_str().unwrap().starts_with("msg_"));

    let push = coord.notification().await;
    assert_eq!(push["method"], "notification.message");
    assert_eq!(push["params"]["preview"], "Auth module complete");
    assert_eq!(push["params"]["author"], "furiosa");
    assert_eq!(push["params"]["matched_subscription"]["match_type"], "mention");

    daemon.shutdown().await;
}

// Scenario: a role mention becomes a group scope and fans out.
#[tokio::test]
#[serial]
async fn role_fan_out_via_group() {
    let repo = TestRepo::new(19902);
    let daemon = repo.start().await;

    let mut a1 = Client::connect(&repo.paths).await;
    a1.go_online("a1", "reviewer", "m").await;
    let mut a2 = Client::connect(&repo.paths).await;
    a2.go_online("a2", "reviewer", "m").await;
    let mut a3 = Client::connect(&repo.paths).await;
    a3.go_online("a3", "implementer", "m").await;

    let sent = a3
        .expect_ok(
            "message.send",
            json!({ "content": "please review", "mentions": ["@reviewer"] }),
        )
        .await;
    assert_eq!(sent["resolved_to"], 2);

    // The message carries a group scope, not a mention ref.
    let listed = a1
        .expect_ok(
            "message.list",
            json!({ "for_agent": "a1", "for_agent_role": "reviewer" }),
        )
        .await;
    assert_eq!(listed["messages"].as_array().unwrap().len(), 1);
    let message = &listed["messages"][0];
    assert_eq!(message["scopes"][0]["type"], "group");
    assert_eq!(message["scopes"][0]["value"], "reviewer");
    assert!(message["refs"].as_array().is_none_or(|refs| refs.is_empty()));
    assert_eq!(message["is_read"], false);

    let listed = a2
        .expect_ok(
            "message.list",
            json!({ "for_agent": "a2", "for_agent_role": "reviewer" }),
        )
        .await;
    assert_eq!(listed["messages"].as_array().unwrap().len(), 1);

    // The author with exclude_self sees nothing.
    let listed = a3
        .expect_ok(
            "message.list",
            json!({
                "for_agent": "a3",
                "for_agent_role": "implementer",
                "exclude_self": true,
            }),
        )
        .await;
    assert!(listed["messages"].as_array().unwrap().is_empty());

    daemon.shutdown().await;
}

// Scenario: unknown recipients fail the send atomically.
#[tokio::test]
#[serial]
async fn unknown_recipient_rejection() {
    let repo = TestRepo::new(19903);
    let daemon = repo.start().await;

    let mut furiosa = Client::connect(&repo.paths).await;
    furiosa.go_online("furiosa", "implementer", "auth").await;

    let response = furiosa
        .call(
            "message.send",
            json!({ "content": "hi", "mentions": ["@nonexistent"] }),
        )
        .await;
    assert_eq!(response["error"]["code"], -32002);
    assert_eq!(response["error"]["data"]["unknown"][0], "@nonexistent");

    let listed = furiosa.expect_ok("message.list", json!({})).await;
    assert_eq!(listed["total"], 0);

    // No message event reached the log either: restart and rebuild.
    daemon.shutdown().await;
    std::fs::remove_file(repo.paths.db_path()).unwrap();
    let daemon = repo.start().await;
    let mut furiosa = Client::connect(&repo.paths).await;
    let listed = furiosa.expect_ok("message.list", json!({})).await;
    assert_eq!(listed["total"], 0);
    daemon.shutdown().await;
}

// Scenario: a user impersonates an agent; ownership follows authored_by.
#[tokio::test]
#[serial]
async fn impersonation_ownership() {
    let repo = TestRepo::new(19904);
    let daemon = repo.start().await;

    let mut furiosa = Client::connect(&repo.paths).await;
    furiosa.go_online("furiosa", "implementer", "auth").await;

    // A user registered over the WebSocket transport, driven through
    // the shared handler context.
    let mut leon = Caller::new(Transport::WebSocket, None, 999);
    let registered = handlers::dispatch(
        &daemon.handlers,
        &leon,
        "user.register",
        Some(json!({ "username": "leon" })),
    )
    .await
    .unwrap();
    assert_eq!(registered["user_id"], "user:leon");
    leon.identity = Some("user:leon".to_string());

    let sent = handlers::dispatch(
        &daemon.handlers,
        &leon,
        "message.send",
        Some(json!({ "content": "as furiosa", "acting_as": "furiosa", "disclose": true })),
    )
    .await
    .unwrap();
    let message_id = sent["message_id"].as_str().unwrap().to_string();

    let got = furiosa
        .expect_ok("message.get", json!({ "message_id": message_id }))
        .await;
    assert_eq!(got["message"]["agent_id"], "furiosa");
    assert_eq!(got["message"]["authored_by"], "user:leon");

    // Editing as furiosa fails with -32003.
    let response = furiosa
        .call(
            "message.edit",
            json!({ "message_id": message_id, "content": "mine" }),
        )
        .await;
    assert_eq!(response["error"]["code"], -32003);

    // Editing as the impersonating user succeeds.
    handlers::dispatch(
        &daemon.handlers,
        &leon,
        "message.edit",
        Some(json!({ "message_id": message_id, "content": "still leon" })),
    )
    .await
    .unwrap();

    daemon.shutdown().await;
}

// Scenario: sessions orphaned by a daemon restart close with `crash`.
#[tokio::test]
#[serial]
async fn orphan_recovery_across_restart() {
    let repo = TestRepo::new(19905);
    let daemon = repo.start().await;

    let mut nux = Client::connect(&repo.paths).await;
    let old_session = nux.go_online("nux", "war_boy", "engine").await;

    drop(nux);
    daemon.shutdown().await;
    let daemon = repo.start().await;

    let mut nux = Client::connect(&repo.paths).await;
    nux.expect_ok(
        "agent.register",
        json!({ "name": "nux", "role": "war_boy", "module": "engine", "re_register": true }),
    )
    .await;
    let result = nux.expect_ok("session.start", json!({})).await;
    let new_session = result["session_id"].as_str().unwrap();
    assert_ne!(new_session, old_session);
    assert_eq!(result["recovered"][0], old_session.as_str());

    let sessions = nux
        .expect_ok("session.list", json!({ "agent_id": "nux" }))
        .await;
    let old = sessions["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["session_id"] == old_session.as_str())
        .unwrap();
    assert_eq!(old["end_reason"], "crash");

    daemon.shutdown().await;
}

// Scenario: delete the projection; the rebuilt daemon answers the same.
#[tokio::test]
#[serial]
async fn projection_rebuild_preserves_queries() {
    let repo = TestRepo::new(19906);
    let daemon = repo.start().await;

    let mut furiosa = Client::connect(&repo.paths).await;
    furiosa.go_online("furiosa", "implementer", "auth").await;
    let mut nux = Client::connect(&repo.paths).await;
    let nux_session = nux.go_online("nux", "war_boy", "engine").await;

    for i in 0..5 {
        furiosa
            .expect_ok(
                "message.send",
                json!({ "content": format!("status {i}"), "mentions": ["@nux"] }),
            )
            .await;
    }
    nux.expect_ok("subscribe", json!({ "all": true })).await;

    let before = nux
        .expect_ok(
            "message.list",
            json!({ "for_agent": "nux", "for_agent_role": "war_boy" }),
        )
        .await;

    daemon.shutdown().await;
    std::fs::remove_file(repo.paths.db_path()).unwrap();
    let daemon = repo.start().await;

    let mut nux = Client::connect(&repo.paths).await;
    let after = nux
        .expect_ok(
            "message.list",
            json!({ "for_agent": "nux", "for_agent_role": "war_boy" }),
        )
        .await;
    assert_eq!(before["messages"], after["messages"]);
    assert_eq!(after["total"], 5);

    // Per-process tables restart empty: the old session's subscription
    // is gone.
    let subs = daemon
        .handlers
        .state
        .subscriptions_for_session(&thrum_core::SessionId::from_string(&nux_session))
        .unwrap();
    assert!(subs.is_empty());

    daemon.shutdown().await;
}

// Batches work over the socket: one line in, one array out.
#[tokio::test]
#[serial]
async fn batched_requests_over_socket() {
    let repo = TestRepo::new(19907);
    let daemon = repo.start().await;

    let stream = UnixStream::connect(repo.paths.socket_path()).await.unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let batch = json!([
        { "jsonrpc": "2.0", "id": 1, "method": "health" },
        { "jsonrpc": "2.0", "id": 2, "method": "agent.list" },
    ]);
    let mut frame = batch.to_string();
    frame.push('\n');
    writer.write_all(frame.as_bytes()).await.unwrap();

    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    let value: Value = serde_json::from_str(line.trim()).unwrap();
    let responses = value.as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["result"]["status"], "ok");
    assert!(responses[1]["result"]["agents"].as_array().unwrap().is_empty());

    daemon.shutdown().await;
}
