// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    simple = { "furiosa" },
    underscore = { "coord_main" },
    digits = { "agent99" },
    single_char = { "x" },
    max_len = { "abcdefghijklmnopqrstuvwxyz123456" },
    capitalized_reserved = { "Daemon" },
)]
fn valid_names(name: &str) {
    assert_eq!(validate_agent_name(name), Ok(()));
}

#[parameterized(
    empty = { "", NameError::Empty },
    hyphen = { "my-agent", NameError::InvalidChar("my-agent".into()) },
    space = { "my agent", NameError::InvalidChar("my agent".into()) },
    at_sign = { "@furiosa", NameError::InvalidChar("@furiosa".into()) },
    reserved_daemon = { "daemon", NameError::Reserved("daemon".into()) },
    reserved_broadcast = { "broadcast", NameError::Reserved("broadcast".into()) },
    reserved_all = { "all", NameError::Reserved("all".into()) },
)]
fn invalid_names(name: &str, expected: NameError) {
    assert_eq!(validate_agent_name(name), Err(expected));
}

#[test]
fn name_longer_than_32_rejected() {
    let name = "a".repeat(33);
    assert!(matches!(validate_agent_name(&name), Err(NameError::TooLong(_))));
}

#[test]
fn agent_serde_round_trip() {
    let agent = Agent {
        agent_id: "furiosa".to_string(),
        kind: AgentKind::Agent,
        role: "implementer".to_string(),
        module: "auth".to_string(),
        display: None,
        hostname: Some("warhost".to_string()),
        registered_at: chrono::Utc::now(),
        last_seen_at: chrono::Utc::now(),
    };
    let json = serde_json::to_string(&agent).unwrap();
    assert!(!json.contains("display"));
    let parsed: Agent = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, agent);
}

#[test]
fn kind_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&AgentKind::User).unwrap(), "\"user\"");
    assert_eq!(serde_json::to_string(&AgentKind::Agent).unwrap(), "\"agent\"");
}
