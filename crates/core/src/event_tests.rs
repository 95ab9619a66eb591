// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn event_type_tags_are_dotted() {
    let event = Event::SessionStart {
        session_id: SessionId::from_string("ses_A"),
        agent_id: "nux".to_string(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "agent.session.start");

    let event = Event::GroupMemberAdd {
        group: "reviewer".to_string(),
        member: GroupMember::role("reviewer"),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "group.member.add");
}

#[test]
fn record_envelope_flattens_event() {
    let record = LogRecord::new(
        chrono::Utc::now(),
        Event::ThreadCreate {
            thread_id: ThreadId::from_string("thr_X"),
            title: "rollout".to_string(),
            created_by: "furiosa".to_string(),
        },
    );
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["v"], 1);
    assert_eq!(json["type"], "thread.create");
    assert_eq!(json["title"], "rollout");
    assert_eq!(json["event_id"].as_str().unwrap().len(), 26);

    let parsed: LogRecord = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, record);
}

#[test]
fn unknown_event_type_fails_to_parse() {
    let line = r#"{"event_id":"01J8ZWXK2M3N4P5Q6R7S8T9V0A","v":1,"timestamp":"2026-01-01T00:00:00Z","type":"agent.unknown"}"#;
    assert!(serde_json::from_str::<LogRecord>(line).is_err());
}

#[test]
fn missing_required_field_fails_to_parse() {
    // message.create without a session_id must not deserialize.
    let line = r#"{"event_id":"01J8ZWXK2M3N4P5Q6R7S8T9V0A","v":1,"timestamp":"2026-01-01T00:00:00Z","type":"message.create","message_id":"msg_X","agent_id":"nux","body":{"content":"hi"}}"#;
    assert!(serde_json::from_str::<LogRecord>(line).is_err());
}

#[test]
fn message_events_shard_by_author() {
    let create = Event::MessageCreate {
        message_id: MessageId::new(),
        thread_id: None,
        reply_to: None,
        agent_id: "furiosa".to_string(),
        session_id: SessionId::new(),
        body: MessageBody::text("hi"),
        priority: Priority::Normal,
        authored_by: None,
        scopes: vec![],
        refs: vec![],
    };
    assert_eq!(create.message_shard(), Some("furiosa"));

    let register = Event::AgentRegister {
        agent_id: "furiosa".to_string(),
        kind: AgentKind::Agent,
        role: "implementer".to_string(),
        module: "auth".to_string(),
        display: None,
        hostname: None,
    };
    assert_eq!(register.message_shard(), None);
}

#[test]
fn session_end_reason_round_trips() {
    let event = Event::SessionEnd {
        session_id: SessionId::from_string("ses_OLD"),
        agent_id: "nux".to_string(),
        reason: EndReason::Crash,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"reason\":\"crash\""));
    let parsed: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}
