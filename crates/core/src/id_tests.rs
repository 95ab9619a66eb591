// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn generated_ids_have_prefix_and_length() {
    let id = MessageId::new();
    assert!(id.as_str().starts_with("msg_"));
    assert_eq!(id.as_str().len(), ID_MAX_LEN);

    let id = SessionId::new();
    assert!(id.as_str().starts_with("ses_"));
    assert_eq!(id.suffix().len(), 26);
}

#[test]
fn ids_are_unique() {
    let a = MessageId::new();
    let b = MessageId::new();
    assert_ne!(a, b);
}

#[test]
fn ids_sort_by_creation_order() {
    // ULIDs embed a millisecond timestamp; IDs minted later never sort
    // before IDs minted in an earlier millisecond.
    let first = MessageId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = MessageId::new();
    assert!(first < second);
}

#[test]
fn from_string_round_trip() {
    let id = ThreadId::from_string("thr_01J8ZWXK2M3N4P5Q6R7S8T9V0A");
    assert_eq!(id.as_str(), "thr_01J8ZWXK2M3N4P5Q6R7S8T9V0A");
    assert_eq!(id.suffix(), "01J8ZWXK2M3N4P5Q6R7S8T9V0A");
}

#[test]
fn serde_round_trip() {
    let id = GroupId::new();
    let json = serde_json::to_string(&id).unwrap();
    let parsed: GroupId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn short_truncates() {
    let id = SessionId::from_string("ses_ABCDEFGH");
    assert_eq!(id.short(4), "ABCD");
    assert_eq!(short("abcdef", 3), "abc");
    assert_eq!(short("ab", 3), "ab");
}

#[test]
fn idbuf_borrow_matches_hash() {
    use std::collections::HashMap;
    let mut map: HashMap<SessionId, u32> = HashMap::new();
    let id = SessionId::from_string("ses_X");
    map.insert(id, 1);
    assert_eq!(map.get("ses_X"), Some(&1));
}

#[test]
fn event_ids_are_bare_ulids() {
    let id = event_id();
    assert_eq!(id.len(), 26);
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
}
