// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::messages::{MessageFilter, SortOrder};
use thrum_core::Event;

/// furiosa (implementer), nux + slit (war_boy with role group), plus a
/// session each for furiosa and nux.
fn seed(state: &State) -> (SessionId, SessionId) {
    register(state, "furiosa", "implementer", "auth");
    register(state, "nux", "war_boy", "engine");
    register(state, "slit", "war_boy", "engine");
    let furiosa = start_session(state, "furiosa");
    let nux = start_session(state, "nux");
    (furiosa, nux)
}

fn for_agent(state: &State, agent: &str, role: &str) -> Vec<MessageId> {
    let page = state
        .list_messages(&MessageFilter {
            for_agent: Some(agent.to_string()),
            for_agent_role: Some(role.to_string()),
            page_size: 100,
            ..Default::default()
        })
        .unwrap();
    page.messages.iter().map(|m| m.message_id).collect()
}

#[test]
fn mention_routes_to_named_agent() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);

    let id = send_message(
        &state,
        "furiosa",
        furiosa,
        "oil status?",
        vec![],
        vec![Tag::mention("nux")],
    );

    assert_eq!(for_agent(&state, "nux", "war_boy"), vec![id]);
    assert!(for_agent(&state, "slit", "war_boy").is_empty());
}

#[test]
fn group_scope_fans_out_via_role_membership() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);

    let id = send_message(
        &state,
        "furiosa",
        furiosa,
        "war_boys assemble",
        vec![Tag::group("war_boy")],
        vec![],
    );

    // Both war_boys see it through the auto-created role group.
    assert_eq!(for_agent(&state, "nux", "war_boy"), vec![id]);
    assert_eq!(for_agent(&state, "slit", "war_boy"), vec![id]);
    // Role gate: without the role the group does not cover them.
    assert!(for_agent(&state, "nux", "").is_empty());
    // The author is outside the group.
    assert!(for_agent(&state, "furiosa", "implementer").is_empty());
}

#[test]
fn wildcard_group_covers_everyone_regardless_of_role() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);
    commit(
        &state,
        Event::GroupCreate {
            group_id: thrum_core::GroupId::new(),
            name: "everyone".to_string(),
            description: None,
            created_by: "daemon".to_string(),
            members: vec![thrum_core::GroupMember::wildcard()],
        },
    );

    let id = send_message(
        &state,
        "furiosa",
        furiosa,
        "all hands",
        vec![Tag::group("everyone")],
        vec![],
    );

    assert_eq!(for_agent(&state, "nux", ""), vec![id]);
    assert_eq!(for_agent(&state, "slit", "war_boy"), vec![id]);
}

#[test]
fn legacy_broadcast_reaches_all_agents() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);

    let id = send_message(&state, "furiosa", furiosa, "untargeted", vec![], vec![]);

    assert_eq!(for_agent(&state, "nux", "war_boy"), vec![id]);
    assert_eq!(for_agent(&state, "slit", ""), vec![id]);
}

#[test]
fn non_mention_refs_do_not_block_broadcast() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);

    let id = send_message(
        &state,
        "furiosa",
        furiosa,
        "see pr",
        vec![],
        vec![Tag::new("pr", "42")],
    );
    assert_eq!(for_agent(&state, "nux", "war_boy"), vec![id]);
}

#[test]
fn exclude_self_drops_own_messages() {
    let (_dir, state) = test_state();
    let (furiosa, nux) = seed(&state);

    send_message(&state, "furiosa", furiosa, "from furiosa", vec![], vec![]);
    let from_nux = send_message(&state, "nux", nux, "from nux", vec![], vec![]);

    let page = state
        .list_messages(&MessageFilter {
            for_agent: Some("furiosa".to_string()),
            for_agent_role: Some("implementer".to_string()),
            exclude_self: Some("furiosa".to_string()),
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<MessageId> = page.messages.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![from_nux]);
}

#[test]
fn soft_deleted_messages_hidden_unless_requested() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);

    let id = send_message(&state, "furiosa", furiosa, "oops", vec![], vec![]);
    commit(
        &state,
        Event::MessageDelete {
            message_id: id,
            agent_id: "furiosa".to_string(),
            reason: Some("typo".to_string()),
        },
    );

    let page = state.list_messages(&MessageFilter::default()).unwrap();
    assert!(page.messages.is_empty());

    let page = state
        .list_messages(&MessageFilter { include_deleted: true, ..Default::default() })
        .unwrap();
    assert_eq!(page.messages.len(), 1);
    assert!(page.messages[0].is_deleted());
    assert_eq!(page.messages[0].delete_reason.as_deref(), Some("typo"));
}

#[test]
fn edits_increment_the_version_counter() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);
    let id = send_message(&state, "furiosa", furiosa, "v0", vec![], vec![]);

    for expected in 1..=3u32 {
        commit(
            &state,
            Event::MessageEdit {
                message_id: id,
                agent_id: "furiosa".to_string(),
                content: format!("v{expected}"),
            },
        );
        let message = state.get_message(&id).unwrap().unwrap();
        assert_eq!(message.updated_at, Some(expected));
        assert_eq!(message.body.content, format!("v{expected}"));
    }
}

#[test]
fn pagination_clamps_and_pages() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);
    for i in 0..25 {
        send_message(&state, "furiosa", furiosa, &format!("m{i}"), vec![], vec![]);
    }

    let page = state
        .list_messages(&MessageFilter { page: 1, page_size: 10, ..Default::default() })
        .unwrap();
    assert_eq!(page.messages.len(), 10);
    assert_eq!(page.total, 25);
    assert_eq!(page.messages[0].body.content, "m0");

    let page = state
        .list_messages(&MessageFilter { page: 3, page_size: 10, ..Default::default() })
        .unwrap();
    assert_eq!(page.messages.len(), 5);

    // page_size 0 falls back to the default of 10.
    let page = state.list_messages(&MessageFilter::default()).unwrap();
    assert_eq!(page.messages.len(), 10);

    // Oversized requests clamp to 100.
    let page = state
        .list_messages(&MessageFilter { page_size: 5000, ..Default::default() })
        .unwrap();
    assert_eq!(page.messages.len(), 25);
}

#[test]
fn descending_sort_newest_first() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);
    send_message(&state, "furiosa", furiosa, "first", vec![], vec![]);
    std::thread::sleep(std::time::Duration::from_millis(5));
    send_message(&state, "furiosa", furiosa, "second", vec![], vec![]);

    let page = state
        .list_messages(&MessageFilter { order: SortOrder::Desc, ..Default::default() })
        .unwrap();
    assert_eq!(page.messages[0].body.content, "second");
}

#[test]
fn unread_count_tracks_reader() {
    let (_dir, state) = test_state();
    let (furiosa, nux) = seed(&state);
    let a = send_message(&state, "furiosa", furiosa, "a", vec![], vec![]);
    send_message(&state, "furiosa", furiosa, "b", vec![], vec![]);

    state.mark_read(&a, &nux, "nux", chrono::Utc::now()).unwrap();

    let page = state
        .list_messages(&MessageFilter {
            for_agent: Some("nux".to_string()),
            for_agent_role: Some("war_boy".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.unread, 1);
    assert_eq!(page.read_flags, vec![true, false]);
}

#[test]
fn unread_only_filters_read_messages() {
    let (_dir, state) = test_state();
    let (furiosa, nux) = seed(&state);
    let a = send_message(&state, "furiosa", furiosa, "a", vec![], vec![]);
    let b = send_message(&state, "furiosa", furiosa, "b", vec![], vec![]);
    state.mark_read(&a, &nux, "nux", chrono::Utc::now()).unwrap();

    let page = state
        .list_messages(&MessageFilter {
            for_agent: Some("nux".to_string()),
            for_agent_role: Some("war_boy".to_string()),
            unread_only: true,
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<MessageId> = page.messages.iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![b]);
}

#[test]
fn filters_by_scope_ref_and_mentions() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);
    let scoped = send_message(
        &state,
        "furiosa",
        furiosa,
        "scoped",
        vec![Tag::new("module", "auth")],
        vec![],
    );
    let reffed = send_message(
        &state,
        "furiosa",
        furiosa,
        "reffed",
        vec![],
        vec![Tag::new("pr", "42"), Tag::mention("nux")],
    );

    let page = state
        .list_messages(&MessageFilter {
            scope: Some(Tag::new("module", "auth")),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.messages[0].message_id, scoped);
    assert_eq!(page.messages.len(), 1);

    let page = state
        .list_messages(&MessageFilter {
            reference: Some(Tag::new("pr", "42")),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.messages[0].message_id, reffed);

    let page = state
        .list_messages(&MessageFilter {
            mentions: Some("nux".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.messages[0].message_id, reffed);
}

#[test]
fn get_message_loads_tags() {
    let (_dir, state) = test_state();
    let (furiosa, _nux) = seed(&state);
    let id = send_message(
        &state,
        "furiosa",
        furiosa,
        "tagged",
        vec![Tag::group("war_boy")],
        vec![Tag::mention("nux")],
    );

    let message = state.get_message(&id).unwrap().unwrap();
    assert_eq!(message.scopes, vec![Tag::group("war_boy")]);
    assert_eq!(message.refs, vec![Tag::mention("nux")]);
}
