// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn mark_read_is_idempotent_per_session() {
    let (_dir, state) = test_state();
    register(&state, "furiosa", "implementer", "auth");
    register(&state, "nux", "war_boy", "engine");
    let furiosa = start_session(&state, "furiosa");
    let nux = start_session(&state, "nux");
    let id = send_message(&state, "furiosa", furiosa, "hi", vec![], vec![]);

    let now = chrono::Utc::now();
    state.mark_read(&id, &nux, "nux", now).unwrap();
    state.mark_read(&id, &nux, "nux", now).unwrap();

    assert_eq!(state.also_read_by(&id).unwrap(), vec!["nux".to_string()]);
    assert!(state.is_read_by(&id, "nux").unwrap());
    assert!(!state.is_read_by(&id, "furiosa").unwrap());
}

#[test]
fn read_by_any_session_counts_for_the_agent() {
    let (_dir, state) = test_state();
    register(&state, "nux", "war_boy", "engine");
    register(&state, "furiosa", "implementer", "auth");
    let author = start_session(&state, "furiosa");
    let first = start_session(&state, "nux");
    let id = send_message(&state, "furiosa", author, "hi", vec![], vec![]);

    state.mark_read(&id, &first, "nux", chrono::Utc::now()).unwrap();
    end_session(&state, "nux", first, EndReason::Normal);
    let _second = start_session(&state, "nux");

    assert!(state.is_read_by(&id, "nux").unwrap());
}

#[test]
fn also_read_by_collects_distinct_agents() {
    let (_dir, state) = test_state();
    register(&state, "furiosa", "implementer", "auth");
    register(&state, "nux", "war_boy", "engine");
    register(&state, "slit", "war_boy", "engine");
    let author = start_session(&state, "furiosa");
    let nux = start_session(&state, "nux");
    let slit = start_session(&state, "slit");
    let id = send_message(&state, "furiosa", author, "hi", vec![], vec![]);

    state.mark_read(&id, &nux, "nux", chrono::Utc::now()).unwrap();
    state.mark_read(&id, &slit, "slit", chrono::Utc::now()).unwrap();

    assert_eq!(
        state.also_read_by(&id).unwrap(),
        vec!["nux".to_string(), "slit".to_string()]
    );
}
