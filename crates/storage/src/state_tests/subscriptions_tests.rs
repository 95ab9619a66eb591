// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::subscriptions::SubscriptionKind;

#[test]
fn duplicate_subscription_returns_existing_id() {
    let (_dir, state) = test_state();
    register(&state, "nux", "war_boy", "engine");
    let session = start_session(&state, "nux");

    let now = chrono::Utc::now();
    let kind = SubscriptionKind::Scope(Tag::group("war_boy"));
    let first = state.add_subscription(&session, &kind, now).unwrap();
    let second = state.add_subscription(&session, &kind, now).unwrap();
    assert_eq!(first, second);

    // A different discriminator is a new subscription.
    let third = state.add_subscription(&session, &SubscriptionKind::All, now).unwrap();
    assert_ne!(first, third);
    assert_eq!(state.subscriptions_for_session(&session).unwrap().len(), 2);
}

#[test]
fn subscriptions_die_with_their_session() {
    let (_dir, state) = test_state();
    register(&state, "nux", "war_boy", "engine");
    let session = start_session(&state, "nux");
    state
        .add_subscription(&session, &SubscriptionKind::All, chrono::Utc::now())
        .unwrap();
    assert_eq!(state.active_subscriptions().unwrap().len(), 1);

    end_session(&state, "nux", session, EndReason::Normal);
    assert_eq!(state.active_subscriptions().unwrap().len(), 0);
    assert!(state.subscriptions_for_session(&session).unwrap().is_empty());
}

#[test]
fn kinds_round_trip_through_rows() {
    let (_dir, state) = test_state();
    register(&state, "nux", "war_boy", "engine");
    let session = start_session(&state, "nux");
    let now = chrono::Utc::now();

    let scope_id = state
        .add_subscription(&session, &SubscriptionKind::Scope(Tag::group("war_boy")), now)
        .unwrap();
    let mention_id = state
        .add_subscription(&session, &SubscriptionKind::Mention("nux".to_string()), now)
        .unwrap();
    let all_id = state.add_subscription(&session, &SubscriptionKind::All, now).unwrap();

    let scope = state.get_subscription(scope_id).unwrap().unwrap();
    assert_eq!(scope.kind, SubscriptionKind::Scope(Tag::group("war_boy")));

    let mention = state.get_subscription(mention_id).unwrap().unwrap();
    assert_eq!(mention.kind, SubscriptionKind::Mention("nux".to_string()));

    let all = state.get_subscription(all_id).unwrap().unwrap();
    assert_eq!(all.kind, SubscriptionKind::All);
}

#[test]
fn remove_subscription_deletes_row() {
    let (_dir, state) = test_state();
    register(&state, "nux", "war_boy", "engine");
    let session = start_session(&state, "nux");
    let id = state
        .add_subscription(&session, &SubscriptionKind::All, chrono::Utc::now())
        .unwrap();

    state.remove_subscription(id).unwrap();
    assert!(state.get_subscription(id).unwrap().is_none());
}
