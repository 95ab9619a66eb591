// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    simple = { "leon" },
    hyphen = { "web-ui" },
    underscore = { "leon_k" },
    digits = { "user42" },
)]
fn valid_usernames(name: &str) {
    assert!(validate_username(name).is_ok());
}

#[parameterized(
    empty = { "" },
    space = { "le on" },
    colon = { "a:b" },
    too_long = { "abcdefghijklmnopqrstuvwxyz1234567" },
)]
fn invalid_usernames(name: &str) {
    assert!(validate_username(name).is_err());
}

#[test]
fn user_id_prefixes() {
    assert_eq!(user_id("leon"), "user:leon");
    assert!(is_user_id("user:leon"));
    assert!(!is_user_id("furiosa"));
}
