// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User principals: humans connecting over the WebSocket transport.

use crate::agent::NameError;

/// Maximum username length in bytes.
pub const MAX_USERNAME_LEN: usize = 32;

/// Validate a username: `[a-zA-Z0-9_-]{1,32}`, and it may not start with
/// `agent:` (which would forge agent attribution after prefixing).
pub fn validate_username(username: &str) -> Result<(), NameError> {
    if username.is_empty() {
        return Err(NameError::Empty);
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(NameError::TooLong(username.to_string()));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(NameError::InvalidChar(username.to_string()));
    }
    if username.starts_with("agent:") {
        return Err(NameError::InvalidChar(username.to_string()));
    }
    Ok(())
}

/// The agent-table ID for a user: `user:{username}`.
pub fn user_id(username: &str) -> String {
    format!("user:{username}")
}

/// Returns true if an agent-table ID names a user principal.
pub fn is_user_id(agent_id: &str) -> bool {
    agent_id.starts_with("user:")
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
