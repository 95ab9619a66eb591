// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent records and name validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names that can never be registered as agents. They collide with
/// addressing keywords or daemon-internal attribution.
pub const RESERVED_NAMES: &[&str] = &["daemon", "system", "thrum", "all", "broadcast"];

/// Maximum agent name length in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// What kind of principal an agent row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Agent,
    User,
}

/// A registered agent (or user principal) as stored in the projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// The agent's name for `kind=agent`, or `user:{username}` for users.
    pub agent_id: String,
    pub kind: AgentKind,
    pub role: String,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Agent name validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("agent name may not be empty")]
    Empty,

    #[error("agent name exceeds {MAX_NAME_LEN} characters: {0:?}")]
    TooLong(String),

    #[error("agent name may only contain letters, digits, and underscores: {0:?}")]
    InvalidChar(String),

    #[error("agent name is reserved: {0:?}")]
    Reserved(String),

    #[error("agent name may not equal its own role: {0:?}")]
    EqualsOwnRole(String),
}

/// Validate an agent name: alphanumeric + underscore, ≤32 chars, not in
/// the reserved set. Case-sensitive; `Daemon` is allowed, `daemon` is not.
pub fn validate_agent_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NameError::TooLong(name.to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(NameError::InvalidChar(name.to_string()));
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(NameError::Reserved(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
