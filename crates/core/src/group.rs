// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Groups: named collections of agents, roles, or the wildcard role.
//!
//! Groups do not nest. A role membership resolves directly to agents via
//! a join, never through recursion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::GroupId;

/// Well-known group present from daemon startup. Its single member is the
/// wildcard role, so it covers every registered agent. Cannot be deleted.
pub const EVERYONE_GROUP: &str = "everyone";

/// Role wildcard: matches any role, including agents with no role.
pub const WILDCARD_ROLE: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberType {
    Agent,
    Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    #[serde(rename = "type")]
    pub member_type: MemberType,
    pub value: String,
}

impl GroupMember {
    pub fn agent(name: impl Into<String>) -> Self {
        Self { member_type: MemberType::Agent, value: name.into() }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self { member_type: MemberType::Role, value: role.into() }
    }

    pub fn wildcard() -> Self {
        Self::role(WILDCARD_ROLE)
    }

    /// Does this member cover the given agent name + role?
    pub fn covers(&self, agent_id: &str, role: &str) -> bool {
        match self.member_type {
            MemberType::Agent => self.value == agent_id,
            MemberType::Role => self.value == WILDCARD_ROLE || self.value == role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: GroupId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
