// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group rows and single-hop member expansion.

use rusqlite::{params, OptionalExtension, Row, Transaction};
use thrum_core::{Event, Group, GroupId, GroupMember, LogRecord, MemberType, WILDCARD_ROLE};

use super::agents::parse_ts;
use super::State;
use crate::db::StateError;

pub(crate) fn apply(tx: &Transaction, record: &LogRecord) -> Result<(), StateError> {
    let ts = record.timestamp.to_rfc3339();
    match &record.event {
        Event::GroupCreate { group_id, name, description, created_by, members } => {
            tx.execute(
                "INSERT OR IGNORE INTO groups (group_id, name, description, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![group_id.as_str(), name, description, created_by, ts],
            )?;
            // The group may predate this event under a different ID (bootstrap
            // replays, concurrent role registration); members attach to the
            // surviving row.
            let existing_id: String = tx.query_row(
                "SELECT group_id FROM groups WHERE name = ?1",
                [name],
                |row| row.get(0),
            )?;
            for member in members {
                insert_member(tx, &existing_id, member)?;
            }
        }

        Event::GroupMemberAdd { group, member } => {
            if let Some(group_id) = group_id_by_name(tx, group)? {
                insert_member(tx, &group_id, member)?;
            }
        }

        Event::GroupMemberRemove { group, member } => {
            if let Some(group_id) = group_id_by_name(tx, group)? {
                tx.execute(
                    "DELETE FROM group_members
                     WHERE group_id = ?1 AND member_type = ?2 AND member_value = ?3",
                    params![group_id, member_type_str(member.member_type), member.value],
                )?;
            }
        }

        _ => {}
    }
    Ok(())
}

fn insert_member(tx: &Transaction, group_id: &str, member: &GroupMember) -> Result<(), StateError> {
    tx.execute(
        "INSERT OR IGNORE INTO group_members (group_id, member_type, member_value)
         VALUES (?1, ?2, ?3)",
        params![group_id, member_type_str(member.member_type), member.value],
    )?;
    Ok(())
}

fn group_id_by_name(tx: &Transaction, name: &str) -> Result<Option<String>, StateError> {
    Ok(tx
        .query_row("SELECT group_id FROM groups WHERE name = ?1", [name], |row| row.get(0))
        .optional()?)
}

fn member_type_str(member_type: MemberType) -> &'static str {
    match member_type {
        MemberType::Agent => "agent",
        MemberType::Role => "role",
    }
}

pub(crate) fn row_to_group(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        group_id: GroupId::from_string(row.get::<_, String>("group_id")?),
        name: row.get("name")?,
        description: row.get("description")?,
        created_by: row.get("created_by")?,
        created_at: parse_ts(row, "created_at")?,
    })
}

fn row_to_member(row: &Row) -> rusqlite::Result<GroupMember> {
    let member_type: String = row.get("member_type")?;
    Ok(GroupMember {
        member_type: if member_type == "role" { MemberType::Role } else { MemberType::Agent },
        value: row.get("member_value")?,
    })
}

impl State {
    pub fn group_by_name(&self, name: &str) -> Result<Option<Group>, StateError> {
        self.db().with_read(|conn| {
            Ok(conn
                .query_row("SELECT * FROM groups WHERE name = ?1", [name], row_to_group)
                .optional()?)
        })
    }

    pub fn group_members(&self, name: &str) -> Result<Vec<GroupMember>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT gm.member_type, gm.member_value FROM group_members gm
                 JOIN groups g ON g.group_id = gm.group_id
                 WHERE g.name = ?1 ORDER BY gm.member_type, gm.member_value",
            )?;
            let members = stmt
                .query_map([name], row_to_member)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(members)
        })
    }

    pub fn list_groups(&self) -> Result<Vec<(Group, u64)>, StateError> {
        self.db().with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT g.*, (SELECT COUNT(*) FROM group_members gm
                     WHERE gm.group_id = g.group_id) AS member_count
                 FROM groups g ORDER BY g.name",
            )?;
            let groups = stmt
                .query_map([], |row| {
                    let group = row_to_group(row)?;
                    let count: u64 = row.get("member_count")?;
                    Ok((group, count))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(groups)
        })
    }

    /// Expand a group to the set of agent IDs it currently covers.
    ///
    /// Single-hop only: agent members directly, role members through the
    /// agents table, the wildcard through every registered principal.
    pub fn expand_group(&self, name: &str) -> Result<Vec<String>, StateError> {
        let members = self.group_members(name)?;
        self.db().with_read(|conn| {
            let mut out: Vec<String> = Vec::new();
            for member in &members {
                match member.member_type {
                    MemberType::Agent => out.push(member.value.clone()),
                    MemberType::Role if member.value == WILDCARD_ROLE => {
                        let mut stmt =
                            conn.prepare("SELECT agent_id FROM agents ORDER BY agent_id")?;
                        let ids = stmt
                            .query_map([], |row| row.get::<_, String>(0))?
                            .collect::<Result<Vec<_>, _>>()?;
                        out.extend(ids);
                    }
                    MemberType::Role => {
                        let mut stmt = conn.prepare(
                            "SELECT agent_id FROM agents WHERE role = ?1 ORDER BY agent_id",
                        )?;
                        let ids = stmt
                            .query_map([&member.value], |row| row.get::<_, String>(0))?
                            .collect::<Result<Vec<_>, _>>()?;
                        out.extend(ids);
                    }
                }
            }
            out.sort();
            out.dedup();
            Ok(out)
        })
    }

    /// Does the named group cover this (agent, role) pair?
    pub fn group_covers(&self, name: &str, agent_id: &str, role: &str) -> Result<bool, StateError> {
        Ok(self
            .group_members(name)?
            .iter()
            .any(|member| member.covers(agent_id, role)))
    }
}
