// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! thrum-storage: the event log and its SQLite projection.
//!
//! The JSONL log is the source of truth and the cross-machine sync
//! substrate; SQLite is a disposable index rebuilt by replay. Every
//! durable mutation appends to the log, flushes, and only then touches
//! the database.

mod db;
mod log;
mod projector;
pub mod state;

pub use db::{Database, StateError, SCHEMA_VERSION};
pub use log::{EventLog, LogError};
pub use projector::rebuild;
pub use state::agents::AgentFilter;
pub use state::messages::{
    MessageFilter, MessagePage, SortKey, SortOrder, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use state::subscriptions::{Subscription, SubscriptionKind};
pub use state::sync::Checkpoint;
pub use state::threads::ThreadSummary;
pub use state::State;
