// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription dispatch: turn committed messages into push
//! notifications.
//!
//! Runs on a dedicated task consuming commit notices from the handler
//! path. Delivery is at-most-once: a full or closed outbound queue
//! drops the notification and unregisters the connection; clients
//! reconcile with `message.list` after reconnecting.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use thrum_core::{Message, SessionId, ThreadId, REF_MENTION};
use thrum_storage::{State, Subscription, SubscriptionKind};
use thrum_wire::Notification;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::ClientRegistry;

/// Notification method for matched messages.
pub const NOTIFY_MESSAGE: &str = "notification.message";

/// Companion sent on a thread's first matched delivery to a session.
pub const NOTIFY_THREAD_UPDATED: &str = "notification.thread.updated";

/// Preview length in the notification envelope, in characters.
const PREVIEW_CHARS: usize = 100;

/// A committed message handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct CommitNotice {
    pub message: Message,
}

/// Match one subscription against a message: `all → scope → mention`,
/// first match wins. Returns the match type for the envelope.
pub fn match_subscription(sub: &Subscription, message: &Message) -> Option<&'static str> {
    match &sub.kind {
        SubscriptionKind::All => Some("all"),
        SubscriptionKind::Scope(tag) => message
            .scopes
            .iter()
            .any(|s| s.tag_type == tag.tag_type && s.value == tag.value)
            .then_some("scope"),
        SubscriptionKind::Mention(value) => message
            .refs
            .iter()
            .any(|r| r.tag_type == REF_MENTION && r.value == *value)
            .then_some("mention"),
    }
}

/// Build the notification envelope for a matched message.
fn envelope(message: &Message, sub: &Subscription, match_type: &str) -> Notification {
    Notification::new(
        NOTIFY_MESSAGE,
        json!({
            "message_id": message.message_id,
            "thread_id": message.thread_id,
            "author": message.agent_id,
            "preview": message.preview(PREVIEW_CHARS),
            "scopes": message.scopes,
            "matched_subscription": { "id": sub.id, "match_type": match_type },
            "timestamp": message.created_at,
        }),
    )
}

/// The dispatcher task. Owns the per-(session, thread) first-delivery
/// set that drives `notification.thread.updated`.
pub struct Dispatcher {
    state: Arc<State>,
    registry: Arc<ClientRegistry>,
    delivered_threads: HashSet<(SessionId, ThreadId)>,
}

impl Dispatcher {
    pub fn new(state: Arc<State>, registry: Arc<ClientRegistry>) -> Self {
        Self { state, registry, delivered_threads: HashSet::new() }
    }

    /// Spawn the dispatch loop. Handlers push notices with `try_send`
    /// and never block on delivery.
    pub fn spawn(
        mut self,
        mut rx: mpsc::Receiver<CommitNotice>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    notice = rx.recv() => match notice {
                        Some(notice) => self.dispatch(&notice.message),
                        None => break,
                    },
                    _ = cancel.cancelled() => break,
                }
            }
            debug!("dispatcher stopped");
        })
    }

    /// Fan one committed message out to every matching subscription.
    /// Ordering: notices arrive in commit order and subscriptions are
    /// walked per notice, so a single subscription sees commit order.
    pub fn dispatch(&mut self, message: &Message) {
        let subs = match self.state.active_subscriptions() {
            Ok(subs) => subs,
            Err(e) => {
                warn!(error = %e, "dispatcher failed to load subscriptions");
                return;
            }
        };

        for sub in &subs {
            let Some(match_type) = match_subscription(sub, message) else {
                continue;
            };
            let Some(handle) = self.registry.handle_for_session(&sub.session_id) else {
                continue;
            };

            let frame = match serde_json::to_string(&envelope(message, sub, match_type)) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "failed to encode notification");
                    continue;
                }
            };
            if handle.tx.try_send(frame).is_err() {
                // Slow or dead consumer: drop it, at-most-once delivery.
                warn!(conn_id = handle.conn_id, "outbound queue full or closed; unregistering");
                self.registry.unregister(handle.conn_id);
                continue;
            }

            if let Some(thread_id) = message.thread_id {
                if self.delivered_threads.insert((sub.session_id, thread_id)) {
                    self.send_thread_updated(&handle, &thread_id, message);
                }
            }
        }
    }

    fn send_thread_updated(
        &self,
        handle: &crate::registry::ClientHandle,
        thread_id: &ThreadId,
        message: &Message,
    ) {
        let count = self
            .state
            .thread_messages(thread_id)
            .map(|m| m.len() as u64)
            .unwrap_or(0);
        let notification = Notification::new(
            NOTIFY_THREAD_UPDATED,
            json!({
                "thread_id": thread_id,
                "message_count": count,
                "last_message_id": message.message_id,
                "timestamp": message.created_at,
            }),
        );
        if let Ok(frame) = serde_json::to_string(&notification) {
            let _ = handle.tx.try_send(frame);
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
