// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport: one JSON-RPC message per text frame, declared
//! caller identity.
//!
//! Connections start anonymous; `agent.register` / `user.register`
//! attribute them. A 54-second server ping pairs with a 60-second read
//! deadline, so any live client produces at least a pong inside each
//! read window.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::handle_frame;
use crate::caller::{Caller, Transport};
use crate::handlers::HandlerCtx;
use crate::registry::OUTBOUND_QUEUE;

/// Server ping cadence.
const PING_INTERVAL: Duration = Duration::from_secs(54);

/// Read deadline; must exceed the ping interval.
const READ_DEADLINE: Duration = Duration::from_secs(60);

/// Run the accept loop until shutdown, spawning a task per connection.
pub fn spawn(
    listener: TcpListener,
    ctx: Arc<HandlerCtx>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!(%addr, "websocket connection");
                        let ctx = Arc::clone(&ctx);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            serve(stream, ctx, cancel).await;
                        });
                    }
                    Err(e) => error!("websocket accept error: {e}"),
                },
            }
        }
        debug!("websocket listener stopped");
    })
}

async fn serve(stream: TcpStream, ctx: Arc<HandlerCtx>, cancel: CancellationToken) {
    // `/` and `/ws` both upgrade; with no embedded UI the root path
    // serves the protocol for older clients.
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "websocket handshake failed");
            return;
        }
    };
    let (mut sink, mut source) = ws.split();

    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let conn_id = ctx.registry.register(out_tx.clone());
    let mut caller = Caller::new(Transport::WebSocket, None, conn_id);

    // Writer: drains the bounded queue and owns the ping timer, so a
    // slow consumer never blocks the handler or dispatcher path.
    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                frame = out_rx.recv() => match frame {
                    Some(frame) => {
                        if sink.send(Message::text(frame)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = tokio::time::timeout(READ_DEADLINE, source.next()) => next,
        };
        let message = match next {
            Err(_) => {
                warn!(conn_id, "websocket read deadline exceeded");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(conn_id, error = %e, "websocket read error");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(raw) => {
                if let Some(response) = handle_frame(&ctx, &mut caller, raw.as_str()).await {
                    if out_tx.send(response).await.is_err() {
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            // Pings are answered by tungstenite's protocol layer on the
            // next write; pongs just reset the read deadline.
            _ => {}
        }
    }

    ctx.registry.unregister(conn_id);
    writer.abort();
}
