// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket transport: line-delimited JSON-RPC, trusted-from-process
//! caller identity.

use std::sync::Arc;
use std::time::Duration;

use thrum_wire::{read_line, write_line, ProtocolError};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::handle_frame;
use crate::caller::{Caller, Transport};
use crate::env;
use crate::handlers::HandlerCtx;
use crate::identity::IdentityStore;
use crate::registry::OUTBOUND_QUEUE;

/// Idle read window. Hitting it just re-arms the read: connections with
/// live subscriptions sit quietly for long stretches.
const READ_IDLE: Duration = Duration::from_secs(300);

/// Run the accept loop until shutdown, spawning a task per connection.
pub fn spawn(
    listener: UnixListener,
    ctx: Arc<HandlerCtx>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&ctx);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            serve(stream, ctx, cancel).await;
                        });
                    }
                    Err(e) => error!("unix accept error: {e}"),
                },
            }
        }
        debug!("unix listener stopped");
    })
}

async fn serve(stream: UnixStream, ctx: Arc<HandlerCtx>, cancel: CancellationToken) {
    let (read_half, mut write_half) = stream.into_split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
    let conn_id = ctx.registry.register(out_tx.clone());

    // Trusted from process: THRUM_NAME hint, else the unambiguous
    // identity file. Ambiguity stays anonymous rather than guessing.
    let identity = match IdentityStore::new(ctx.paths.identities_dir())
        .select(env::thrum_name().as_deref())
    {
        Ok(identity) => identity.map(|i| i.name),
        Err(e) => {
            warn!(error = %e, "identity selection failed; connection is anonymous");
            None
        }
    };
    let mut caller = Caller::new(Transport::Unix, identity, conn_id);
    debug!(conn_id, identity = ?caller.identity, "unix connection");

    // Single writer drains the outbound queue so responses and push
    // notifications interleave without racing on the stream.
    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => break,
                frame = out_rx.recv() => match frame {
                    Some(frame) => {
                        if write_line(&mut write_half, &frame, env::ipc_timeout())
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    let mut reader = BufReader::new(read_half);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = read_line(&mut reader, READ_IDLE) => match line {
                Ok(raw) => {
                    if let Some(response) = handle_frame(&ctx, &mut caller, &raw).await {
                        if out_tx.send(response).await.is_err() {
                            break;
                        }
                    }
                }
                Err(ProtocolError::Timeout) => continue,
                Err(ProtocolError::ConnectionClosed) => {
                    debug!(conn_id, "client disconnected");
                    break;
                }
                Err(e) => {
                    warn!(conn_id, error = %e, "unix read error");
                    break;
                }
            },
        }
    }

    ctx.registry.unregister(conn_id);
    writer.abort();
}
