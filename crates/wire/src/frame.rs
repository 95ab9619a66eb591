// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line framing for the Unix socket transport.
//!
//! One JSON-RPC message per newline-terminated line. The WebSocket
//! transport frames messages itself, so only the stream transport
//! goes through here.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single line. A line past this is a protocol error,
/// not an allocation.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Errors from line framing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,

    #[error("Line exceeds {MAX_LINE_BYTES} bytes")]
    LineTooLong,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read the next non-empty line, bounded by `timeout`.
///
/// Returns `ConnectionClosed` on EOF. Blank lines are skipped so that
/// clients terminating with `\r\n` or sending keepalive newlines work.
pub async fn read_line<R>(reader: &mut R, timeout: Duration) -> Result<String, ProtocolError>
where
    R: AsyncBufReadExt + Unpin,
{
    loop {
        let mut line = String::new();
        let n = tokio::time::timeout(timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }
        if n > MAX_LINE_BYTES {
            return Err(ProtocolError::LineTooLong);
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
}

/// Write one message as a newline-terminated line, bounded by `timeout`.
pub async fn write_line<W>(
    writer: &mut W,
    payload: &str,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let write = async {
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    };
    tokio::time::timeout(timeout, write).await.map_err(|_| ProtocolError::Timeout)??;
    Ok(())
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
