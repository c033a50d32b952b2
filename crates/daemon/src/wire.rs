// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format encoding/decoding for the IPC protocol.
//!
//! Wire format: one UTF-8 JSON object terminated by `\n`. Connections are
//! one-shot request/response; anything after the first newline is
//! discarded by the peer. A hard byte cap applies to the raw line in both
//! directions.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Maximum frame size (4 MiB), applied to requests and responses.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Default IPC timeout for a single read or write.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Framing errors
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame exceeds {limit} bytes")]
    Oversize { limit: usize },

    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("connection closed before a full frame arrived")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a message as one newline-terminated JSON frame.
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, FrameError> {
    let mut frame = serde_json::to_vec(msg)?;
    if frame.len() + 1 > MAX_FRAME_BYTES {
        return Err(FrameError::Oversize {
            limit: MAX_FRAME_BYTES,
        });
    }
    frame.push(b'\n');
    Ok(frame)
}

/// Decode a frame body (without the trailing newline).
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, FrameError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one frame: bytes up to the first `\n`.
///
/// If the peer buffers more than [`MAX_FRAME_BYTES`] without producing a
/// newline the read fails with `Oversize` and the caller closes the
/// connection.
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(FrameError::ConnectionClosed);
        }
        if let Some(newline) = chunk[..n].iter().position(|&b| b == b'\n') {
            buf.extend_from_slice(&chunk[..newline]);
            if buf.len() > MAX_FRAME_BYTES {
                return Err(FrameError::Oversize {
                    limit: MAX_FRAME_BYTES,
                });
            }
            // Trailing bytes after the newline are discarded.
            return Ok(buf);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_FRAME_BYTES {
            return Err(FrameError::Oversize {
                limit: MAX_FRAME_BYTES,
            });
        }
    }
}

/// Write one encoded frame.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    frame: &[u8],
) -> Result<(), FrameError> {
    if frame.len() > MAX_FRAME_BYTES + 1 {
        return Err(FrameError::Oversize {
            limit: MAX_FRAME_BYTES,
        });
    }
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read and decode one message with a timeout.
pub async fn read_message<R, T>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<T, FrameError>
where
    R: AsyncReadExt + Unpin,
    T: DeserializeOwned,
{
    let bytes = tokio::time::timeout(timeout, read_frame(reader))
        .await
        .map_err(|_| FrameError::Timeout)??;
    decode(&bytes)
}

/// Encode and write one message with a timeout.
pub async fn write_message<W, T>(
    writer: &mut W,
    msg: &T,
    timeout: std::time::Duration,
) -> Result<(), FrameError>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let frame = encode(msg)?;
    tokio::time::timeout(timeout, write_frame(writer, &frame))
        .await
        .map_err(|_| FrameError::Timeout)?
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
