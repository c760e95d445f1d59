//! Newline-delimited JSON exchange over a pair of byte streams.
//!
//! Each message is one compact JSON document followed by a single `\n`.
//! There is no framing beyond that: `receive` returns whatever the next line
//! holds, with no attempt to pair it with an earlier `send`.

use crate::error::McpError;
use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Line-framed JSON reader/writer pair.
pub struct LineExchange<R, W> {
    reader: R,
    writer: Option<W>,
    timeout: Option<Duration>,
    line_buffer: Vec<u8>,
}

impl<R, W> LineExchange<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer: Some(writer),
            timeout: None,
            line_buffer: Vec::with_capacity(4096),
        }
    }

    /// Fail `receive` with [`McpError::Timeout`] if no full line arrives in
    /// time. Without a timeout `receive` waits indefinitely.
    pub fn with_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout = timeout_ms.map(Duration::from_millis);
        self
    }

    /// Serialize `message` onto one line and flush it.
    pub async fn send<T: Serialize + ?Sized>(&mut self, message: &T) -> Result<(), McpError> {
        let mut bytes = serde_json::to_vec(message).map_err(McpError::Encode)?;
        tracing::debug!("-> {}", String::from_utf8_lossy(&bytes));
        bytes.push(b'\n');

        let writer = self.writer.as_mut().ok_or_else(|| {
            McpError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "write side of the exchange is closed",
            ))
        })?;
        writer.write_all(&bytes).await.map_err(McpError::Write)?;
        writer.flush().await.map_err(McpError::Write)?;
        Ok(())
    }

    /// Read the next line and parse it as JSON.
    ///
    /// Returns `Ok(None)` when the stream ends before any byte is read.
    /// Bytes of a line cut short by a timeout are kept, so the following
    /// call picks the line up where the previous one stopped.
    pub async fn receive(&mut self) -> Result<Option<serde_json::Value>, McpError> {
        let read = self.reader.read_until(b'\n', &mut self.line_buffer);
        let read = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| McpError::Timeout {
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })?,
            None => read.await,
        };
        if let Err(e) = read {
            self.line_buffer.clear();
            return Err(McpError::Read(e));
        }

        if self.line_buffer.is_empty() {
            tracing::debug!("<- end of stream");
            return Ok(None);
        }

        tracing::debug!("<- {}", String::from_utf8_lossy(&self.line_buffer).trim_end());

        let parsed = serde_json::from_slice(&self.line_buffer)
            .map(Some)
            .map_err(|e| McpError::Decode {
                line: String::from_utf8_lossy(&self.line_buffer).trim_end().to_string(),
                source: e,
            });
        self.line_buffer.clear();
        parsed
    }

    /// Shut down and drop the write side so the peer sees end of input.
    /// Safe to call more than once.
    pub async fn close_writer(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!("Error closing write side: {e}");
            }
        }
    }

    pub fn is_writer_closed(&self) -> bool {
        self.writer.is_none()
    }
}
