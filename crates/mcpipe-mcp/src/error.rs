//! Error types for MCP operations.

use thiserror::Error;

/// Errors from driving an MCP server over stdio.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn MCP server '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Failed to encode JSON-RPC message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode line from MCP server: {source}: {line}")]
    Decode {
        line: String,
        source: serde_json::Error,
    },

    #[error("Failed to write to MCP server: {0}")]
    Write(#[source] std::io::Error),

    #[error("Failed to read from MCP server: {0}")]
    Read(#[source] std::io::Error),

    #[error("MCP server closed its output while awaiting a reply to '{method}'")]
    EndOfStream { method: String },

    #[error("No reply from MCP server within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Response id {actual} does not match request id {expected}")]
    IdMismatch { expected: u64, actual: serde_json::Value },

    #[error("JSON-RPC error (code {code}): {message}")]
    JsonRpc { code: i64, message: String },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
