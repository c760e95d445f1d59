//! Minimal MCP (Model Context Protocol) client over stdio.
//!
//! The server is spawned as a child process and driven with newline-delimited
//! JSON-RPC 2.0 messages, one request at a time: `initialize`, the
//! `notifications/initialized` notification, `tools/list`, then any number of
//! `tools/call` requests.

pub mod config;
pub mod error;
pub mod exchange;
pub mod jsonrpc;
pub mod launcher;
pub mod session;
pub mod tool;

pub use config::{ClientInfo, IdCheck, McpServerConfig, StderrMode};
pub use error::McpError;
pub use exchange::LineExchange;
pub use jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestIds};
pub use launcher::ServerProcess;
pub use session::{McpSession, PROTOCOL_VERSION};
pub use tool::{ToolCallOutcome, ToolContent, ToolInfo, parse_tool_catalog, parse_tool_result};
