//! Configuration types for launching and talking to an MCP server.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What to do with the server's standard error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrMode {
    /// Discard it.
    #[default]
    Null,
    /// Pass it through to our own stderr.
    Inherit,
}

impl StderrMode {
    pub(crate) fn to_stdio(self) -> std::process::Stdio {
        match self {
            StderrMode::Null => std::process::Stdio::null(),
            StderrMode::Inherit => std::process::Stdio::inherit(),
        }
    }
}

impl std::str::FromStr for StderrMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "null" => Ok(StderrMode::Null),
            "inherit" => Ok(StderrMode::Inherit),
            other => Err(format!("unknown stderr mode '{other}' (expected null or inherit)")),
        }
    }
}

/// How strictly response ids are matched against request ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdCheck {
    /// Log a mismatch and return the response anyway.
    #[default]
    Warn,
    /// Fail the request with [`crate::McpError::IdMismatch`].
    Strict,
}

/// Configuration for a single MCP server process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to run (e.g., "python", "uv").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the server process.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub stderr: StderrMode,
    /// Give up waiting for a reply after this many milliseconds.
    /// Unset means wait forever.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl McpServerConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            cwd: None,
            stderr: StderrMode::default(),
            timeout_ms: None,
        }
    }

    /// The full command line, for log messages.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// Identity and protocol settings this client announces in `initialize`.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
    pub id_check: IdCheck,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "mcpipe".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: crate::session::PROTOCOL_VERSION.to_string(),
            id_check: IdCheck::default(),
        }
    }
}
