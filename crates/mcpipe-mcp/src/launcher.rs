//! Process launcher for stdio MCP servers.
//!
//! Spawns the server with piped stdin/stdout and hands the two pipe ends to
//! the caller. The returned [`ServerProcess`] keeps the child handle and is
//! responsible for terminating and reaping it.

use crate::config::McpServerConfig;
use crate::error::McpError;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// A running MCP server child process.
pub struct ServerProcess {
    child: Child,
    command_line: String,
    signalled: bool,
    status: Option<ExitStatus>,
}

impl ServerProcess {
    /// Spawn the configured server.
    ///
    /// Returns the process handle together with the read end of its stdout
    /// and the write end of its stdin.
    pub fn spawn(config: &McpServerConfig) -> Result<(Self, ChildStdout, ChildStdin), McpError> {
        let command_line = config.command_line();
        tracing::info!("Spawning MCP server: {command_line}");

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(config.stderr.to_stdio())
            .kill_on_drop(true);
        if let Some(cwd) = &config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| McpError::Spawn {
            command: config.command.clone(),
            source: e,
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(McpError::Spawn {
                command: config.command.clone(),
                source: std::io::Error::other("child pipes were not captured"),
            });
        };

        tracing::debug!("MCP server started with pid {:?}", child.id());

        Ok((
            Self {
                child,
                command_line,
                signalled: false,
                status: None,
            },
            stdout,
            stdin,
        ))
    }

    /// OS process id, if the child has not been reaped yet.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Send the kill signal. Does nothing if the child was already signalled
    /// or has already exited.
    pub fn terminate(&mut self) -> Result<(), McpError> {
        if self.signalled || self.status.is_some() {
            return Ok(());
        }
        if let Some(status) = self.child.try_wait()? {
            tracing::debug!("MCP server '{}' already exited: {status}", self.command_line);
            self.status = Some(status);
            return Ok(());
        }
        tracing::info!("Terminating MCP server: {}", self.command_line);
        self.child.start_kill()?;
        self.signalled = true;
        Ok(())
    }

    /// Block until the child exits and reap it. Later calls return the
    /// status recorded by the first.
    pub async fn wait(&mut self) -> Result<ExitStatus, McpError> {
        if let Some(status) = self.status {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        tracing::debug!("MCP server '{}' exited: {status}", self.command_line);
        self.status = Some(status);
        Ok(status)
    }

    /// Whether the kill signal has been sent.
    pub fn is_signalled(&self) -> bool {
        self.signalled
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if self.status.is_none() && !self.signalled {
            tracing::debug!("Dropping ServerProcess, killing '{}'", self.command_line);
            let _ = self.child.start_kill();
        }
    }
}
