//! MCP session: owns one server process and runs the handshake.
//!
//! Requests go out strictly one at a time: every operation takes `&mut self`
//! and does not return until the reply line has been read. The session owns
//! the child for its whole lifetime and releases it in [`McpSession::cleanup`]
//! or, failing that, on drop.

use crate::config::{ClientInfo, IdCheck, McpServerConfig};
use crate::error::McpError;
use crate::exchange::LineExchange;
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, RequestIds};
use crate::launcher::ServerProcess;
use std::process::ExitStatus;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::process::{ChildStdin, ChildStdout};

/// MCP protocol version announced by default.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// A client session with one MCP server.
pub struct McpSession<R = BufReader<ChildStdout>, W = ChildStdin> {
    exchange: LineExchange<R, W>,
    process: Option<ServerProcess>,
    ids: RequestIds,
    client: ClientInfo,
    closed: bool,
}

impl McpSession {
    /// Spawn the server and wrap it in a session. No messages are sent yet.
    pub fn spawn(config: &McpServerConfig, client: ClientInfo) -> Result<Self, McpError> {
        let (process, stdout, stdin) = ServerProcess::spawn(config)?;
        let exchange =
            LineExchange::new(BufReader::new(stdout), stdin).with_timeout(config.timeout_ms);
        Ok(Self {
            exchange,
            process: Some(process),
            ids: RequestIds::new(),
            client,
            closed: false,
        })
    }
}

impl<R, W> McpSession<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Build a session over already-connected streams. There is no child
    /// process to manage, so cleanup only closes the write side.
    pub fn from_streams(reader: R, writer: W, client: ClientInfo) -> Self {
        Self {
            exchange: LineExchange::new(reader, writer),
            process: None,
            ids: RequestIds::new(),
            client,
            closed: false,
        }
    }

    /// Send `initialize`, read its reply, then send the `initialized`
    /// notification. Returns the `initialize` response as received.
    pub async fn initialize_connection(&mut self) -> Result<serde_json::Value, McpError> {
        let params = serde_json::json!({
            "protocolVersion": self.client.protocol_version,
            "capabilities": {},
            "clientInfo": {
                "name": self.client.name,
                "version": self.client.version,
            }
        });
        let response = self.request("initialize", Some(params)).await?;

        self.notify("notifications/initialized", None).await?;

        Ok(response)
    }

    /// Ask the server for its tool catalog.
    pub async fn list_tools(&mut self) -> Result<serde_json::Value, McpError> {
        self.request("tools/list", None).await
    }

    /// Invoke one tool by name.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        tracing::info!("Calling tool: {name}");
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        self.request("tools/call", Some(params)).await
    }

    /// Send a request and read the next line as its reply.
    pub async fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let id = self.ids.next_id();
        let request = JsonRpcRequest::new(id, method, params);
        self.exchange.send(&request).await?;

        let response = self
            .exchange
            .receive()
            .await?
            .ok_or_else(|| McpError::EndOfStream {
                method: method.to_string(),
            })?;

        self.check_id(id, &response)?;
        Ok(response)
    }

    /// Send a notification. Nothing is read back.
    pub async fn notify(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let notification = JsonRpcNotification::new(method, params);
        self.exchange.send(&notification).await
    }

    fn check_id(&self, expected: u64, response: &serde_json::Value) -> Result<(), McpError> {
        let actual = response.get("id").cloned().unwrap_or(serde_json::Value::Null);
        if actual.as_u64() == Some(expected) {
            return Ok(());
        }
        match self.client.id_check {
            IdCheck::Warn => {
                tracing::warn!("Response id {actual} does not match request id {expected}");
                Ok(())
            }
            IdCheck::Strict => Err(McpError::IdMismatch { expected, actual }),
        }
    }

    /// Close the server's stdin, terminate it and wait for it to exit.
    ///
    /// Returns the exit status the first time it succeeds; later calls do
    /// nothing and return `Ok(None)`. If terminating or reaping fails the
    /// session stays open so cleanup can be retried.
    pub async fn cleanup(&mut self) -> Result<Option<ExitStatus>, McpError> {
        if self.closed {
            return Ok(None);
        }
        self.exchange.close_writer().await;

        let Some(process) = self.process.as_mut() else {
            self.closed = true;
            return Ok(None);
        };
        // Only a reaped child counts as closed; after a failure the next call
        // retries. `terminate` never signals twice.
        process.terminate()?;
        let status = process.wait().await?;
        tracing::info!("MCP server '{}' terminated", process.command_line());
        self.closed = true;
        Ok(Some(status))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Process id of the server, while it is running.
    pub fn server_pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(ServerProcess::id)
    }

    pub fn client_info(&self) -> &ClientInfo {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, DuplexStream, duplex};

    type PipeSession = McpSession<BufReader<DuplexStream>, DuplexStream>;

    /// Session over in-memory pipes. Returns the session, the stream the fake
    /// server writes replies into, and a line reader over what the session sent.
    fn pipe_session(
        client: ClientInfo,
    ) -> (
        PipeSession,
        DuplexStream,
        tokio::io::Lines<BufReader<DuplexStream>>,
    ) {
        let (our_read, their_write) = duplex(64 * 1024);
        let (our_write, their_read) = duplex(64 * 1024);
        let session = McpSession::from_streams(BufReader::new(our_read), our_write, client);
        (session, their_write, BufReader::new(their_read).lines())
    }

    async fn next_sent(lines: &mut tokio::io::Lines<BufReader<DuplexStream>>) -> serde_json::Value {
        let line = lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn initialize_returns_reply_and_sends_notification() {
        let (mut session, mut server_out, mut sent) = pipe_session(ClientInfo::default());
        server_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"protocolVersion\":\"2025-03-26\"}}\n")
            .await
            .unwrap();

        let response = session.initialize_connection().await.unwrap();
        assert_eq!(
            response,
            serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {"protocolVersion": "2025-03-26"}})
        );

        let init = next_sent(&mut sent).await;
        assert_eq!(init["id"], 1);
        assert_eq!(init["method"], "initialize");
        assert_eq!(init["params"]["protocolVersion"], "2025-03-26");
        assert_eq!(init["params"]["capabilities"], serde_json::json!({}));
        assert_eq!(init["params"]["clientInfo"]["name"], "mcpipe");

        let notif = next_sent(&mut sent).await;
        assert_eq!(notif["method"], "notifications/initialized");
        assert!(notif.get("id").is_none());
        assert!(notif.get("params").is_none());
    }

    #[tokio::test]
    async fn notification_does_not_consume_a_reply() {
        let (mut session, mut server_out, _sent) = pipe_session(ClientInfo::default());
        // Reply to initialize, then a line that arrives right after the
        // notification. It must be read by the next request, not skipped.
        server_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[]}}\n")
            .await
            .unwrap();

        session.initialize_connection().await.unwrap();
        let tools = session.list_tools().await.unwrap();
        assert_eq!(tools["id"], 2);
        assert_eq!(tools["result"]["tools"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn call_tool_returns_result_mapping() {
        let (mut session, mut server_out, mut sent) = pipe_session(ClientInfo::default());
        server_out
            .write_all(
                b"{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{}}\n\
                  {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"tools\":[]}}\n\
                  {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"alerts\":[]}}\n",
            )
            .await
            .unwrap();

        session.initialize_connection().await.unwrap();
        session.list_tools().await.unwrap();
        let response = session
            .call_tool("get_alerts", serde_json::json!({"state": "TX"}))
            .await
            .unwrap();
        assert_eq!(response["result"], serde_json::json!({"alerts": []}));

        let _init = next_sent(&mut sent).await;
        let _notif = next_sent(&mut sent).await;
        let list = next_sent(&mut sent).await;
        assert_eq!(list["id"], 2);
        assert_eq!(list["method"], "tools/list");
        let call = next_sent(&mut sent).await;
        assert_eq!(call["id"], 3);
        assert_eq!(call["method"], "tools/call");
        assert_eq!(
            call["params"],
            serde_json::json!({"name": "get_alerts", "arguments": {"state": "TX"}})
        );
    }

    #[tokio::test]
    async fn repeated_calls_get_fresh_ids() {
        let (mut session, mut server_out, mut sent) = pipe_session(ClientInfo::default());
        server_out
            .write_all(b"{\"id\":1,\"result\":{}}\n{\"id\":2,\"result\":{}}\n")
            .await
            .unwrap();
        session.call_tool("a", serde_json::json!({})).await.unwrap();
        session.call_tool("b", serde_json::json!({})).await.unwrap();
        assert_eq!(next_sent(&mut sent).await["id"], 1);
        assert_eq!(next_sent(&mut sent).await["id"], 2);
    }

    #[tokio::test]
    async fn end_of_stream_while_awaiting_reply() {
        let (mut session, server_out, _sent) = pipe_session(ClientInfo::default());
        drop(server_out);
        match session.list_tools().await {
            Err(McpError::EndOfStream { method }) => assert_eq!(method, "tools/list"),
            other => panic!("Expected EndOfStream, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_reply_is_decode_error() {
        let (mut session, mut server_out, _sent) = pipe_session(ClientInfo::default());
        server_out.write_all(b"not-json\n").await.unwrap();
        assert!(matches!(
            session.list_tools().await,
            Err(McpError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn id_mismatch_is_tolerated_by_default() {
        let (mut session, mut server_out, _sent) = pipe_session(ClientInfo::default());
        server_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":99,\"result\":{}}\n")
            .await
            .unwrap();
        let response = session.list_tools().await.unwrap();
        assert_eq!(response["id"], 99);
    }

    #[tokio::test]
    async fn id_mismatch_fails_in_strict_mode() {
        let client = ClientInfo {
            id_check: IdCheck::Strict,
            ..ClientInfo::default()
        };
        let (mut session, mut server_out, _sent) = pipe_session(client);
        server_out
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":99,\"result\":{}}\n")
            .await
            .unwrap();
        match session.list_tools().await {
            Err(McpError::IdMismatch { expected, actual }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 99);
            }
            other => panic!("Expected IdMismatch, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn cleanup_without_process_closes_writer_once() {
        let (mut session, _server_out, mut sent) = pipe_session(ClientInfo::default());
        assert!(session.cleanup().await.unwrap().is_none());
        assert!(session.is_closed());
        assert!(session.cleanup().await.unwrap().is_none());
        assert!(sent.next_line().await.unwrap().is_none());
        assert!(matches!(
            session.list_tools().await,
            Err(McpError::Write(_))
        ));
    }

    #[tokio::test]
    async fn custom_client_identity_is_announced() {
        let client = ClientInfo {
            name: "HackermoonWeatherClient".to_string(),
            version: "1.0.0".to_string(),
            protocol_version: "2024-11-05".to_string(),
            id_check: IdCheck::Warn,
        };
        let (mut session, mut server_out, mut sent) = pipe_session(client);
        server_out.write_all(b"{\"id\":1,\"result\":{}}\n").await.unwrap();
        session.initialize_connection().await.unwrap();

        let init = next_sent(&mut sent).await;
        assert_eq!(init["params"]["protocolVersion"], "2024-11-05");
        assert_eq!(
            init["params"]["clientInfo"],
            serde_json::json!({"name": "HackermoonWeatherClient", "version": "1.0.0"})
        );
        assert_eq!(session.client_info().name, "HackermoonWeatherClient");
    }
}
